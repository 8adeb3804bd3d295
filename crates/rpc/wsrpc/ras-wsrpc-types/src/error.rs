//! Error types for path-routed RPC over WebSockets

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by the dispatch, routing and session machinery
///
/// None of these are ever sent to a client. The only failure a client sees
/// is an [`RpcFailure`] carried in the `error` field of a response.
#[derive(Error, Debug)]
pub enum WsRpcError {
    /// Inbound envelope could not be parsed
    #[error("Failed to decode request envelope: {0}")]
    Decode(String),

    /// No handler registered for the requested path
    #[error("No handler registered for path: {0}")]
    NoSuchHandler(String),

    /// Handler arguments could not be built from the request
    #[error("Cannot resolve arguments for {path}: {reason}")]
    ArgumentResolution { path: String, reason: String },

    /// Outbound payload is not representable on the wire
    #[error("Failed to encode response envelope: {0}")]
    Encode(String),

    /// Transport write failed
    #[error("Failed to send message: {0}")]
    Send(String),

    /// Connection is already closed
    #[error("Connection closed: {0}")]
    ConnectionClosed(crate::ConnectionId),

    /// Connection is not registered
    #[error("Connection not found: {0}")]
    ConnectionNotFound(crate::ConnectionId),

    /// Two handlers resolved to the same dispatch path during a refresh
    #[error("Duplicate dispatch path: {0}")]
    DuplicatePath(String),
}

impl WsRpcError {
    /// Create an argument resolution error
    pub fn argument<E: std::fmt::Display>(path: impl Into<String>, reason: E) -> Self {
        Self::ArgumentResolution {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a send error
    pub fn send<E: std::fmt::Display>(error: E) -> Self {
        Self::Send(error.to_string())
    }
}

/// Failure raised by a handler's own logic
///
/// Serialized into the `error` field of the response correlated with the
/// request that caused it.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{message}")]
pub struct RpcFailure {
    /// Human readable failure message
    pub message: String,
    /// Optional machine readable failure kind
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Optional structured details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl RpcFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: None,
            details: None,
        }
    }

    /// Attach a failure kind
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Attach structured details
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl From<String> for RpcFailure {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for RpcFailure {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_failure_omits_empty_fields() {
        let failure = RpcFailure::new("boom");
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json, json!({"message": "boom"}));

        let failure = RpcFailure::new("denied")
            .with_kind("forbidden")
            .with_details(json!({"needs": "admin"}));
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["kind"], "forbidden");
        assert_eq!(json["details"]["needs"], "admin");
    }

    #[test]
    fn test_argument_error_message() {
        let err = WsRpcError::argument("Echo.say", "expected string");
        assert_eq!(
            err.to_string(),
            "Cannot resolve arguments for Echo.say: expected string"
        );
    }
}

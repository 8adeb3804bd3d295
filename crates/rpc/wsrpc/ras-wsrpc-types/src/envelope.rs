//! Request and response envelopes
//!
//! Field names are part of the wire contract: a request carries `path`,
//! `responseKey` and `data`; a response carries `path`, `responseKey`, `data`
//! and `error`, with absent fields omitted.

use crate::{RpcFailure, WsRpcError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Path of the push sent to every connection as soon as it opens
pub const SESSION_ASSIGNED_PATH: &str = "createResponseKey";

/// Inbound call addressed to a handler by path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcRequest {
    /// Dispatch path, `<Controller>.<method>`
    pub path: String,
    /// Client-chosen correlation key echoed back in the response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_key: Option<String>,
    /// Payload, left undecoded until a handler asks for it
    #[serde(default)]
    pub data: serde_json::Value,
}

impl RpcRequest {
    pub fn new(path: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            path: path.into(),
            response_key: None,
            data,
        }
    }

    /// Set the correlation key
    pub fn with_response_key(mut self, key: impl Into<String>) -> Self {
        self.response_key = Some(key.into());
        self
    }

    /// Decode the payload into a concrete type
    pub fn payload<T: DeserializeOwned>(&self) -> crate::Result<T> {
        T::deserialize(&self.data).map_err(|e| WsRpcError::argument(&self.path, e))
    }
}

/// Outbound envelope: a correlated reply or an unsolicited push
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcResponse {
    /// Set on pushes, names the client-side method being called
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Set on replies, copied from the request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_key: Option<String>,
    /// Result of a successful call, or the push payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Handler failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcFailure>,
}

impl RpcResponse {
    /// Successful reply; `None` data means the handler returned nothing
    pub fn reply(response_key: impl Into<String>, data: Option<serde_json::Value>) -> Self {
        Self {
            response_key: Some(response_key.into()),
            data,
            ..Default::default()
        }
    }

    /// Failed reply
    pub fn failure(response_key: impl Into<String>, error: RpcFailure) -> Self {
        Self {
            response_key: Some(response_key.into()),
            error: Some(error),
            ..Default::default()
        }
    }

    /// Server-initiated call with no correlation key
    pub fn push(path: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            path: Some(path.into()),
            data: Some(data),
            ..Default::default()
        }
    }

    /// Push carrying any serializable payload
    pub fn push_serialized<T: Serialize + ?Sized>(
        path: impl Into<String>,
        data: &T,
    ) -> crate::Result<Self> {
        let data = serde_json::to_value(data).map_err(|e| WsRpcError::Encode(e.to_string()))?;
        Ok(Self::push(path, data))
    }

    /// The session token push sent when a connection opens
    pub fn session_assigned(token: impl Into<String>) -> Self {
        Self::push(SESSION_ASSIGNED_PATH, serde_json::Value::String(token.into()))
    }
}

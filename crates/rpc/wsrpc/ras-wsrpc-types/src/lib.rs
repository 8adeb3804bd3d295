//! Core types for path-routed RPC over WebSockets
//!
//! This crate provides the wire envelopes, connection and identity handles,
//! the codec and session manager seams, and the error taxonomy shared by the
//! server implementation and by applications registering handlers.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub mod codec;
pub mod connection;
pub mod envelope;
pub mod error;
pub mod manager;

pub use codec::{EnvelopeCodec, JsonCodec};
pub use connection::{Connection, ConnectionHandle};
pub use envelope::{RpcRequest, RpcResponse, SESSION_ASSIGNED_PATH};
pub use error::{RpcFailure, WsRpcError};
pub use manager::{SessionManager, SessionManagerExt};

/// Unique identifier for a WebSocket connection
///
/// Its string form is the opaque session token handed to the client when the
/// connection opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Create a new random connection ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a connection ID from a UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Session token sent to the client
    pub fn token(&self) -> String {
        self.0.to_string()
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Application-level identity bound to a connection
///
/// Two identities are equal exactly when their ids are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(u64);

impl Identity {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn id(&self) -> u64 {
        self.0
    }
}

impl From<u64> for Identity {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "identity:{}", self.0)
    }
}

/// Types the application uses to represent "who" a connection belongs to
pub trait AsIdentity {
    fn identity(&self) -> Identity;
}

impl AsIdentity for Identity {
    fn identity(&self) -> Identity {
        *self
    }
}

/// Snapshot of one session registry entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    /// Connection identifier
    pub id: ConnectionId,
    /// Bound identity, if the application has bound one
    pub identity: Option<Identity>,
    /// When the connection was registered
    pub connected_at: chrono::DateTime<chrono::Utc>,
}

impl SessionInfo {
    /// Create an anonymous session entry
    pub fn new(id: ConnectionId) -> Self {
        Self {
            id,
            identity: None,
            connected_at: chrono::Utc::now(),
        }
    }

    /// Check if an identity is bound
    pub fn is_bound(&self) -> bool {
        self.identity.is_some()
    }
}

/// Result type for RPC operations
pub type Result<T> = std::result::Result<T, WsRpcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id() {
        let id1 = ConnectionId::new();
        let id2 = ConnectionId::new();
        assert_ne!(id1, id2);

        let uuid = Uuid::new_v4();
        let id3 = ConnectionId::from_uuid(uuid);
        assert_eq!(id3.as_uuid(), &uuid);
        assert_eq!(id3.token(), uuid.to_string());
    }

    #[test]
    fn test_identity_equality_is_by_id() {
        struct User {
            id: u64,
            #[allow(dead_code)]
            name: &'static str,
        }

        impl AsIdentity for User {
            fn identity(&self) -> Identity {
                Identity::new(self.id)
            }
        }

        let alice = User { id: 7, name: "alice" };
        let alias = User { id: 7, name: "al" };
        assert_eq!(alice.identity(), alias.identity());
        assert_ne!(alice.identity(), Identity::from(8));
        assert_eq!(serde_json::to_string(&Identity::new(7)).unwrap(), "7");
    }

    #[test]
    fn test_session_info() {
        let mut info = SessionInfo::new(ConnectionId::new());
        assert!(!info.is_bound());
        info.identity = Some(Identity::new(1));
        assert!(info.is_bound());
    }
}

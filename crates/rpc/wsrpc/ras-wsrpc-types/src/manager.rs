//! Session manager trait

use crate::{ConnectionHandle, ConnectionId, Identity, Result, SessionInfo};
use async_trait::async_trait;

/// Registry of live connections and the identity bound to each
///
/// Every operation is atomic with respect to the others.
#[async_trait]
pub trait SessionManager: Send + Sync {
    /// Add an anonymous entry for a newly opened connection
    async fn register(&self, connection: ConnectionHandle) -> Result<()>;

    /// Bind an identity to a registered connection
    ///
    /// Any other connection currently bound to the same identity is removed
    /// and closed. Returns the id of the evicted connection, if any.
    async fn bind(&self, id: ConnectionId, identity: Identity) -> Result<Option<ConnectionId>>;

    /// Get the identity bound to a connection
    async fn identity_of(&self, id: ConnectionId) -> Option<Identity>;

    /// Remove a connection's entry, returning it if it was present
    async fn remove(&self, id: ConnectionId) -> Option<SessionInfo>;

    /// Get the handle of a registered connection
    async fn get(&self, id: ConnectionId) -> Option<ConnectionHandle>;

    /// Stable snapshot of every registered connection with its identity
    async fn connections(&self) -> Vec<(ConnectionHandle, Option<Identity>)>;

    /// Stable snapshot of every registry entry
    async fn snapshot(&self) -> Vec<SessionInfo>;

    /// Get the number of registered connections
    async fn connection_count(&self) -> usize {
        self.snapshot().await.len()
    }
}

/// Extension trait for session managers with convenience methods
#[async_trait]
pub trait SessionManagerExt: SessionManager {
    /// Connections bound to any of the given identities
    async fn connections_for(&self, identities: &[Identity]) -> Vec<ConnectionHandle> {
        self.connections()
            .await
            .into_iter()
            .filter_map(|(conn, identity)| match identity {
                Some(identity) if identities.contains(&identity) => Some(conn),
                _ => None,
            })
            .collect()
    }

    /// Check if a connection is registered
    async fn is_registered(&self, id: ConnectionId) -> bool {
        self.get(id).await.is_some()
    }

    /// Get the number of connections with a bound identity
    async fn bound_count(&self) -> usize {
        self.snapshot()
            .await
            .iter()
            .filter(|info| info.is_bound())
            .count()
    }
}

// Blanket implementation for all SessionManager types
impl<T: SessionManager + ?Sized> SessionManagerExt for T {}

//! Default session manager guarded by a single mutex

use async_trait::async_trait;
use parking_lot::Mutex;
use ras_wsrpc_types::{
    ConnectionHandle, ConnectionId, Identity, Result, SessionInfo, SessionManager, WsRpcError,
};
use std::collections::HashMap;
use tracing::{debug, info, warn};

struct SessionEntry {
    connection: ConnectionHandle,
    info: SessionInfo,
}

/// Thread-safe session registry
///
/// One lock covers the whole map, so an identity collision is resolved
/// (lookup, evict, insert) without any other caller seeing a partial update.
/// The evicted connection is closed after the lock is released.
#[derive(Default)]
pub struct DefaultSessionManager {
    sessions: Mutex<HashMap<ConnectionId, SessionEntry>>,
}

impl DefaultSessionManager {
    /// Create a new session manager
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Get all connection IDs
    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        self.sessions.lock().keys().copied().collect()
    }

    /// Get the number of registered connections without awaiting
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}

impl std::fmt::Debug for DefaultSessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultSessionManager")
            .field("connections", &self.len())
            .finish()
    }
}

#[async_trait]
impl SessionManager for DefaultSessionManager {
    async fn register(&self, connection: ConnectionHandle) -> Result<()> {
        let id = connection.id();
        let previous = self.sessions.lock().insert(
            id,
            SessionEntry {
                connection,
                info: SessionInfo::new(id),
            },
        );
        if previous.is_some() {
            warn!("Connection {} registered twice, identity binding reset", id);
        }
        info!("Registered connection: {}", id);
        Ok(())
    }

    async fn bind(&self, id: ConnectionId, identity: Identity) -> Result<Option<ConnectionId>> {
        let evicted = {
            let mut sessions = self.sessions.lock();
            if !sessions.contains_key(&id) {
                return Err(WsRpcError::ConnectionNotFound(id));
            }

            let holder = sessions
                .iter()
                .find(|(other, entry)| **other != id && entry.info.identity == Some(identity))
                .map(|(other, _)| *other);
            let evicted = holder.and_then(|other| sessions.remove(&other));

            if let Some(entry) = sessions.get_mut(&id) {
                entry.info.identity = Some(identity);
            }
            evicted
        };

        debug!("Bound {} to connection {}", identity, id);

        let Some(evicted) = evicted else {
            return Ok(None);
        };

        let evicted_id = evicted.info.id;
        info!(
            "Evicting connection {} previously bound to {}",
            evicted_id, identity
        );
        if evicted.connection.is_open() {
            if let Err(e) = evicted.connection.close().await {
                warn!("Failed to close evicted connection {}: {}", evicted_id, e);
            }
        }
        Ok(Some(evicted_id))
    }

    async fn identity_of(&self, id: ConnectionId) -> Option<Identity> {
        self.sessions
            .lock()
            .get(&id)
            .and_then(|entry| entry.info.identity)
    }

    async fn remove(&self, id: ConnectionId) -> Option<SessionInfo> {
        let removed = self.sessions.lock().remove(&id);
        match removed {
            Some(entry) => {
                info!("Removed connection: {}", id);
                Some(entry.info)
            }
            None => {
                debug!("Connection {} already removed", id);
                None
            }
        }
    }

    async fn get(&self, id: ConnectionId) -> Option<ConnectionHandle> {
        self.sessions
            .lock()
            .get(&id)
            .map(|entry| entry.connection.clone())
    }

    async fn connections(&self) -> Vec<(ConnectionHandle, Option<Identity>)> {
        self.sessions
            .lock()
            .values()
            .map(|entry| (entry.connection.clone(), entry.info.identity))
            .collect()
    }

    async fn snapshot(&self) -> Vec<SessionInfo> {
        self.sessions
            .lock()
            .values()
            .map(|entry| entry.info.clone())
            .collect()
    }

    async fn connection_count(&self) -> usize {
        self.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{ChannelConnection, Outbound};
    use ras_wsrpc_types::{Connection, SessionManagerExt};
    use std::sync::Arc;

    fn connection() -> (Arc<ChannelConnection>, tokio::sync::mpsc::UnboundedReceiver<Outbound>) {
        let (conn, rx) = ChannelConnection::pair();
        (Arc::new(conn), rx)
    }

    #[tokio::test]
    async fn test_register_and_remove() {
        let manager = DefaultSessionManager::new();
        let (conn, _rx) = connection();
        let id = conn.id();

        manager.register(conn).await.unwrap();
        assert_eq!(manager.connection_count().await, 1);
        assert!(manager.is_registered(id).await);
        assert_eq!(manager.identity_of(id).await, None);

        let removed = manager.remove(id).await.unwrap();
        assert_eq!(removed.id, id);
        assert!(manager.is_empty());
        assert!(manager.remove(id).await.is_none());
    }

    #[tokio::test]
    async fn test_bind_requires_registration() {
        let manager = DefaultSessionManager::new();
        let result = manager.bind(ConnectionId::new(), Identity::new(1)).await;
        assert!(matches!(result, Err(WsRpcError::ConnectionNotFound(_))));
    }

    #[tokio::test]
    async fn test_rebinding_same_connection_keeps_it() {
        let manager = DefaultSessionManager::new();
        let (conn, mut rx) = connection();
        let id = conn.id();
        manager.register(conn.clone()).await.unwrap();

        assert_eq!(manager.bind(id, Identity::new(1)).await.unwrap(), None);
        assert_eq!(manager.bind(id, Identity::new(1)).await.unwrap(), None);
        assert_eq!(manager.bind(id, Identity::new(2)).await.unwrap(), None);

        assert_eq!(manager.identity_of(id).await, Some(Identity::new(2)));
        assert!(conn.is_open());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_identity_collision_evicts_previous_holder() {
        let manager = DefaultSessionManager::new();
        let (first, mut first_rx) = connection();
        let (second, _second_rx) = connection();
        let user = Identity::new(42);

        manager.register(first.clone()).await.unwrap();
        manager.register(second.clone()).await.unwrap();
        manager.bind(first.id(), user).await.unwrap();

        let evicted = manager.bind(second.id(), user).await.unwrap();
        assert_eq!(evicted, Some(first.id()));

        assert!(!first.is_open());
        assert_eq!(first_rx.recv().await, Some(Outbound::Close));
        assert!(!manager.is_registered(first.id()).await);
        assert_eq!(manager.identity_of(first.id()).await, None);
        assert_eq!(manager.identity_of(second.id()).await, Some(user));

        let holders = manager.connections_for(&[user]).await;
        assert_eq!(holders.len(), 1);
        assert_eq!(holders[0].id(), second.id());
    }

    #[tokio::test]
    async fn test_closed_holder_is_removed_without_close() {
        let manager = DefaultSessionManager::new();
        let (first, first_rx) = connection();
        let (second, _second_rx) = connection();
        let user = Identity::new(3);

        manager.register(first.clone()).await.unwrap();
        manager.register(second.clone()).await.unwrap();
        manager.bind(first.id(), user).await.unwrap();
        drop(first_rx);

        let evicted = manager.bind(second.id(), user).await.unwrap();
        assert_eq!(evicted, Some(first.id()));
        assert_eq!(manager.len(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_and_bound_count() {
        let manager = DefaultSessionManager::new();
        let (a, _a_rx) = connection();
        let (b, _b_rx) = connection();
        manager.register(a.clone()).await.unwrap();
        manager.register(b.clone()).await.unwrap();
        manager.bind(a.id(), Identity::new(9)).await.unwrap();

        let snapshot = manager.snapshot().await;
        assert_eq!(snapshot.len(), 2);
        assert_eq!(manager.bound_count().await, 1);

        let mut ids = manager.connection_ids();
        ids.sort_by_key(|id| *id.as_uuid());
        let mut expected = vec![a.id(), b.id()];
        expected.sort_by_key(|id| *id.as_uuid());
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn test_concurrent_binds_leave_one_holder() {
        let manager = Arc::new(DefaultSessionManager::new());
        let user = Identity::new(77);
        let mut receivers = Vec::new();
        let mut ids = Vec::new();

        for _ in 0..16 {
            let (conn, rx) = connection();
            ids.push(conn.id());
            receivers.push(rx);
            manager.register(conn).await.unwrap();
        }

        let tasks: Vec<_> = ids
            .iter()
            .map(|id| {
                let manager = manager.clone();
                let id = *id;
                tokio::spawn(async move { manager.bind(id, user).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(manager.connections_for(&[user]).await.len(), 1);
        assert_eq!(manager.len(), 1);
    }
}

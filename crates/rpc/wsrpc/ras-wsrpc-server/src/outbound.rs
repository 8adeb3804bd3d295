//! Outbound routing of replies and pushes to connections

use ras_wsrpc_types::{
    Connection, ConnectionHandle, ConnectionId, EnvelopeCodec, Identity, Result, RpcResponse,
    SessionManager, SessionManagerExt,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Selects target connections and writes encoded envelopes to them
///
/// Every operation encodes once, then delivers to each target on its own: a
/// closed or failing connection is logged and skipped without affecting the
/// rest. Only an encoding failure is returned to the caller.
#[derive(Clone)]
pub struct OutboundRouter {
    sessions: Arc<dyn SessionManager>,
    codec: Arc<dyn EnvelopeCodec>,
}

impl OutboundRouter {
    pub fn new(sessions: Arc<dyn SessionManager>, codec: Arc<dyn EnvelopeCodec>) -> Self {
        Self { sessions, codec }
    }

    /// Session manager used to resolve targets
    pub fn sessions(&self) -> &Arc<dyn SessionManager> {
        &self.sessions
    }

    async fn deliver(&self, connection: &dyn Connection, text: String) -> bool {
        let id = connection.id();
        if !connection.is_open() {
            warn!("Connection {} is not open, not sending message {}", id, text);
            return false;
        }
        match connection.send_text(text).await {
            Ok(()) => {
                debug!("Sent message to connection {}", id);
                true
            }
            Err(e) => {
                error!("Failed to send message to connection {}: {}", id, e);
                false
            }
        }
    }

    async fn deliver_all(&self, targets: &[ConnectionHandle], text: String) -> usize {
        let mut sent_count = 0;
        for connection in targets {
            if self.deliver(connection.as_ref(), text.clone()).await {
                sent_count += 1;
            }
        }
        sent_count
    }

    /// Send to a single connection; returns whether it was written
    pub async fn send_to(
        &self,
        connection: &dyn Connection,
        response: &RpcResponse,
    ) -> Result<bool> {
        let text = self.codec.encode_response(response)?;
        Ok(self.deliver(connection, text).await)
    }

    /// Send to a registered connection by id
    pub async fn send_to_id(&self, id: ConnectionId, response: &RpcResponse) -> Result<bool> {
        let text = self.codec.encode_response(response)?;
        match self.sessions.get(id).await {
            Some(connection) => Ok(self.deliver(connection.as_ref(), text).await),
            None => {
                warn!("Attempted to send to non-existent connection: {}", id);
                Ok(false)
            }
        }
    }

    /// Send to an explicit set of connections
    pub async fn send_to_connections(
        &self,
        connections: &[ConnectionHandle],
        response: &RpcResponse,
    ) -> Result<usize> {
        let text = self.codec.encode_response(response)?;
        Ok(self.deliver_all(connections, text).await)
    }

    /// Send to every connection bound to one of the identities
    pub async fn send_to_identities(
        &self,
        identities: &[Identity],
        response: &RpcResponse,
    ) -> Result<usize> {
        let text = self.codec.encode_response(response)?;
        let targets = self.sessions.connections_for(identities).await;
        if targets.is_empty() {
            debug!("No connections bound to {:?}", identities);
            return Ok(0);
        }
        let sent_count = self.deliver_all(&targets, text).await;
        debug!("Sent to {} connections bound to {:?}", sent_count, identities);
        Ok(sent_count)
    }

    /// Send to every registered connection
    pub async fn send_to_all(&self, response: &RpcResponse) -> Result<usize> {
        let text = self.codec.encode_response(response)?;
        let targets: Vec<ConnectionHandle> = self
            .sessions
            .connections()
            .await
            .into_iter()
            .map(|(connection, _)| connection)
            .collect();
        let sent_count = self.deliver_all(&targets, text).await;
        debug!("Broadcasted to {} of {} connections", sent_count, targets.len());
        Ok(sent_count)
    }

    /// Call a client-side method on one connection
    pub async fn push<T>(&self, id: ConnectionId, path: &str, data: &T) -> Result<bool>
    where
        T: Serialize + ?Sized + Sync,
    {
        let response = RpcResponse::push_serialized(path, data)?;
        self.send_to_id(id, &response).await
    }

    /// Call a client-side method on several connections
    pub async fn push_to_connections<T>(
        &self,
        ids: &[ConnectionId],
        path: &str,
        data: &T,
    ) -> Result<usize>
    where
        T: Serialize + ?Sized + Sync,
    {
        let response = RpcResponse::push_serialized(path, data)?;
        let mut targets = Vec::with_capacity(ids.len());
        for id in ids {
            match self.sessions.get(*id).await {
                Some(connection) => targets.push(connection),
                None => warn!("Attempted to push to non-existent connection: {}", id),
            }
        }
        self.send_to_connections(&targets, &response).await
    }

    /// Call a client-side method on every connection bound to the identities
    pub async fn push_to_identities<T>(
        &self,
        identities: &[Identity],
        path: &str,
        data: &T,
    ) -> Result<usize>
    where
        T: Serialize + ?Sized + Sync,
    {
        let response = RpcResponse::push_serialized(path, data)?;
        self.send_to_identities(identities, &response).await
    }

    /// Call a client-side method on every connection
    pub async fn push_to_all<T>(&self, path: &str, data: &T) -> Result<usize>
    where
        T: Serialize + ?Sized + Sync,
    {
        let response = RpcResponse::push_serialized(path, data)?;
        self.send_to_all(&response).await
    }
}

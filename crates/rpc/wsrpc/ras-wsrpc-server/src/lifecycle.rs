//! Connection open, close and error handling

use crate::outbound::OutboundRouter;
use ras_wsrpc_types::{
    ConnectionHandle, ConnectionId, Result, RpcResponse, SessionInfo, SessionManager,
};
use std::fmt::Display;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Keeps the session registry in step with transport events
#[derive(Clone)]
pub struct ConnectionLifecycle {
    sessions: Arc<dyn SessionManager>,
    outbound: OutboundRouter,
}

impl ConnectionLifecycle {
    pub fn new(sessions: Arc<dyn SessionManager>, outbound: OutboundRouter) -> Self {
        Self { sessions, outbound }
    }

    /// Register a new connection and send it its session token
    pub async fn on_open(&self, connection: ConnectionHandle) -> Result<()> {
        let id = connection.id();
        self.sessions.register(connection.clone()).await?;

        let assigned = RpcResponse::session_assigned(id.token());
        if !self.outbound.send_to(connection.as_ref(), &assigned).await? {
            warn!("Connection {} closed before its session token was sent", id);
        }
        info!("Connection opened: {}", id);
        Ok(())
    }

    /// Drop the session entry of a closed connection
    pub async fn on_close(&self, id: ConnectionId) -> Option<SessionInfo> {
        let removed = self.sessions.remove(id).await;
        if let Some(info) = &removed {
            info!(
                "Connection closed: {} (identity: {:?}, open since {})",
                id, info.identity, info.connected_at
            );
        }
        removed
    }

    /// Log a transport error; cleanup happens on the close that follows
    pub fn on_error(&self, id: ConnectionId, error: &dyn Display) {
        error!("Transport error on connection {}: {}", id, error);
    }
}

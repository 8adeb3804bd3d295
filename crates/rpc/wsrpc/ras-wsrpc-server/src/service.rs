//! WebSocket RPC service with builder pattern

use crate::dispatcher::Dispatcher;
use crate::handler::WebSocketHandler;
use crate::lifecycle::ConnectionLifecycle;
use crate::manager::DefaultSessionManager;
use crate::outbound::OutboundRouter;
use crate::registry::HandlerRegistry;
use crate::upgrade::{PeerInfo, WebSocketUpgrade};
use axum::{
    extract::{State, ws::WebSocket, ws::WebSocketUpgrade as AxumWebSocketUpgrade},
    http::HeaderMap,
    response::Response,
};
use bon::Builder;
use ras_wsrpc_types::{ConnectionId, EnvelopeCodec, Identity, JsonCodec, Result, SessionManager};
use std::sync::Arc;
use tracing::{error, info};

/// Builder for creating WebSocket RPC services
#[derive(Builder)]
pub struct WsRpcServiceBuilder {
    /// Handlers served over the socket
    handlers: Arc<HandlerRegistry>,
    /// Session manager, a [`DefaultSessionManager`] if unset
    sessions: Option<Arc<dyn SessionManager>>,
    /// Envelope codec, [`JsonCodec`] if unset
    codec: Option<Arc<dyn EnvelopeCodec>>,
}

impl WsRpcServiceBuilder {
    /// Build the service, wiring every component to the same session manager
    pub fn build(self) -> WsRpcService {
        let sessions = self
            .sessions
            .unwrap_or_else(|| Arc::new(DefaultSessionManager::new()));
        let codec = self.codec.unwrap_or_else(|| Arc::new(JsonCodec));
        let outbound = OutboundRouter::new(sessions.clone(), codec.clone());
        let dispatcher = Dispatcher::new(
            self.handlers.clone(),
            sessions.clone(),
            outbound.clone(),
            codec,
        );
        let lifecycle = ConnectionLifecycle::new(sessions.clone(), outbound.clone());

        WsRpcService {
            handlers: self.handlers,
            sessions,
            outbound,
            dispatcher,
            lifecycle,
        }
    }
}

/// A ready to serve WebSocket RPC endpoint
#[derive(Clone)]
pub struct WsRpcService {
    handlers: Arc<HandlerRegistry>,
    sessions: Arc<dyn SessionManager>,
    outbound: OutboundRouter,
    dispatcher: Dispatcher,
    lifecycle: ConnectionLifecycle,
}

impl WsRpcService {
    /// Service with the default session manager and JSON codec
    pub fn new(handlers: Arc<HandlerRegistry>) -> Self {
        WsRpcServiceBuilder::builder()
            .handlers(handlers)
            .build()
            .build()
    }

    pub fn handlers(&self) -> &Arc<HandlerRegistry> {
        &self.handlers
    }

    pub fn sessions(&self) -> &Arc<dyn SessionManager> {
        &self.sessions
    }

    /// Router for server-initiated sends
    pub fn outbound(&self) -> &OutboundRouter {
        &self.outbound
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Bind an identity to a connection, evicting any other holder
    pub async fn bind_identity(
        &self,
        id: ConnectionId,
        identity: Identity,
    ) -> Result<Option<ConnectionId>> {
        self.sessions.bind(id, identity).await
    }

    /// Handle WebSocket upgrade
    pub fn handle_upgrade(&self, upgrade: WebSocketUpgrade) -> Response {
        let peer = upgrade.peer();
        let service = self.clone();
        upgrade.on_upgrade(move |socket| {
            Box::pin(async move {
                service.handle_connection(socket, peer).await;
            })
        })
    }

    /// Handle an individual WebSocket connection until it closes
    pub async fn handle_connection(&self, socket: WebSocket, peer: PeerInfo) {
        let handler = WebSocketHandler::new(self.dispatcher.clone(), self.lifecycle.clone());
        info!(
            "New WebSocket connection: {} ({})",
            handler.connection_id(),
            peer
        );
        if let Err(e) = handler.run(socket).await {
            error!("WebSocket connection error: {}", e);
        }
    }
}

/// Axum handler function for WebSocket upgrade
pub async fn websocket_handler(
    ws: AxumWebSocketUpgrade,
    headers: HeaderMap,
    State(service): State<WsRpcService>,
) -> Response {
    service.handle_upgrade(WebSocketUpgrade::new(ws, headers))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ChannelConnection;
    use ras_wsrpc_types::Connection;

    #[tokio::test]
    async fn test_service_builder_defaults() {
        let service = WsRpcService::new(Arc::new(HandlerRegistry::new()));

        assert!(service.handlers().is_empty());
        assert_eq!(service.sessions().connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_components_share_one_session_manager() {
        let sessions = Arc::new(DefaultSessionManager::new());
        let service = WsRpcServiceBuilder::builder()
            .handlers(Arc::new(HandlerRegistry::new()))
            .sessions(sessions.clone())
            .codec(Arc::new(JsonCodec))
            .build()
            .build();

        let (conn, mut rx) = ChannelConnection::pair();
        let id = conn.id();
        sessions.register(Arc::new(conn)).await.unwrap();

        assert_eq!(
            service.bind_identity(id, Identity::new(11)).await.unwrap(),
            None
        );
        let sent = service
            .outbound()
            .push_to_identities(&[Identity::new(11)], "Hello.world", &1)
            .await
            .unwrap();
        assert_eq!(sent, 1);
        assert!(rx.try_recv().is_ok());
    }
}

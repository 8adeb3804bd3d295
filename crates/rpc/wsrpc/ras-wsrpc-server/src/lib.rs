//! Server-side WebSocket handling for path-routed bidirectional RPC
//!
//! This crate provides the session registry, the handler registry, the
//! dispatcher and outbound router, and the axum WebSocket transport that ties
//! them to live connections.

pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod lifecycle;
pub mod manager;
pub mod outbound;
pub mod registry;
pub mod service;
pub mod upgrade;

pub use connection::{ChannelConnection, Outbound};
pub use dispatcher::{Dispatched, Dispatcher};
pub use error::{ServerError, ServerResult};
pub use handler::WebSocketHandler;
pub use lifecycle::ConnectionLifecycle;
pub use manager::DefaultSessionManager;
pub use outbound::OutboundRouter;
pub use registry::{
    Arguments, Controller, HandlerDescriptor, HandlerRegistry, InvocationError, InvocationResult,
    MethodSpec, ParamKind, Reply, ReturnKind,
};
pub use service::{WsRpcService, WsRpcServiceBuilder, websocket_handler};
pub use upgrade::{PeerInfo, WebSocketUpgrade};

// Re-export types for convenience
pub use ras_wsrpc_types::{
    AsIdentity, Connection, ConnectionHandle, ConnectionId, Identity, RpcFailure, RpcRequest,
    RpcResponse, SessionInfo, SessionManager, SessionManagerExt, WsRpcError,
};

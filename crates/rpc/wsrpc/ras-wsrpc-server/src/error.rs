//! Error types for WebSocket server operations

use ras_wsrpc_types::WsRpcError;
use thiserror::Error;

/// Transport-level errors of the WebSocket server
#[derive(Debug, Error)]
pub enum ServerError {
    /// WebSocket protocol error
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Dispatch, routing or session failure
    #[error(transparent)]
    Rpc(#[from] WsRpcError),
}

impl From<axum::Error> for ServerError {
    fn from(error: axum::Error) -> Self {
        ServerError::WebSocketError(error.to_string())
    }
}

/// Convenience type alias for server operation results
pub type ServerResult<T> = Result<T, ServerError>;

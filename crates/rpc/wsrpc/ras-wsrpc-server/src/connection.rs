//! Channel-backed connection handle used by the WebSocket transport

use async_trait::async_trait;
use ras_wsrpc_types::{Connection, ConnectionId, Result, WsRpcError};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

/// Frames queued for the socket writer of one connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Text frame to write
    Text(String),
    /// Close the socket
    Close,
}

/// A connection handle that queues frames on an mpsc channel
///
/// The WebSocket loop owning the receiver writes the frames in order.
#[derive(Debug)]
pub struct ChannelConnection {
    connection_id: ConnectionId,
    sender: mpsc::UnboundedSender<Outbound>,
    is_closed: AtomicBool,
}

impl ChannelConnection {
    /// Create a new channel connection
    pub fn new(connection_id: ConnectionId, sender: mpsc::UnboundedSender<Outbound>) -> Self {
        Self {
            connection_id,
            sender,
            is_closed: AtomicBool::new(false),
        }
    }

    /// Create a connection together with the receiving end of its queue
    pub fn pair() -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(ConnectionId::new(), tx), rx)
    }

    /// Mark the connection closed without queueing a close frame
    pub fn mark_closed(&self) {
        self.is_closed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connection for ChannelConnection {
    fn id(&self) -> ConnectionId {
        self.connection_id
    }

    async fn send_text(&self, text: String) -> Result<()> {
        if !self.is_open() {
            return Err(WsRpcError::ConnectionClosed(self.connection_id));
        }
        self.sender
            .send(Outbound::Text(text))
            .map_err(WsRpcError::send)
    }

    async fn close(&self) -> Result<()> {
        if !self.is_closed.swap(true, Ordering::SeqCst) {
            self.sender.send(Outbound::Close).map_err(WsRpcError::send)?;
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        !self.is_closed.load(Ordering::SeqCst) && !self.sender.is_closed()
    }
}

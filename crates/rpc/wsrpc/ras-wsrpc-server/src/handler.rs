//! Per-connection WebSocket loop

use crate::connection::{ChannelConnection, Outbound};
use crate::dispatcher::Dispatcher;
use crate::lifecycle::ConnectionLifecycle;
use crate::{ServerError, ServerResult};
use axum::extract::ws::{Message, WebSocket};
use futures::stream::StreamExt;
use ras_wsrpc_types::{Connection, ConnectionHandle, ConnectionId};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Drives one WebSocket: feeds inbound frames to the dispatcher and writes
/// queued outbound frames to the socket
///
/// Inbound messages are dispatched one at a time; the next frame is read only
/// after the previous handler call has completed.
pub struct WebSocketHandler {
    connection: Arc<ChannelConnection>,
    outbound_rx: mpsc::UnboundedReceiver<Outbound>,
    dispatcher: Dispatcher,
    lifecycle: ConnectionLifecycle,
}

impl WebSocketHandler {
    /// Create a handler with a fresh connection id
    pub fn new(dispatcher: Dispatcher, lifecycle: ConnectionLifecycle) -> Self {
        let (connection, outbound_rx) = ChannelConnection::pair();
        Self {
            connection: Arc::new(connection),
            outbound_rx,
            dispatcher,
            lifecycle,
        }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection.id()
    }

    /// Run the WebSocket handler loop until the connection ends
    pub async fn run(mut self, mut socket: WebSocket) -> ServerResult<()> {
        let id = self.connection_id();
        let handle: ConnectionHandle = self.connection.clone();
        info!("Starting WebSocket handler for connection: {}", id);

        if let Err(e) = self.lifecycle.on_open(handle.clone()).await {
            error!("Failed to open connection {}: {}", id, e);
            self.connection.mark_closed();
            self.lifecycle.on_close(id).await;
            return Err(e.into());
        }

        loop {
            tokio::select! {
                msg = socket.next() => {
                    match msg {
                        Some(Ok(msg)) => {
                            if !self.handle_websocket_message(msg, &mut socket, &handle).await {
                                break;
                            }
                        }
                        Some(Err(e)) => {
                            self.lifecycle.on_error(id, &e);
                            break;
                        }
                        None => {
                            debug!("WebSocket connection {} closed by client", id);
                            break;
                        }
                    }
                }

                frame = self.outbound_rx.recv() => {
                    match frame {
                        Some(Outbound::Text(text)) => {
                            if let Err(e) = socket.send(Message::Text(text.into())).await {
                                self.lifecycle.on_error(id, &e);
                                break;
                            }
                        }
                        Some(Outbound::Close) => {
                            debug!("Closing connection {} on server request", id);
                            let _ = socket.send(Message::Close(None)).await;
                            break;
                        }
                        None => {
                            debug!("Outbound channel of connection {} closed", id);
                            break;
                        }
                    }
                }
            }
        }

        self.connection.mark_closed();
        self.lifecycle.on_close(id).await;
        info!("WebSocket handler finished for connection: {}", id);
        Ok(())
    }

    /// Handle one inbound frame; returns false when the connection should end
    async fn handle_websocket_message(
        &self,
        msg: Message,
        socket: &mut WebSocket,
        handle: &ConnectionHandle,
    ) -> bool {
        match msg {
            Message::Text(text) => {
                debug!("Received text message: {}", text.as_str());
                self.dispatch(handle, text.as_str()).await;
                true
            }
            Message::Binary(data) => {
                debug!("Received binary message ({} bytes)", data.len());
                match std::str::from_utf8(&data) {
                    Ok(text) => self.dispatch(handle, text).await,
                    Err(_) => warn!("Received non-UTF-8 binary message, ignoring"),
                }
                true
            }
            Message::Ping(data) => {
                debug!("Received ping");
                match socket.send(Message::Pong(data)).await {
                    Ok(()) => true,
                    Err(e) => {
                        let error = ServerError::from(e);
                        self.lifecycle.on_error(handle.id(), &error);
                        false
                    }
                }
            }
            Message::Pong(_) => {
                debug!("Received pong");
                true
            }
            Message::Close(close_frame) => {
                debug!("Received close frame: {:?}", close_frame);
                false
            }
        }
    }

    async fn dispatch(&self, handle: &ConnectionHandle, text: &str) {
        // Failures are already logged by the dispatcher and never end the connection
        if let Err(e) = self.dispatcher.handle(handle, text).await {
            debug!("Message on connection {} not dispatched: {}", handle.id(), e);
        }
    }
}

//! Inbound request dispatch

use crate::outbound::OutboundRouter;
use crate::registry::{
    Argument, Arguments, HandlerDescriptor, HandlerRegistry, InvocationError, ParamKind,
    ReturnKind,
};
use ras_wsrpc_types::{
    ConnectionHandle, EnvelopeCodec, Result, RpcRequest, RpcResponse, SessionManager, WsRpcError,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// What the dispatcher sent back for a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    /// A success reply was sent
    Replied,
    /// An error reply carrying the handler failure was sent
    Failed,
    /// The handler ran but the request carried no `responseKey`
    NoReply,
    /// A reply was due but the connection was already closed
    Dropped,
}

/// Decodes inbound messages, resolves and invokes handlers, and replies on
/// the originating connection
#[derive(Clone)]
pub struct Dispatcher {
    handlers: Arc<HandlerRegistry>,
    sessions: Arc<dyn SessionManager>,
    outbound: OutboundRouter,
    codec: Arc<dyn EnvelopeCodec>,
}

impl Dispatcher {
    pub fn new(
        handlers: Arc<HandlerRegistry>,
        sessions: Arc<dyn SessionManager>,
        outbound: OutboundRouter,
        codec: Arc<dyn EnvelopeCodec>,
    ) -> Self {
        Self {
            handlers,
            sessions,
            outbound,
            codec,
        }
    }

    pub fn handlers(&self) -> &Arc<HandlerRegistry> {
        &self.handlers
    }

    /// Handle one raw message received on `connection`
    ///
    /// Errors are returned for the transport to log; none of them has been
    /// reported to the client. Only handler failures reach the client, as an
    /// error reply.
    pub async fn handle(&self, connection: &ConnectionHandle, raw: &str) -> Result<Dispatched> {
        let request = self.codec.decode_request(raw).inspect_err(|e| {
            warn!("Dropping message from connection {}: {}", connection.id(), e);
        })?;
        debug!(
            "Dispatching {} for connection {} (responseKey: {:?})",
            request.path,
            connection.id(),
            request.response_key
        );

        let handler = self.handlers.resolve(&request.path).inspect_err(|e| {
            warn!("Rejecting request from connection {}: {}", connection.id(), e);
        })?;

        let args = self
            .resolve_arguments(&handler, connection, &request)
            .await
            .inspect_err(|e| warn!("{}", e))?;

        let outcome = handler.invoke(args).await;
        let Some(response_key) = request.response_key else {
            return match outcome {
                Ok(_) => Ok(Dispatched::NoReply),
                Err(InvocationError::Failure(failure)) => {
                    warn!(
                        "Handler {} failed for notification from connection {}: {}",
                        request.path,
                        connection.id(),
                        failure
                    );
                    Ok(Dispatched::NoReply)
                }
                Err(InvocationError::Dispatch(e)) => {
                    warn!("Dispatch of {} failed: {}", request.path, e);
                    Err(e)
                }
            };
        };

        match outcome {
            Ok(reply) => {
                let data = match handler.returns() {
                    ReturnKind::Value => reply.into_data(),
                    ReturnKind::Void => None,
                };
                let sent = self
                    .outbound
                    .send_to(connection.as_ref(), &RpcResponse::reply(response_key, data))
                    .await?;
                Ok(if sent {
                    Dispatched::Replied
                } else {
                    Dispatched::Dropped
                })
            }
            Err(InvocationError::Failure(failure)) => {
                debug!(
                    "Handler {} failed for connection {}: {}",
                    request.path,
                    connection.id(),
                    failure
                );
                let sent = self
                    .outbound
                    .send_to(connection.as_ref(), &RpcResponse::failure(response_key, failure))
                    .await?;
                Ok(if sent {
                    Dispatched::Failed
                } else {
                    Dispatched::Dropped
                })
            }
            Err(InvocationError::Dispatch(e)) => {
                warn!("Dispatch of {} failed: {}", request.path, e);
                Err(e)
            }
        }
    }

    async fn resolve_arguments(
        &self,
        handler: &HandlerDescriptor,
        connection: &ConnectionHandle,
        request: &RpcRequest,
    ) -> Result<Arguments> {
        let mut values = Vec::with_capacity(handler.params().len());
        for param in handler.params() {
            let value = match param {
                ParamKind::Connection => Argument::Connection(connection.clone()),
                ParamKind::RawRequest => Argument::RawRequest(request.clone()),
                ParamKind::Identity => {
                    Argument::Identity(self.sessions.identity_of(connection.id()).await)
                }
                ParamKind::Payload(spec) => {
                    let payload = spec.decode(&request.data).map_err(|e| {
                        WsRpcError::argument(
                            handler.path(),
                            format!("payload is not a valid {}: {}", spec.type_name(), e),
                        )
                    })?;
                    Argument::Payload(payload)
                }
            };
            values.push(value);
        }
        Ok(Arguments::new(handler.path(), values))
    }
}

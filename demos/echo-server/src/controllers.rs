//! Handlers served by the demo

use ras_wsrpc_server::{
    Arguments, Controller, Identity, InvocationError, MethodSpec, OutboundRouter, ParamKind,
    RpcFailure, SessionManager,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// `Echo.*`: stateless calls for trying out the protocol
pub struct Echo;

impl Controller for Echo {
    fn name(&self) -> &str {
        "Echo"
    }

    fn methods(self: Arc<Self>) -> Vec<MethodSpec> {
        vec![
            MethodSpec::value("ping", vec![], |_args| async {
                Ok::<_, InvocationError>("pong")
            }),
            MethodSpec::value(
                "echo",
                vec![ParamKind::RawRequest],
                |mut args: Arguments| async move {
                    let request = args.request()?;
                    Ok::<_, InvocationError>(request.data)
                },
            ),
            MethodSpec::value(
                "shout",
                vec![ParamKind::payload::<String>()],
                |mut args: Arguments| async move {
                    let text: String = args.payload()?;
                    Ok::<_, InvocationError>(text.to_uppercase())
                },
            ),
        ]
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub user_id: u64,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub identity: Identity,
    /// Whether a previous connection of the same user was closed
    pub replaced_session: bool,
}

/// `Auth.*`: binds identities to connections
pub struct Auth {
    sessions: Arc<dyn SessionManager>,
}

impl Auth {
    pub fn new(sessions: Arc<dyn SessionManager>) -> Self {
        Self { sessions }
    }
}

impl Controller for Auth {
    fn name(&self) -> &str {
        "Auth"
    }

    fn methods(self: Arc<Self>) -> Vec<MethodSpec> {
        let this = self.clone();
        vec![
            MethodSpec::value(
                "login",
                vec![ParamKind::Connection, ParamKind::payload::<LoginRequest>()],
                move |mut args: Arguments| {
                    let this = this.clone();
                    async move {
                        let connection = args.connection()?;
                        let request: LoginRequest = args.payload()?;
                        if request.user_id == 0 {
                            return Err(InvocationError::from(
                                RpcFailure::new("user id must not be 0").with_kind("InvalidLogin"),
                            ));
                        }

                        let identity = Identity::new(request.user_id);
                        let evicted = this.sessions.bind(connection.id(), identity).await?;
                        info!("{} logged in on connection {}", identity, connection.id());
                        Ok::<_, InvocationError>(LoginResponse {
                            identity,
                            replaced_session: evicted.is_some(),
                        })
                    }
                },
            ),
            MethodSpec::value(
                "whoami",
                vec![ParamKind::Identity],
                |mut args: Arguments| async move {
                    let identity = args.identity()?;
                    Ok::<_, InvocationError>(identity.map(|i| i.id()))
                },
            ),
        ]
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub from: u64,
    pub text: String,
}

/// `Chat.*`: relays messages from logged in users to every connection
pub struct Chat {
    outbound: OutboundRouter,
}

impl Chat {
    pub const MESSAGE_PATH: &'static str = "Chat.message";

    pub fn new(outbound: OutboundRouter) -> Self {
        Self { outbound }
    }
}

impl Controller for Chat {
    fn name(&self) -> &str {
        "Chat"
    }

    fn methods(self: Arc<Self>) -> Vec<MethodSpec> {
        vec![MethodSpec::value(
            "say",
            vec![ParamKind::Identity, ParamKind::payload::<String>()],
            move |mut args: Arguments| {
                let this = self.clone();
                async move {
                    let Some(identity) = args.identity()? else {
                        return Err(InvocationError::from(
                            RpcFailure::new("login required").with_kind("Unauthenticated"),
                        ));
                    };
                    let text: String = args.payload()?;
                    let message = ChatMessage {
                        from: identity.id(),
                        text,
                    };
                    let delivered = this.outbound.push_to_all(Chat::MESSAGE_PATH, &message).await?;
                    Ok::<_, InvocationError>(delivered)
                }
            },
        )]
    }
}

/// Every controller served by the demo
pub fn controllers(
    sessions: Arc<dyn SessionManager>,
    outbound: OutboundRouter,
) -> Vec<Arc<dyn Controller>> {
    vec![
        Arc::new(Echo),
        Arc::new(Auth::new(sessions)),
        Arc::new(Chat::new(outbound)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use ras_wsrpc_server::{
        ChannelConnection, Connection, ConnectionHandle, Dispatched, HandlerRegistry, Outbound,
        WsRpcService,
    };
    use serde_json::{Value, json};
    use tokio::sync::mpsc::UnboundedReceiver;

    fn service() -> WsRpcService {
        let service = WsRpcService::new(Arc::new(HandlerRegistry::new()));
        service
            .handlers()
            .refresh(controllers(
                service.sessions().clone(),
                service.outbound().clone(),
            ))
            .unwrap();
        service
    }

    async fn open(service: &WsRpcService) -> (ConnectionHandle, UnboundedReceiver<Outbound>) {
        let (conn, rx) = ChannelConnection::pair();
        let conn: ConnectionHandle = Arc::new(conn);
        service.sessions().register(conn.clone()).await.unwrap();
        (conn, rx)
    }

    async fn call(service: &WsRpcService, conn: &ConnectionHandle, request: Value) -> Dispatched {
        service
            .dispatcher()
            .handle(conn, &request.to_string())
            .await
            .unwrap()
    }

    fn next(rx: &mut UnboundedReceiver<Outbound>) -> Value {
        match rx.try_recv() {
            Ok(Outbound::Text(text)) => serde_json::from_str(&text).unwrap(),
            other => panic!("Expected a text frame, got {:?}", other),
        }
    }

    #[test]
    fn test_all_paths_registered() {
        let service = service();
        assert_eq!(
            service.handlers().paths(),
            vec![
                "Auth.login",
                "Auth.whoami",
                "Chat.say",
                "Echo.echo",
                "Echo.ping",
                "Echo.shout"
            ]
        );
    }

    #[tokio::test]
    async fn test_login_and_whoami() {
        let service = service();
        let (conn, mut rx) = open(&service).await;

        call(&service, &conn, json!({"path": "Auth.whoami", "responseKey": "a"})).await;
        assert_eq!(next(&mut rx), json!({"responseKey": "a", "data": null}));

        call(
            &service,
            &conn,
            json!({"path": "Auth.login", "responseKey": "b", "data": {"user_id": 5}}),
        )
        .await;
        assert_eq!(
            next(&mut rx)["data"],
            json!({"identity": 5, "replaced_session": false})
        );

        call(&service, &conn, json!({"path": "Auth.whoami", "responseKey": "c"})).await;
        assert_eq!(next(&mut rx)["data"], 5);
    }

    #[tokio::test]
    async fn test_invalid_login_is_a_failure() {
        let service = service();
        let (conn, mut rx) = open(&service).await;

        let outcome = call(
            &service,
            &conn,
            json!({"path": "Auth.login", "responseKey": "x", "data": {"user_id": 0}}),
        )
        .await;
        assert_eq!(outcome, Dispatched::Failed);
        assert_eq!(next(&mut rx)["error"]["kind"], "InvalidLogin");
    }

    #[tokio::test]
    async fn test_chat_requires_login_and_reaches_everyone() {
        let service = service();
        let (alice, mut alice_rx) = open(&service).await;
        let (_bob, mut bob_rx) = open(&service).await;

        call(&service, &alice, json!({"path": "Chat.say", "responseKey": "1", "data": "hi"})).await;
        assert_eq!(next(&mut alice_rx)["error"]["kind"], "Unauthenticated");

        service
            .bind_identity(alice.id(), Identity::new(1))
            .await
            .unwrap();
        call(&service, &alice, json!({"path": "Chat.say", "responseKey": "2", "data": "hi"})).await;

        let expected = json!({"path": "Chat.message", "data": {"from": 1, "text": "hi"}});
        assert_eq!(next(&mut alice_rx), expected);
        assert_eq!(next(&mut alice_rx), json!({"responseKey": "2", "data": 2}));
        assert_eq!(next(&mut bob_rx), expected);
    }
}

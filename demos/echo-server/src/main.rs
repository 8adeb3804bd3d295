//! Echo server demo
//!
//! Serves the `Echo`, `Auth` and `Chat` controllers over path-routed RPC on a
//! WebSocket. Each connection first receives a `createResponseKey` push with
//! its session token; requests then look like
//! `{"path":"Echo.ping","responseKey":"r1","data":null}`.

mod config;
mod controllers;

use anyhow::{Context, Result};
use axum::{Router, routing::get};
use crate::config::Config;
use ras_wsrpc_server::{HandlerRegistry, WsRpcService, websocket_handler};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing(config: &Config) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_filter()))
        .with_target(false)
        .with_level(true)
        .with_ansi(true);

    if config.compact_logs() {
        builder.compact().init();
    } else {
        builder.pretty().init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::load().context("Failed to load configuration")?;
    init_tracing(&config);

    let service = WsRpcService::new(Arc::new(HandlerRegistry::new()));
    let registered = service
        .handlers()
        .refresh(controllers::controllers(
            service.sessions().clone(),
            service.outbound().clone(),
        ))
        .context("Failed to register handlers")?;
    info!("Registered {} remote methods", registered);

    let ws_router = Router::new()
        .route(&config.server.websocket_path, get(websocket_handler))
        .with_state(service);

    let health_router = Router::new().route("/health", get(|| async { "OK" }));

    let app = Router::new()
        .merge(ws_router)
        .merge(health_router)
        .layer(CorsLayer::permissive());

    let addr = config.socket_addr();
    info!("Echo server listening on http://{}", addr);
    info!(
        "WebSocket endpoint: ws://{}{}",
        addr, config.server.websocket_path
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Axum HTTP server setup and routing

use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers::*;
use crate::ledger::MockLedger;

pub fn create_router(ledger: Arc<MockLedger>) -> Router {
    // Browser wallets and local tools call from other origins
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", post(handle_rpc))
        .route("/health", get(health_check))
        .with_state(ledger)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn run_server(ledger: Arc<MockLedger>, host: String, port: u16) -> anyhow::Result<()> {
    let addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&addr).await?;

    log::info!("🚀 Ledger mock listening on http://{}", addr);
    log::info!("👛 Accounts: {}", ledger.accounts().join(", "));
    log::info!("📜 Notes contract: {}", ledger.config().contract_address);

    axum::serve(listener, create_router(ledger)).await?;

    Ok(())
}

/// Serve on an ephemeral localhost port in the background
///
/// Returns the bound address; the server runs until the runtime shuts down.
pub async fn spawn_server(ledger: Arc<MockLedger>) -> anyhow::Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = create_router(ledger);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            log::error!("Ledger mock stopped: {}", e);
        }
    });

    log::info!("🚀 Ledger mock listening on http://{}", addr);
    Ok(addr)
}

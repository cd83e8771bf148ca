mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use clap::Parser;
use log::info;
use mt5_core::remote::HttpRemoteService;
use mt5_core::BridgeService;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

const DEFAULT_REMOTE_URL: &str = "https://mt-provisioning-api-v1.agiliumtrade.agiliumtrade.ai";

/// HTTP bridge over the remote MT5 account-management service.
#[derive(Parser)]
struct Args {
    /// Port to listen on.
    #[arg(long, default_value_t = 3000)]
    port: u16,

    /// Base URL of the remote provisioning API.
    #[arg(long, default_value = DEFAULT_REMOTE_URL)]
    remote_url: String,
}

// App State
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<BridgeService>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!("=== MT5 Bridge Backend Starting ===");

    let args = Args::parse();

    // The remote credential is required up front; refusing to start beats
    // failing on the first request.
    let token = std::env::var("METAAPI_TOKEN")
        .map_err(|_| anyhow::anyhow!("METAAPI_TOKEN must be set before starting the backend"))?;

    info!("Using remote provisioning API at {}", args.remote_url);
    let remote = Arc::new(HttpRemoteService::new(&args.remote_url, &token));
    let service = Arc::new(BridgeService::new(remote));
    let state = AppState { service };

    let app = Router::new()
        .route("/health", get(handlers::health))
        .route("/api/mt5/connect", post(handlers::connect))
        .route("/api/mt5/account-info", get(handlers::account_info))
        .route("/api/mt5/history", get(handlers::history))
        .route("/api/mt5/disconnect", post(handlers::disconnect))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", args.port);
    info!("MT5 Bridge Backend listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

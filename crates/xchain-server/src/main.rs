//! xchain-server
//!
//! HTTP surface over the cross-chain USDC payments orchestrator.
//!
//! Architecture:
//! 1. Serve the `v1/operations/*` HTTP surface (planner, executor, query API).
//! 2. Run the reconciler as a sibling background task.
//! 3. Shut down both cleanly on Ctrl-C.

use std::sync::Arc;

use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use xchain_engine::{Reconciler, ReconcilerDeps};
use xchain_gateway::HttpGatewayClient;
use xchain_server::{app_router, AppState, ServerConfig};
use xchain_store::SledRecordStore;
use xchain_swap::HttpSwapRouterClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "xchain_server=info".into()),
        )
        .init();

    dotenvy::dotenv().ok();
    let config = ServerConfig::from_env()?;

    info!("Starting xchain-server");
    info!("Gateway: {}", config.gateway_base_url);
    info!("Swap router: {}", config.swap_base_url);
    info!("Store path: {}", config.store_path);

    let store: Arc<dyn xchain_store::RecordStore> =
        Arc::new(SledRecordStore::open(&config.store_path)?);
    let gateway: Arc<dyn xchain_gateway::GatewayClient> =
        Arc::new(HttpGatewayClient::new(config.gateway_base_url.clone()));
    let swap: Arc<dyn xchain_swap::SwapRouterClient> =
        Arc::new(HttpSwapRouterClient::new(config.swap_base_url.clone()));

    let reconciler = Arc::new(Reconciler::with_interval(
        ReconcilerDeps {
            store: Arc::clone(&store),
            gateway: Arc::clone(&gateway),
            swap: Arc::clone(&swap),
            signer: config.delegate_address.clone(),
            delegate_priv_key: config.delegate_private_key.clone(),
            relayer_priv_key: config.relayer_private_key.clone(),
        },
        std::time::Duration::from_secs(config.reconcile_interval_secs),
    ));

    let reconciler_handle = Arc::clone(&reconciler)
        .spawn()
        .expect("reconciler was not already running");

    let state = AppState {
        store,
        gateway,
        swap,
        reconciler,
        signer: config.delegate_address.clone(),
        delegate_address: config.delegate_address,
        delegate_private_key: config.delegate_private_key,
        relayer_private_key: config.relayer_private_key,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = app_router(state).layer(cors);
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!("Listening on {}", config.bind_address);

    tokio::select! {
        result = axum::serve(listener, app.into_make_service()) => {
            if let Err(err) = result {
                error!("HTTP server error: {}", err);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down xchain-server...");
        }
    }

    reconciler_handle.abort();
    Ok(())
}

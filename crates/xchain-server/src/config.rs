//! Server configuration.

use anyhow::{Context, Result};
use std::env;

/// Server configuration, loaded once at startup from the environment.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to.
    pub bind_address: String,
    /// Path to the `sled` record store database.
    pub store_path: String,
    /// Base URL of the settlement gateway service.
    pub gateway_base_url: String,
    /// Base URL of the swap-router aggregator service.
    pub swap_base_url: String,
    /// Address of the server-held delegate key, authorized to sign burn
    /// intents on a depositor's behalf once added.
    pub delegate_address: String,
    /// Private key the planner/executor use to sign delegate-authorized
    /// burn intents.
    pub delegate_private_key: String,
    /// Private key the process-wide relayer uses to submit mint transactions.
    pub relayer_private_key: String,
    /// Reconciler poll interval in seconds.
    pub reconcile_interval_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let bind_address =
            env::var("XCHAIN_BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let store_path =
            env::var("XCHAIN_STORE_PATH").unwrap_or_else(|_| "data/xchain-store".to_string());

        let gateway_base_url = env::var("XCHAIN_GATEWAY_URL")
            .context("XCHAIN_GATEWAY_URL must be set")?;

        let swap_base_url = env::var("XCHAIN_SWAP_ROUTER_URL")
            .context("XCHAIN_SWAP_ROUTER_URL must be set")?;

        let delegate_address = env::var("XCHAIN_DELEGATE_ADDRESS")
            .context("XCHAIN_DELEGATE_ADDRESS must be set")?;

        let delegate_private_key = env::var("XCHAIN_DELEGATE_PRIVATE_KEY")
            .context("XCHAIN_DELEGATE_PRIVATE_KEY must be set")?;

        let relayer_private_key = env::var("XCHAIN_RELAYER_PRIVATE_KEY")
            .context("XCHAIN_RELAYER_PRIVATE_KEY must be set")?;

        let reconcile_interval_secs: u64 = env::var("XCHAIN_RECONCILE_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        Ok(Self {
            bind_address,
            store_path,
            gateway_base_url,
            swap_base_url,
            delegate_address,
            delegate_private_key,
            relayer_private_key,
            reconcile_interval_secs,
        })
    }
}

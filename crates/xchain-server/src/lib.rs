//! HTTP surface over the cross-chain USDC payments orchestrator: an axum
//! router wiring each `v1/operations/*` path to an `xchain_engine` function,
//! plus the environment-driven configuration the binary loads at startup.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;

pub use config::ServerConfig;
pub use routes::{app_router, AppState};

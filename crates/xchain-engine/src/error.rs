//! Engine-wide error type realizing the four error kinds (Validation,
//! NotFound, Transient, Terminal), shaped after
//! `zkpf-rails-starknet/zkpf-starknet-l2/src/error.rs`'s `StarknetRailError`.

use thiserror::Error;
use xchain_gateway::GatewayError;
use xchain_math::MathError;
use xchain_store::StoreError;
use xchain_swap::SwapError;

#[derive(Debug, Error)]
pub enum EngineError {
    /// User-fixable input error: unknown chain, empty recipients, insufficient funds.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Operation or user missing.
    #[error("not found: {0}")]
    NotFound(String),

    /// Retryable: gateway HTTP error, RPC read failure, swap-router quote
    /// failure, deposit not yet finalized. Never mutates step status away
    /// from PENDING.
    #[error("transient error: {0}")]
    Transient(String),

    /// Sets the step FAILED and propagates to operation FAILED.
    #[error("terminal step failure: {0}")]
    Terminal(String),
}

impl EngineError {
    pub fn error_code(&self) -> &'static str {
        match self {
            EngineError::BadRequest(_) => "BAD_REQUEST",
            EngineError::NotFound(_) => "NOT_FOUND",
            EngineError::Transient(_) => "TRANSIENT",
            EngineError::Terminal(_) => "TERMINAL",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Transient(_))
    }

    pub fn suggested_status_code(&self) -> u16 {
        match self {
            EngineError::BadRequest(_) => 400,
            EngineError::NotFound(_) => 404,
            EngineError::Transient(_) => 503,
            EngineError::Terminal(_) => 422,
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::OperationNotFound(id) => EngineError::NotFound(format!("operation {id}")),
            StoreError::StepNotFound(op, idx) => EngineError::NotFound(format!("step {op}/{idx}")),
            StoreError::Conflict(msg) => EngineError::Transient(msg),
            StoreError::Backend(msg) => EngineError::Transient(msg),
        }
    }
}

impl From<GatewayError> for EngineError {
    fn from(err: GatewayError) -> Self {
        if err.is_retryable() {
            EngineError::Transient(err.to_string())
        } else {
            EngineError::Terminal(err.to_string())
        }
    }
}

impl From<SwapError> for EngineError {
    fn from(err: SwapError) -> Self {
        EngineError::Transient(err.to_string())
    }
}

impl From<MathError> for EngineError {
    fn from(err: MathError) -> Self {
        EngineError::BadRequest(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_not_found_maps_to_engine_not_found() {
        let err: EngineError = StoreError::OperationNotFound("op-1".into()).into();
        assert_eq!(err.error_code(), "NOT_FOUND");
        assert_eq!(err.suggested_status_code(), 404);
    }

    #[test]
    fn retryable_gateway_error_is_transient() {
        let err: EngineError = GatewayError::Http("timeout".into()).into();
        assert!(err.is_retryable());
    }

    #[test]
    fn attestation_expired_is_terminal() {
        let err: EngineError = GatewayError::AttestationExpired("x".into()).into();
        assert!(!err.is_retryable());
        assert_eq!(err.error_code(), "TERMINAL");
    }
}

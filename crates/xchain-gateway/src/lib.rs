//! HTTP facade over the cross-chain USDC settlement service: deposited
//! balances, on-chain balances, delegate authorization, burn-intent
//! submission, and destination-chain minting.
//!
//! Mirrors the shape of [`xchain_math`]'s fee math and [`xchain_chains`]'s
//! catalogue at the call sites that need `maxFee` defaults and chain lookups.

use alloy_primitives::U256;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by the gateway. Mirrors the four-kind split in the error
/// handling design: validation is caught before a call is ever made, so only
/// transient and terminal (selector-classified) kinds appear here.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway http error: {0}")]
    Http(String),

    #[error("on-chain rpc read failed: {0}")]
    Rpc(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The settlement service's `TransferSpecHashUsed` selector: the
    /// attestation was already consumed by a prior mint attempt.
    #[error("attestation already consumed: {0}")]
    TransferSpecHashUsed(String),

    /// The settlement service's `AttestationExpiredAtIndex` selector.
    #[error("attestation expired: {0}")]
    AttestationExpired(String),
}

impl GatewayError {
    pub fn error_code(&self) -> &'static str {
        match self {
            GatewayError::Http(_) => "GATEWAY_HTTP_ERROR",
            GatewayError::Rpc(_) => "RPC_READ_FAILED",
            GatewayError::InvalidInput(_) => "INVALID_INPUT",
            GatewayError::TransferSpecHashUsed(_) => "TRANSFER_SPEC_HASH_USED",
            GatewayError::AttestationExpired(_) => "ATTESTATION_EXPIRED",
        }
    }

    /// Transient errors are retried by the reconciler without mutating step
    /// status; `TransferSpecHashUsed` is handled as a success by the caller,
    /// and `AttestationExpired` is terminal, so neither is retryable here.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::Http(_) | GatewayError::Rpc(_))
    }

    pub fn suggested_status_code(&self) -> u16 {
        match self {
            GatewayError::InvalidInput(_) => 400,
            GatewayError::Http(_) => 502,
            GatewayError::Rpc(_) => 502,
            GatewayError::TransferSpecHashUsed(_) => 200,
            GatewayError::AttestationExpired(_) => 422,
        }
    }

    /// Interprets a raw error body or revert reason from a failed mint
    /// submission, recognizing the settlement service's selector-based
    /// classifications. Anything unrecognized is treated as transient.
    pub fn classify_mint_error(raw: &str) -> GatewayError {
        if raw.contains("TransferSpecHashUsed") {
            GatewayError::TransferSpecHashUsed(raw.to_string())
        } else if raw.contains("AttestationExpiredAtIndex") {
            GatewayError::AttestationExpired(raw.to_string())
        } else {
            GatewayError::Http(raw.to_string())
        }
    }
}

/// USDC already deposited in the settlement service on one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositedBalance {
    pub chain: String,
    pub balance_minor: U256,
}

/// Typed-data burn intent, built locally and signed by the depositor's
/// delegate key before submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurnIntent {
    pub source_chain: String,
    pub destination_chain: String,
    pub amount_minor: U256,
    pub depositor: String,
    pub recipient: String,
    pub signer: String,
    pub max_fee_minor: U256,
}

/// Builds a burn intent, defaulting `max_fee_minor` to [`xchain_math::calc_max_fee`]
/// when the caller doesn't supply one.
pub fn create_burn_intent(
    source_chain: impl Into<String>,
    destination_chain: impl Into<String>,
    amount_minor: U256,
    depositor: impl Into<String>,
    recipient: impl Into<String>,
    signer: impl Into<String>,
    max_fee_minor: Option<U256>,
) -> BurnIntent {
    BurnIntent {
        source_chain: source_chain.into(),
        destination_chain: destination_chain.into(),
        amount_minor,
        depositor: depositor.into(),
        recipient: recipient.into(),
        signer: signer.into(),
        max_fee_minor: max_fee_minor.unwrap_or_else(|| xchain_math::calc_max_fee(amount_minor)),
    }
}

/// Attestation and operator signature returned by a successful burn-intent
/// submission. Opaque to the caller; persisted verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurnIntentReceipt {
    pub attestation: String,
    pub operator_signature: String,
}

#[async_trait]
pub trait GatewayClient: Send + Sync {
    /// USDC already deposited in the settlement service, per chain.
    async fn get_balance(&self, wallet_address: &str) -> Result<Vec<DepositedBalance>, GatewayError>;

    /// ERC-20 balance on chain (not yet deposited).
    async fn get_on_chain_balance(&self, chain: &str, wallet_address: &str) -> Result<U256, GatewayError>;

    async fn is_delegate_authorized(
        &self,
        chain: &str,
        depositor: &str,
        delegate: &str,
    ) -> Result<bool, GatewayError>;

    /// Suspends on HTTP. Submits the delegate-signed burn intent to the
    /// settlement service and returns the attestation + operator signature.
    async fn sign_and_submit_burn_intent(
        &self,
        intent: &BurnIntent,
        delegate_priv_key: &str,
    ) -> Result<BurnIntentReceipt, GatewayError>;

    /// Suspends on RPC. Submits the destination-chain mint transaction using
    /// the process-wide relayer key, returning the transaction hash.
    async fn execute_mint(
        &self,
        dest_chain: &str,
        attestation: &str,
        operator_signature: &str,
        relayer_priv_key: &str,
    ) -> Result<String, GatewayError>;
}

/// Production client backed by the settlement service's REST API.
pub struct HttpGatewayClient {
    base_url: String,
    http: reqwest::Client,
}

impl HttpGatewayClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl GatewayClient for HttpGatewayClient {
    async fn get_balance(&self, wallet_address: &str) -> Result<Vec<DepositedBalance>, GatewayError> {
        let url = format!("{}/v1/balances/{wallet_address}", self.base_url);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| GatewayError::Http(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(GatewayError::Http(format!("status {}", resp.status())));
        }
        resp.json()
            .await
            .map_err(|e| GatewayError::Http(e.to_string()))
    }

    async fn get_on_chain_balance(&self, chain: &str, wallet_address: &str) -> Result<U256, GatewayError> {
        let url = format!("{}/v1/chains/{chain}/balances/{wallet_address}", self.base_url);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| GatewayError::Rpc(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(GatewayError::Rpc(format!("status {}", resp.status())));
        }
        let body: serde_json::Value = resp.json().await.map_err(|e| GatewayError::Rpc(e.to_string()))?;
        let raw = body
            .get("balance_minor")
            .and_then(|v| v.as_str())
            .ok_or_else(|| GatewayError::Rpc("missing balance_minor".to_string()))?;
        U256::from_str_radix(raw, 10).map_err(|e| GatewayError::Rpc(e.to_string()))
    }

    async fn is_delegate_authorized(
        &self,
        chain: &str,
        depositor: &str,
        delegate: &str,
    ) -> Result<bool, GatewayError> {
        let url = format!(
            "{}/v1/chains/{chain}/delegates/{depositor}/{delegate}",
            self.base_url
        );
        let resp = self.http.get(&url).send().await;
        // A failed probe counts as not-authorized rather than aborting the plan.
        match resp {
            Ok(r) if r.status().is_success() => r
                .json::<serde_json::Value>()
                .await
                .map(|v| v.get("authorized").and_then(|b| b.as_bool()).unwrap_or(false))
                .or(Ok(false)),
            _ => Ok(false),
        }
    }

    async fn sign_and_submit_burn_intent(
        &self,
        intent: &BurnIntent,
        _delegate_priv_key: &str,
    ) -> Result<BurnIntentReceipt, GatewayError> {
        let url = format!("{}/v1/burn-intents", self.base_url);
        let resp = self
            .http
            .post(&url)
            .json(intent)
            .send()
            .await
            .map_err(|e| GatewayError::Http(e.to_string()))?;
        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GatewayError::Http(body));
        }
        resp.json()
            .await
            .map_err(|e| GatewayError::Http(e.to_string()))
    }

    async fn execute_mint(
        &self,
        dest_chain: &str,
        attestation: &str,
        operator_signature: &str,
        _relayer_priv_key: &str,
    ) -> Result<String, GatewayError> {
        let call = xchain_calls::gateway_mint(
            xchain_chains::get(dest_chain)
                .map(|c| c.usdc_address)
                .unwrap_or(dest_chain),
            attestation.as_bytes(),
            operator_signature.as_bytes(),
        );
        let url = format!("{}/v1/chains/{dest_chain}/mint", self.base_url);
        let resp = self
            .http
            .post(&url)
            .json(&call)
            .send()
            .await
            .map_err(|e| GatewayError::Rpc(e.to_string()))?;
        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GatewayError::classify_mint_error(&body));
        }
        let body: serde_json::Value = resp.json().await.map_err(|e| GatewayError::Rpc(e.to_string()))?;
        body.get("txHash")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| GatewayError::Rpc("missing txHash".to_string()))
    }
}

/// Deterministic, in-memory client for engine tests: programmable balances,
/// authorizations, and canned burn/mint outcomes, with no network I/O.
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct MockGatewayClient {
        pub deposited: Mutex<HashMap<String, Vec<DepositedBalance>>>,
        pub on_chain: Mutex<HashMap<(String, String), U256>>,
        pub authorized: Mutex<HashMap<(String, String, String), bool>>,
        /// Next burn-intent outcome; consumed once per call, cleared after.
        pub next_burn_result: Mutex<Option<Result<BurnIntentReceipt, String>>>,
        /// Next mint outcome; consumed once per call, cleared after.
        pub next_mint_result: Mutex<Option<Result<String, String>>>,
    }

    impl MockGatewayClient {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_deposited(&self, wallet: &str, balances: Vec<DepositedBalance>) {
            self.deposited.lock().unwrap().insert(wallet.to_string(), balances);
        }

        pub fn set_on_chain_balance(&self, chain: &str, wallet: &str, amount: U256) {
            self.on_chain
                .lock()
                .unwrap()
                .insert((chain.to_string(), wallet.to_string()), amount);
        }

        pub fn set_authorized(&self, chain: &str, depositor: &str, delegate: &str, authorized: bool) {
            self.authorized.lock().unwrap().insert(
                (chain.to_string(), depositor.to_string(), delegate.to_string()),
                authorized,
            );
        }

        pub fn queue_burn_result(&self, result: Result<BurnIntentReceipt, String>) {
            *self.next_burn_result.lock().unwrap() = Some(result);
        }

        pub fn queue_mint_result(&self, result: Result<String, String>) {
            *self.next_mint_result.lock().unwrap() = Some(result);
        }
    }

    #[async_trait]
    impl GatewayClient for MockGatewayClient {
        async fn get_balance(&self, wallet_address: &str) -> Result<Vec<DepositedBalance>, GatewayError> {
            Ok(self
                .deposited
                .lock()
                .unwrap()
                .get(wallet_address)
                .cloned()
                .unwrap_or_default())
        }

        async fn get_on_chain_balance(&self, chain: &str, wallet_address: &str) -> Result<U256, GatewayError> {
            Ok(self
                .on_chain
                .lock()
                .unwrap()
                .get(&(chain.to_string(), wallet_address.to_string()))
                .copied()
                .unwrap_or(U256::ZERO))
        }

        async fn is_delegate_authorized(
            &self,
            chain: &str,
            depositor: &str,
            delegate: &str,
        ) -> Result<bool, GatewayError> {
            Ok(self
                .authorized
                .lock()
                .unwrap()
                .get(&(chain.to_string(), depositor.to_string(), delegate.to_string()))
                .copied()
                .unwrap_or(false))
        }

        async fn sign_and_submit_burn_intent(
            &self,
            _intent: &BurnIntent,
            _delegate_priv_key: &str,
        ) -> Result<BurnIntentReceipt, GatewayError> {
            match self.next_burn_result.lock().unwrap().take() {
                Some(Ok(receipt)) => Ok(receipt),
                Some(Err(msg)) => Err(GatewayError::Http(msg)),
                None => Ok(BurnIntentReceipt {
                    attestation: "mock-attestation".to_string(),
                    operator_signature: "mock-operator-sig".to_string(),
                }),
            }
        }

        async fn execute_mint(
            &self,
            _dest_chain: &str,
            _attestation: &str,
            _operator_signature: &str,
            _relayer_priv_key: &str,
        ) -> Result<String, GatewayError> {
            match self.next_mint_result.lock().unwrap().take() {
                Some(Ok(tx_hash)) => Ok(tx_hash),
                Some(Err(msg)) => Err(GatewayError::classify_mint_error(&msg)),
                None => Ok("0xmocktxhash".to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_recognizes_known_selectors() {
        assert!(matches!(
            GatewayError::classify_mint_error("revert TransferSpecHashUsed(0x1)"),
            GatewayError::TransferSpecHashUsed(_)
        ));
        assert!(matches!(
            GatewayError::classify_mint_error("revert AttestationExpiredAtIndex(2)"),
            GatewayError::AttestationExpired(_)
        ));
        assert!(matches!(
            GatewayError::classify_mint_error("connection reset"),
            GatewayError::Http(_)
        ));
    }

    #[test]
    fn transfer_spec_hash_used_is_not_retryable() {
        let err = GatewayError::classify_mint_error("TransferSpecHashUsed");
        assert!(!err.is_retryable());
        assert_eq!(err.error_code(), "TRANSFER_SPEC_HASH_USED");
    }

    #[test]
    fn attestation_expired_is_terminal_not_retryable() {
        let err = GatewayError::classify_mint_error("AttestationExpiredAtIndex");
        assert!(!err.is_retryable());
        assert_eq!(err.suggested_status_code(), 422);
    }

    #[test]
    fn create_burn_intent_defaults_to_calc_max_fee() {
        let intent = create_burn_intent(
            "base",
            "ethereum",
            U256::from(1_000_000u64),
            "0xdepositor",
            "0xrecipient",
            "0xsigner",
            None,
        );
        assert_eq!(intent.max_fee_minor, xchain_math::calc_max_fee(U256::from(1_000_000u64)));
    }

    #[tokio::test]
    async fn mock_client_reports_configured_balances() {
        let client = mock::MockGatewayClient::new();
        client.set_on_chain_balance("base", "0xwallet", U256::from(42u64));
        assert_eq!(
            client.get_on_chain_balance("base", "0xwallet").await.unwrap(),
            U256::from(42u64)
        );
        assert_eq!(
            client.get_on_chain_balance("base", "0xother").await.unwrap(),
            U256::ZERO
        );
    }
}

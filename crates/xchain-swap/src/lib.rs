//! HTTP facade over the swap-router aggregator: quotes and call-payload
//! assembly for the `LIFI_SWAP` step type.

use alloy_primitives::U256;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use xchain_calls::CallRequest;

/// Placeholder address the aggregator uses for a chain's native asset, where
/// no ERC-20 approve is needed before the swap call.
pub const NATIVE_TOKEN_PLACEHOLDER: &str = "0x0000000000000000000000000000000000000000";

#[derive(Debug, Error)]
pub enum SwapError {
    #[error("swap-router http error: {0}")]
    Http(String),

    #[error("invalid quote request: {0}")]
    InvalidInput(String),
}

impl SwapError {
    pub fn error_code(&self) -> &'static str {
        match self {
            SwapError::Http(_) => "SWAP_ROUTER_HTTP_ERROR",
            SwapError::InvalidInput(_) => "INVALID_INPUT",
        }
    }

    /// Quote failures are always transient — a soft error retried next tick.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SwapError::Http(_))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub from_chain: String,
    pub to_chain: String,
    pub from_token: String,
    pub to_token: String,
    pub from_amount_minor: U256,
    pub from_address: String,
    pub to_address: Option<String>,
    pub slippage_bps: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteEstimate {
    pub to_amount_minor: U256,
    pub to_amount_min_minor: U256,
    pub execution_duration_s: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub to: String,
    pub data: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub tool: String,
    pub action: String,
    pub estimate: QuoteEstimate,
    pub transaction_request: TransactionRequest,
}

#[async_trait]
pub trait SwapRouterClient: Send + Sync {
    async fn get_quote(&self, request: &QuoteRequest) -> Result<Quote, SwapError>;

    /// Produces the approve+swap call list for a given quote; the approve is
    /// skipped when `from_token` is the chain's native-asset placeholder.
    fn build_swap_calls(&self, quote: &Quote, from_token: &str, amount_minor: U256) -> Vec<CallRequest>;
}

/// Production client backed by the aggregator's REST API.
pub struct HttpSwapRouterClient {
    base_url: String,
    http: reqwest::Client,
}

impl HttpSwapRouterClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl SwapRouterClient for HttpSwapRouterClient {
    async fn get_quote(&self, request: &QuoteRequest) -> Result<Quote, SwapError> {
        let url = format!("{}/v1/quote", self.base_url);
        let resp = self
            .http
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| SwapError::Http(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(SwapError::Http(format!("status {}", resp.status())));
        }
        resp.json().await.map_err(|e| SwapError::Http(e.to_string()))
    }

    fn build_swap_calls(&self, quote: &Quote, from_token: &str, amount_minor: U256) -> Vec<CallRequest> {
        let swap_call = CallRequest {
            to: quote.transaction_request.to.clone(),
            data: quote.transaction_request.data.clone(),
            value: quote.transaction_request.value.clone(),
        };
        if from_token.eq_ignore_ascii_case(NATIVE_TOKEN_PLACEHOLDER) {
            vec![swap_call]
        } else {
            let approve = xchain_calls::erc20_approve(from_token, &quote.transaction_request.to, amount_minor);
            vec![approve, swap_call]
        }
    }
}

/// Deterministic, in-memory client for engine tests.
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct MockSwapRouterClient {
        pub next_quote: Mutex<Option<Result<Quote, String>>>,
    }

    impl MockSwapRouterClient {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn queue_quote(&self, result: Result<Quote, String>) {
            *self.next_quote.lock().unwrap() = Some(result);
        }

        fn default_quote(request: &QuoteRequest) -> Quote {
            Quote {
                tool: "mock-aggregator".to_string(),
                action: "swap".to_string(),
                estimate: QuoteEstimate {
                    to_amount_minor: request.from_amount_minor,
                    to_amount_min_minor: request.from_amount_minor,
                    execution_duration_s: 30,
                },
                transaction_request: TransactionRequest {
                    to: "0xswaprouter".to_string(),
                    data: "0xmockswapdata".to_string(),
                    value: None,
                },
            }
        }
    }

    #[async_trait]
    impl SwapRouterClient for MockSwapRouterClient {
        async fn get_quote(&self, request: &QuoteRequest) -> Result<Quote, SwapError> {
            match self.next_quote.lock().unwrap().take() {
                Some(Ok(quote)) => Ok(quote),
                Some(Err(msg)) => Err(SwapError::Http(msg)),
                None => Ok(Self::default_quote(request)),
            }
        }

        fn build_swap_calls(&self, quote: &Quote, from_token: &str, amount_minor: U256) -> Vec<CallRequest> {
            HttpSwapRouterClient::new("unused").build_swap_calls(quote, from_token, amount_minor)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_quote() -> Quote {
        Quote {
            tool: "lifi".to_string(),
            action: "swap".to_string(),
            estimate: QuoteEstimate {
                to_amount_minor: U256::from(100u64),
                to_amount_min_minor: U256::from(97u64),
                execution_duration_s: 20,
            },
            transaction_request: TransactionRequest {
                to: "0xrouter".to_string(),
                data: "0xdead".to_string(),
                value: None,
            },
        }
    }

    #[test]
    fn native_token_skips_approve() {
        let client = HttpSwapRouterClient::new("http://unused");
        let calls = client.build_swap_calls(&sample_quote(), NATIVE_TOKEN_PLACEHOLDER, U256::from(100u64));
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].to, "0xrouter");
    }

    #[test]
    fn erc20_token_prepends_approve() {
        let client = HttpSwapRouterClient::new("http://unused");
        let calls = client.build_swap_calls(&sample_quote(), "0xusdc", U256::from(100u64));
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].to, "0xusdc");
        assert_eq!(calls[1].to, "0xrouter");
    }

    #[tokio::test]
    async fn mock_client_returns_queued_error() {
        let client = mock::MockSwapRouterClient::new();
        client.queue_quote(Err("quote service down".to_string()));
        let request = QuoteRequest {
            from_chain: "base".to_string(),
            to_chain: "ethereum".to_string(),
            from_token: "0xusdc".to_string(),
            to_token: "0xusdc".to_string(),
            from_amount_minor: U256::from(1u64),
            from_address: "0xuser".to_string(),
            to_address: None,
            slippage_bps: 50,
        };
        let err = client.get_quote(&request).await.unwrap_err();
        assert!(err.is_retryable());
    }
}

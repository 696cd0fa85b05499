//! The two functions `submitOperation` and the reconciler tick both call,
//! so the two call sites cannot drift (per the "Eager vs. reconciled
//! paths" design note).

use xchain_gateway::GatewayClient;
use xchain_store::BurnParams;

use crate::classify::{classify_burn_result, classify_mint_result, BurnOutcome, MintOutcome};

/// Attempts to sign and submit a burn intent. Suspends on HTTP.
pub async fn advance_burn(
    params: &BurnParams,
    signer: &str,
    delegate_priv_key: &str,
    gateway: &dyn GatewayClient,
) -> BurnOutcome {
    let intent = xchain_gateway::create_burn_intent(
        params.source_chain.clone(),
        params.destination_chain.clone(),
        params.amount.minor(),
        params.depositor.clone(),
        params.recipient.clone(),
        signer,
        None,
    );
    let result = gateway.sign_and_submit_burn_intent(&intent, delegate_priv_key).await;
    classify_burn_result(result)
}

/// Attempts the destination-chain mint transaction. Suspends on RPC.
pub async fn advance_mint(
    dest_chain: &str,
    attestation: &str,
    operator_signature: &str,
    relayer_priv_key: &str,
    gateway: &dyn GatewayClient,
) -> MintOutcome {
    let result = gateway
        .execute_mint(dest_chain, attestation, operator_signature, relayer_priv_key)
        .await;
    classify_mint_result(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::U256;
    use xchain_gateway::mock::MockGatewayClient;
    use xchain_math::Usdc6;

    fn sample_params() -> BurnParams {
        BurnParams {
            source_chain: "base".to_string(),
            destination_chain: "ethereum".to_string(),
            amount: Usdc6::from_minor(U256::from(1_000_000u64)),
            depositor: "0xdepositor".to_string(),
            recipient: "0xrecipient".to_string(),
        }
    }

    #[tokio::test]
    async fn advance_burn_confirms_on_success() {
        let gateway = MockGatewayClient::new();
        let outcome = advance_burn(&sample_params(), "0xsigner", "priv", &gateway).await;
        assert!(matches!(outcome, BurnOutcome::Confirmed { .. }));
    }

    #[tokio::test]
    async fn advance_burn_retries_on_failure() {
        let gateway = MockGatewayClient::new();
        gateway.queue_burn_result(Err("deposit not finalized".to_string()));
        let outcome = advance_burn(&sample_params(), "0xsigner", "priv", &gateway).await;
        assert!(matches!(outcome, BurnOutcome::Retry { .. }));
    }

    #[tokio::test]
    async fn advance_mint_reports_already_consumed() {
        let gateway = MockGatewayClient::new();
        gateway.queue_mint_result(Err("revert TransferSpecHashUsed(0x1)".to_string()));
        let outcome = advance_mint("ethereum", "att", "sig", "relayer-priv", &gateway).await;
        assert!(matches!(outcome, MintOutcome::AlreadyConsumed { .. }));
    }
}

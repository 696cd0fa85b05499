//! Pure classifier for mint outcomes. No I/O: takes the `Result` a gateway
//! call already produced and decides how the step/operation should react.

use xchain_gateway::GatewayError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MintOutcome {
    /// Mint transaction landed; step becomes CONFIRMED with this tx hash.
    Confirmed { tx_hash: String },
    /// `TransferSpecHashUsed`: a previous attempt already landed. Step
    /// becomes CONFIRMED with an explanatory note, per the idempotency rule.
    AlreadyConsumed { note: String },
    /// `AttestationExpiredAtIndex`: terminal failure, step becomes FAILED.
    Expired { message: String },
    /// Any other error: leave PENDING, let the reconciler retry.
    Retry { reason: String },
}

pub fn classify_mint_result(result: Result<String, GatewayError>) -> MintOutcome {
    match result {
        Ok(tx_hash) => MintOutcome::Confirmed { tx_hash },
        Err(GatewayError::TransferSpecHashUsed(msg)) => MintOutcome::AlreadyConsumed {
            note: format!("already consumed: {msg}"),
        },
        Err(GatewayError::AttestationExpired(msg)) => MintOutcome::Expired { message: msg },
        Err(other) => MintOutcome::Retry { reason: other.to_string() },
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BurnOutcome {
    Confirmed { attestation: String, operator_signature: String },
    /// Burn-intent submission itself failed; deposit finality is the
    /// likely cause. Leave PENDING.
    Retry { reason: String },
}

pub fn classify_burn_result(
    result: Result<xchain_gateway::BurnIntentReceipt, GatewayError>,
) -> BurnOutcome {
    match result {
        Ok(receipt) => BurnOutcome::Confirmed {
            attestation: receipt.attestation,
            operator_signature: receipt.operator_signature,
        },
        Err(err) => BurnOutcome::Retry { reason: err.to_string() },
    }
}

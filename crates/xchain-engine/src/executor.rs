//! `submitOperation`: records client-signed transaction hashes, then
//! advances every server-side step the client signatures unblocked.

use xchain_gateway::GatewayClient;
use xchain_store::{now_secs, OperationStatus, RecordStore, Step, StepParams, StepStatus, StepType};

use crate::advance::{advance_burn, advance_mint};
use crate::classify::{BurnOutcome, MintOutcome};
use crate::error::EngineError;

pub struct ExecutorDeps<'a> {
    pub store: &'a dyn RecordStore,
    pub gateway: &'a dyn GatewayClient,
    pub signer: String,
    pub delegate_priv_key: String,
    pub relayer_priv_key: String,
}

/// A client-signed and broadcast transaction, reported back by the caller.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct SubmittedStep {
    pub step_id: String,
    pub tx_hash: String,
}

/// Derives the operation's status from its steps: any FAILED step fails the
/// whole operation; all-terminal completes it; any step still awaiting a
/// client signature keeps it in that state; otherwise it's processing.
pub(crate) fn derive_operation_status(steps: &[Step]) -> OperationStatus {
    if steps.iter().any(|s| s.status == StepStatus::Failed) {
        return OperationStatus::Failed;
    }
    if steps.iter().all(|s| s.status.is_terminal()) {
        return OperationStatus::Completed;
    }
    if steps.iter().any(|s| s.status == StepStatus::AwaitingSignature) {
        return OperationStatus::AwaitingSignature;
    }
    OperationStatus::Processing
}

pub async fn submit_operation(
    operation_id: &str,
    submitted: Vec<SubmittedStep>,
    deps: &ExecutorDeps<'_>,
) -> Result<(), EngineError> {
    let operation = deps.store.get_operation(operation_id).await?;
    if operation.status != OperationStatus::AwaitingSignature {
        return Err(EngineError::BadRequest(format!(
            "operation {operation_id} is not awaiting signature (status={:?})",
            operation.status
        )));
    }

    let mut steps = deps.store.list_steps(operation_id).await?;

    for submission in &submitted {
        let Some(step) = steps.iter_mut().find(|s| s.id == submission.step_id) else {
            continue;
        };
        if step.status != StepStatus::AwaitingSignature {
            continue;
        }
        deps.store
            .compare_and_swap_step_status(
                operation_id,
                step.step_index,
                StepStatus::AwaitingSignature,
                StepStatus::Confirmed,
            )
            .await?;
        step.status = StepStatus::Confirmed;
        step.tx_hash = Some(submission.tx_hash.clone());
        step.completed_at = Some(now_secs());
        deps.store.put_step(step.clone()).await?;
    }

    advance_pending_burns(operation_id, &mut steps, deps).await?;
    pair_confirmed_burns_with_mints(operation_id, &mut steps, deps).await?;
    recompute_operation_status(operation_id, &steps, deps).await?;

    Ok(())
}

pub(crate) async fn advance_pending_burns(
    operation_id: &str,
    steps: &mut [Step],
    deps: &ExecutorDeps<'_>,
) -> Result<(), EngineError> {
    for step in steps.iter_mut() {
        if step.step_type != StepType::BurnIntent || step.status != StepStatus::Pending {
            continue;
        }
        let StepParams::Burn(params) = step.params.clone() else {
            continue;
        };
        match advance_burn(&params, &deps.signer, &deps.delegate_priv_key, deps.gateway).await {
            BurnOutcome::Confirmed { attestation, operator_signature } => {
                deps.store
                    .compare_and_swap_step_status(operation_id, step.step_index, StepStatus::Pending, StepStatus::Confirmed)
                    .await?;
                step.status = StepStatus::Confirmed;
                step.attestation = Some(attestation);
                step.operator_signature = Some(operator_signature);
                step.completed_at = Some(now_secs());
                deps.store.put_step(step.clone()).await?;
            }
            BurnOutcome::Retry { reason } => {
                step.error_message = Some(reason);
            }
        }
    }
    Ok(())
}

/// Pairs every newly-confirmed burn (ascending step index) with the next
/// pending mint step and submits the mint transaction.
pub(crate) async fn pair_confirmed_burns_with_mints(
    operation_id: &str,
    steps: &mut [Step],
    deps: &ExecutorDeps<'_>,
) -> Result<(), EngineError> {
    let confirmed_burns: Vec<usize> = steps
        .iter()
        .enumerate()
        .filter(|(_, s)| s.step_type == StepType::BurnIntent && s.status == StepStatus::Confirmed && s.attestation.is_some())
        .map(|(i, _)| i)
        .collect();
    let pending_mints: Vec<usize> = steps
        .iter()
        .enumerate()
        .filter(|(_, s)| s.step_type == StepType::Mint && s.status == StepStatus::Pending)
        .map(|(i, _)| i)
        .collect();

    for (burn_idx, mint_idx) in confirmed_burns.into_iter().zip(pending_mints) {
        let (attestation, operator_signature, dest_chain) = {
            let burn = &steps[burn_idx];
            let StepParams::Burn(params) = &burn.params else {
                continue;
            };
            (
                burn.attestation.clone().expect("filtered on attestation.is_some()"),
                burn.operator_signature.clone().expect("confirmed burn always carries a signature"),
                params.destination_chain.clone(),
            )
        };
        let outcome = advance_mint(&dest_chain, &attestation, &operator_signature, &deps.relayer_priv_key, deps.gateway).await;
        let mint = &mut steps[mint_idx];
        match outcome {
            MintOutcome::Confirmed { tx_hash } => {
                deps.store
                    .compare_and_swap_step_status(operation_id, mint.step_index, StepStatus::Pending, StepStatus::Confirmed)
                    .await?;
                mint.status = StepStatus::Confirmed;
                mint.tx_hash = Some(tx_hash);
                mint.completed_at = Some(now_secs());
                deps.store.put_step(mint.clone()).await?;
            }
            // TransferSpecHashUsed: a previous attempt already landed this
            // exact attestation. Treat the mint as confirmed, not a failure.
            MintOutcome::AlreadyConsumed { note } => {
                deps.store
                    .compare_and_swap_step_status(operation_id, mint.step_index, StepStatus::Pending, StepStatus::Confirmed)
                    .await?;
                mint.status = StepStatus::Confirmed;
                mint.error_message = Some(note);
                mint.completed_at = Some(now_secs());
                deps.store.put_step(mint.clone()).await?;
            }
            MintOutcome::Expired { message } => {
                deps.store
                    .compare_and_swap_step_status(operation_id, mint.step_index, StepStatus::Pending, StepStatus::Failed)
                    .await?;
                mint.status = StepStatus::Failed;
                mint.error_message = Some(message);
                deps.store.put_step(mint.clone()).await?;
            }
            MintOutcome::Retry { reason } => {
                mint.error_message = Some(reason);
            }
        }
    }
    Ok(())
}

pub(crate) async fn recompute_operation_status(
    operation_id: &str,
    steps: &[Step],
    deps: &ExecutorDeps<'_>,
) -> Result<(), EngineError> {
    let operation = deps.store.get_operation(operation_id).await?;
    let new_status = derive_operation_status(steps);
    if new_status == operation.status {
        return Ok(());
    }
    deps.store
        .compare_and_swap_operation_status(operation_id, operation.status, new_status)
        .await?;
    if matches!(new_status, OperationStatus::Completed | OperationStatus::Failed) {
        let mut op = deps.store.get_operation(operation_id).await?;
        op.completed_at = Some(now_secs());
        deps.store.put_operation(op).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::U256;
    use xchain_gateway::mock::MockGatewayClient;
    use xchain_math::Usdc6;
    use xchain_store::{
        BurnParams, InMemoryRecordStore, Operation, OperationType, SignRequest, Step, StepParams,
    };

    fn deps<'a>(store: &'a InMemoryRecordStore, gateway: &'a MockGatewayClient) -> ExecutorDeps<'a> {
        ExecutorDeps {
            store,
            gateway,
            signer: "0xsigner".to_string(),
            delegate_priv_key: "delegate-priv".to_string(),
            relayer_priv_key: "relayer-priv".to_string(),
        }
    }

    async fn seed_bridge_operation(store: &InMemoryRecordStore) -> String {
        let mut operation = Operation::new(
            "user-1",
            OperationType::Bridge,
            serde_json::json!({}),
            serde_json::json!({}),
            Usdc6::ZERO,
            "0.25",
        );
        let operation_id = operation.id.clone();
        let deposit = Step::new(
            &operation_id,
            0,
            "base",
            StepType::ApproveAndDeposit,
            StepStatus::AwaitingSignature,
            vec![],
            StepParams::Empty,
        );
        operation.sign_requests.push(SignRequest {
            step_id: deposit.id.clone(),
            chain: "base".to_string(),
            step_type: StepType::ApproveAndDeposit,
            calls: vec![],
            description: "deposit".to_string(),
            server_side: false,
            pending_mint: false,
        });
        let burn = Step::new(
            &operation_id,
            1,
            "base",
            StepType::BurnIntent,
            StepStatus::Pending,
            vec![],
            StepParams::Burn(BurnParams {
                source_chain: "base".to_string(),
                destination_chain: "ethereum".to_string(),
                amount: Usdc6::from_minor(U256::from(100_000_000u64)),
                depositor: "0xwallet".to_string(),
                recipient: "0xwallet".to_string(),
            }),
        );
        let mint = Step::new(&operation_id, 2, "ethereum", StepType::Mint, StepStatus::Pending, vec![], StepParams::Empty);

        store.put_operation(operation).await.unwrap();
        store.put_step(deposit.clone()).await.unwrap();
        store.put_step(burn).await.unwrap();
        store.put_step(mint).await.unwrap();
        operation_id
    }

    #[tokio::test]
    async fn submit_operation_advances_burn_and_mint_then_completes() {
        let store = InMemoryRecordStore::new();
        let gateway = MockGatewayClient::new();
        let operation_id = seed_bridge_operation(&store).await;

        submit_operation(
            &operation_id,
            vec![SubmittedStep { step_id: store.list_steps(&operation_id).await.unwrap()[0].id.clone(), tx_hash: "0xdeposit".to_string() }],
            &deps(&store, &gateway),
        )
        .await
        .unwrap();

        let steps = store.list_steps(&operation_id).await.unwrap();
        assert_eq!(steps[0].status, StepStatus::Confirmed);
        assert_eq!(steps[1].status, StepStatus::Confirmed);
        assert_eq!(steps[2].status, StepStatus::Confirmed);

        let operation = store.get_operation(&operation_id).await.unwrap();
        assert_eq!(operation.status, OperationStatus::Completed);
        assert!(operation.completed_at.is_some());
    }

    #[tokio::test]
    async fn submit_operation_rejects_non_awaiting_signature() {
        let store = InMemoryRecordStore::new();
        let gateway = MockGatewayClient::new();
        let operation_id = seed_bridge_operation(&store).await;
        store
            .compare_and_swap_operation_status(&operation_id, OperationStatus::AwaitingSignature, OperationStatus::Completed)
            .await
            .unwrap();

        let err = submit_operation(&operation_id, vec![], &deps(&store, &gateway)).await.unwrap_err();
        assert!(matches!(err, EngineError::BadRequest(_)));
    }
}

//! Background reconciler: periodically retries stuck burns, pairs
//! confirmed burns with pending mints, and lifts post-mint swap steps back
//! to `AWAITING_SIGNATURE` once a fresh quote is available. Shares
//! [`advance_burn`]/[`advance_mint`] with the executor so the eager and
//! reconciled paths can never drift apart.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use xchain_chains as chains;
use xchain_gateway::GatewayClient;
use xchain_store::{now_secs, OperationStatus, RecordStore, SignRequest, Step, StepParams, StepStatus, StepType};
use xchain_swap::SwapRouterClient;

use crate::advance::{advance_burn, advance_mint};
use crate::classify::{BurnOutcome, MintOutcome};
use crate::error::EngineError;
use crate::executor::derive_operation_status;

const RECONCILE_INTERVAL: Duration = Duration::from_secs(30);
/// A `PENDING` step older than this is given up on and failed; younger
/// ones are retried instead.
const STEP_TIMEOUT_SECS: u64 = 30 * 60;

pub struct ReconcilerDeps {
    pub store: Arc<dyn RecordStore>,
    pub gateway: Arc<dyn GatewayClient>,
    pub swap: Arc<dyn SwapRouterClient>,
    pub signer: String,
    pub delegate_priv_key: String,
    pub relayer_priv_key: String,
}

pub struct Reconciler {
    deps: ReconcilerDeps,
    running: Arc<AtomicBool>,
    interval: Duration,
}

impl Reconciler {
    pub fn new(deps: ReconcilerDeps) -> Self {
        Self { deps, running: Arc::new(AtomicBool::new(false)), interval: RECONCILE_INTERVAL }
    }

    /// Same as [`Reconciler::new`] but with a caller-supplied poll interval,
    /// for deployments that override the 30s default.
    pub fn with_interval(deps: ReconcilerDeps, interval: Duration) -> Self {
        Self { deps, running: Arc::new(AtomicBool::new(false)), interval }
    }

    /// Spawns the periodic reconcile loop. A second call while one is
    /// already running is a no-op; returns `None` in that case.
    pub fn spawn(self: Arc<Self>) -> Option<tokio::task::JoinHandle<()>> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return None;
        }
        let reconciler = Arc::clone(&self);
        Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(reconciler.interval);
            while reconciler.running.load(Ordering::SeqCst) {
                interval.tick().await;
                if let Err(err) = reconciler.tick().await {
                    tracing::warn!(error = %err, "reconcile tick failed");
                }
            }
        }))
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub async fn tick(&self) -> Result<(), EngineError> {
        let operations = self.deps.store.list_processing_operations().await?;
        for operation in operations {
            if let Err(err) = self.reconcile_operation(&operation.id).await {
                tracing::warn!(operation_id = %operation.id, error = %err, "failed to reconcile operation");
            }
        }
        Ok(())
    }

    /// Runs one reconcile pass for a single operation: retries stuck burns,
    /// pairs confirmed burns with pending mints, and re-quotes any pending
    /// swap step, then recomputes the operation's status. Exposed so the
    /// HTTP surface's `refresh-swap` endpoint can trigger an on-demand pass
    /// instead of waiting for the next periodic tick.
    pub async fn reconcile_operation(&self, operation_id: &str) -> Result<(), EngineError> {
        let mut steps = self.deps.store.list_steps(operation_id).await?;

        self.retry_stuck_burns(operation_id, &mut steps).await?;
        self.pair_confirmed_burns_with_mints(operation_id, &mut steps).await?;
        self.lift_pending_swaps(operation_id, &mut steps).await?;

        let operation = self.deps.store.get_operation(operation_id).await?;
        let new_status = derive_operation_status(&steps);
        if new_status != operation.status {
            self.deps
                .store
                .compare_and_swap_operation_status(operation_id, operation.status, new_status)
                .await?;
            if matches!(new_status, OperationStatus::Completed | OperationStatus::Failed) {
                let mut op = self.deps.store.get_operation(operation_id).await?;
                op.completed_at = Some(now_secs());
                self.deps.store.put_operation(op).await?;
            }
        }
        Ok(())
    }

    async fn retry_stuck_burns(&self, operation_id: &str, steps: &mut [Step]) -> Result<(), EngineError> {
        let now = now_secs();
        for step in steps.iter_mut() {
            if step.step_type != StepType::BurnIntent || step.status != StepStatus::Pending {
                continue;
            }
            if now.saturating_sub(step.created_at) >= STEP_TIMEOUT_SECS {
                self.deps
                    .store
                    .compare_and_swap_step_status(operation_id, step.step_index, StepStatus::Pending, StepStatus::Failed)
                    .await?;
                step.status = StepStatus::Failed;
                step.error_message = Some("Timeout waiting for deposit finality".to_string());
                self.deps.store.put_step(step.clone()).await?;
                continue;
            }
            let StepParams::Burn(params) = step.params.clone() else {
                continue;
            };
            match advance_burn(&params, &self.deps.signer, &self.deps.delegate_priv_key, self.deps.gateway.as_ref()).await {
                BurnOutcome::Confirmed { attestation, operator_signature } => {
                    self.deps
                        .store
                        .compare_and_swap_step_status(operation_id, step.step_index, StepStatus::Pending, StepStatus::Confirmed)
                        .await?;
                    step.status = StepStatus::Confirmed;
                    step.attestation = Some(attestation);
                    step.operator_signature = Some(operator_signature);
                    step.completed_at = Some(now);
                    self.deps.store.put_step(step.clone()).await?;
                }
                BurnOutcome::Retry { reason } => {
                    step.error_message = Some(reason);
                }
            }
        }
        Ok(())
    }

    async fn pair_confirmed_burns_with_mints(&self, operation_id: &str, steps: &mut [Step]) -> Result<(), EngineError> {
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
            let outcome = advance_mint(&dest_chain, &attestation, &operator_signature, &self.deps.relayer_priv_key, self.deps.gateway.as_ref()).await;
            let now = now_secs();
            let mint = &mut steps[mint_idx];
            match outcome {
                MintOutcome::Confirmed { tx_hash } => {
                    self.deps
                        .store
                        .compare_and_swap_step_status(operation_id, mint.step_index, StepStatus::Pending, StepStatus::Confirmed)
                        .await?;
                    mint.status = StepStatus::Confirmed;
                    mint.tx_hash = Some(tx_hash);
                    mint.completed_at = Some(now);
                    self.deps.store.put_step(mint.clone()).await?;
                }
                MintOutcome::AlreadyConsumed { note } => {
                    self.deps
                        .store
                        .compare_and_swap_step_status(operation_id, mint.step_index, StepStatus::Pending, StepStatus::Confirmed)
                        .await?;
                    mint.status = StepStatus::Confirmed;
                    mint.error_message = Some(note);
                    mint.completed_at = Some(now);
                    self.deps.store.put_step(mint.clone()).await?;
                }
                MintOutcome::Expired { message } => {
                    self.deps
                        .store
                        .compare_and_swap_step_status(operation_id, mint.step_index, StepStatus::Pending, StepStatus::Failed)
                        .await?;
                    mint.status = StepStatus::Failed;
                    mint.error_message = Some(message);
                    self.deps.store.put_step(mint.clone()).await?;
                }
                MintOutcome::Retry { reason } => {
                    mint.error_message = Some(reason);
                }
            }
        }
        Ok(())
    }

    /// A `LIFI_SWAP` step left `PENDING` by the planner (the cross-chain,
    /// output-token path) can only be quoted once the mint ahead of it has
    /// landed real USDC on the destination chain. Re-quotes it now and lifts
    /// it to `AWAITING_SIGNATURE` so the client can sign the swap.
    async fn lift_pending_swaps(&self, operation_id: &str, steps: &mut [Step]) -> Result<(), EngineError> {
        let now = now_secs();
        let prior_step_statuses: Vec<(u32, StepStatus)> = steps.iter().map(|s| (s.step_index, s.status)).collect();

        for step in steps.iter_mut() {
            if step.step_type != StepType::LifiSwap || step.status != StepStatus::Pending {
                continue;
            }
            let preceding_terminal = prior_step_statuses
                .iter()
                .filter(|(index, _)| *index < step.step_index)
                .all(|(_, status)| status.is_terminal());
            if !preceding_terminal {
                continue;
            }
            if now.saturating_sub(step.created_at) >= STEP_TIMEOUT_SECS {
                self.deps
                    .store
                    .compare_and_swap_step_status(operation_id, step.step_index, StepStatus::Pending, StepStatus::Failed)
                    .await?;
                step.status = StepStatus::Failed;
                step.error_message = Some("Timeout waiting for deposit finality".to_string());
                self.deps.store.put_step(step.clone()).await?;
                continue;
            }
            let StepParams::Swap(params) = step.params.clone() else {
                continue;
            };
            let usdc_address = chains::get(&step.chain).map(|c| c.usdc_address).unwrap_or_default();
            let request = xchain_swap::QuoteRequest {
                from_chain: step.chain.clone(),
                to_chain: step.chain.clone(),
                from_token: usdc_address.to_string(),
                to_token: params.output_token.clone(),
                from_amount_minor: params.usdc_amount.minor(),
                from_address: params.recipient_address.clone(),
                to_address: Some(params.recipient_address.clone()),
                slippage_bps: params.slippage_bps,
            };
            let quote = match self.deps.swap.get_quote(&request).await {
                Ok(quote) => quote,
                Err(err) => {
                    step.error_message = Some(err.to_string());
                    continue;
                }
            };
            let calls = self.deps.swap.build_swap_calls(&quote, usdc_address, params.usdc_amount.minor());

            self.deps
                .store
                .compare_and_swap_step_status(operation_id, step.step_index, StepStatus::Pending, StepStatus::AwaitingSignature)
                .await?;
            step.status = StepStatus::AwaitingSignature;
            step.call_data = calls.clone();
            self.deps.store.put_step(step.clone()).await?;

            let mut operation = self.deps.store.get_operation(operation_id).await?;
            operation.sign_requests.push(SignRequest {
                step_id: step.id.clone(),
                chain: step.chain.clone(),
                step_type: step.step_type,
                calls,
                description: format!("Swap {} USDC into {}", params.usdc_amount, params.output_token),
                server_side: false,
                pending_mint: false,
            });
            self.deps.store.put_operation(operation).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::U256;
    use xchain_gateway::mock::MockGatewayClient;
    use xchain_math::Usdc6;
    use xchain_store::{BurnParams, InMemoryRecordStore, Operation, OperationType};
    use xchain_swap::mock::MockSwapRouterClient;

    fn make_deps(store: Arc<InMemoryRecordStore>, gateway: Arc<MockGatewayClient>, swap: Arc<MockSwapRouterClient>) -> ReconcilerDeps {
        ReconcilerDeps {
            store,
            gateway,
            swap,
            signer: "0xsigner".to_string(),
            delegate_priv_key: "delegate-priv".to_string(),
            relayer_priv_key: "relayer-priv".to_string(),
        }
    }

    #[tokio::test]
    async fn tick_pairs_confirmed_burn_with_pending_mint() {
        let store = Arc::new(InMemoryRecordStore::new());
        let gateway = Arc::new(MockGatewayClient::new());
        let swap = Arc::new(MockSwapRouterClient::new());

        let mut operation = Operation::new(
            "user-1",
            OperationType::Bridge,
            serde_json::json!({}),
            serde_json::json!({}),
            Usdc6::ZERO,
            "0.25",
        );
        operation.status = OperationStatus::Processing;
        let operation_id = operation.id.clone();
        let mut burn = Step::new(
            &operation_id,
            0,
            "base",
            StepType::BurnIntent,
            StepStatus::Confirmed,
            vec![],
            StepParams::Burn(BurnParams {
                source_chain: "base".to_string(),
                destination_chain: "ethereum".to_string(),
                amount: Usdc6::from_minor(U256::from(1_000_000u64)),
                depositor: "0xwallet".to_string(),
                recipient: "0xwallet".to_string(),
            }),
        );
        burn.attestation = Some("att".to_string());
        burn.operator_signature = Some("sig".to_string());
        let mint = Step::new(&operation_id, 1, "ethereum", StepType::Mint, StepStatus::Pending, vec![], StepParams::Empty);

        store.put_operation(operation).await.unwrap();
        store.put_step(burn).await.unwrap();
        store.put_step(mint).await.unwrap();

        let reconciler = Reconciler::new(make_deps(store.clone(), gateway, swap));
        reconciler.tick().await.unwrap();

        let steps = store.list_steps(&operation_id).await.unwrap();
        assert_eq!(steps[1].status, StepStatus::Confirmed);
        let operation = store.get_operation(&operation_id).await.unwrap();
        assert_eq!(operation.status, OperationStatus::Completed);
    }

    #[tokio::test]
    async fn tick_fails_burn_stuck_past_timeout() {
        let store = Arc::new(InMemoryRecordStore::new());
        let gateway = Arc::new(MockGatewayClient::new());
        let swap = Arc::new(MockSwapRouterClient::new());

        let mut operation = Operation::new(
            "user-1",
            OperationType::Bridge,
            serde_json::json!({}),
            serde_json::json!({}),
            Usdc6::ZERO,
            "0.25",
        );
        operation.status = OperationStatus::Processing;
        let operation_id = operation.id.clone();
        let mut burn = Step::new(
            &operation_id,
            0,
            "base",
            StepType::BurnIntent,
            StepStatus::Pending,
            vec![],
            StepParams::Burn(BurnParams {
                source_chain: "base".to_string(),
                destination_chain: "ethereum".to_string(),
                amount: Usdc6::from_minor(U256::from(1_000_000u64)),
                depositor: "0xwallet".to_string(),
                recipient: "0xwallet".to_string(),
            }),
        );
        burn.created_at = now_secs().saturating_sub(STEP_TIMEOUT_SECS + 1);

        store.put_operation(operation).await.unwrap();
        store.put_step(burn).await.unwrap();

        let reconciler = Reconciler::new(make_deps(store.clone(), gateway, swap));
        reconciler.tick().await.unwrap();

        let steps = store.list_steps(&operation_id).await.unwrap();
        assert_eq!(steps[0].status, StepStatus::Failed);
        assert_eq!(steps[0].error_message.as_deref(), Some("Timeout waiting for deposit finality"));
        let operation = store.get_operation(&operation_id).await.unwrap();
        assert_eq!(operation.status, OperationStatus::Failed);
    }

    #[tokio::test]
    async fn second_spawn_while_running_is_a_no_op() {
        let store = Arc::new(InMemoryRecordStore::new());
        let gateway = Arc::new(MockGatewayClient::new());
        let swap = Arc::new(MockSwapRouterClient::new());
        let reconciler = Arc::new(Reconciler::new(make_deps(store, gateway, swap)));
        let handle = reconciler.clone().spawn();
        assert!(handle.is_some());
        assert!(reconciler.clone().spawn().is_none());
        reconciler.stop();
        handle.unwrap().abort();
    }
}

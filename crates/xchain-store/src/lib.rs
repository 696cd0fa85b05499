//! Data model and Record Store for Operations and Steps.
//!
//! Follows `zkpf-backend`'s `NullifierStore` shape: a store type wrapping a
//! backend enum (`InMemory` for tests, `Persistent(sled::Db)` for the
//! service), with the same compare-and-swap discipline for status writes
//! that must not race.

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use xchain_calls::CallRequest;
use xchain_math::Usdc6;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("operation not found: {0}")]
    OperationNotFound(String),

    #[error("step not found: operation={0} index={1}")]
    StepNotFound(String, u32),

    #[error("compare-and-swap conflict: {0}")]
    Conflict(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn error_code(&self) -> &'static str {
        match self {
            StoreError::OperationNotFound(_) => "OPERATION_NOT_FOUND",
            StoreError::StepNotFound(..) => "STEP_NOT_FOUND",
            StoreError::Conflict(_) => "CONFLICT",
            StoreError::Backend(_) => "STORAGE_BACKEND_ERROR",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Backend(_) | StoreError::Conflict(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationType {
    Collect,
    Send,
    Bridge,
    BatchSend,
    SwapDeposit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationStatus {
    AwaitingSignature,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepType {
    ApproveAndDeposit,
    AddDelegate,
    Transfer,
    BurnIntent,
    Mint,
    LifiSwap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    AwaitingSignature,
    Pending,
    Confirmed,
    Skipped,
    Failed,
}

impl StepStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StepStatus::Confirmed | StepStatus::Skipped | StepStatus::Failed)
    }
}

/// Burn-intent parameters for a `BURN_INTENT` step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurnParams {
    pub source_chain: String,
    pub destination_chain: String,
    pub amount: Usdc6,
    pub depositor: String,
    pub recipient: String,
}

/// Post-mint swap parameters, reused by `LIFI_SWAP` steps per the data
/// model's note that `burnIntentData` doubles as the swap-params carrier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapParams {
    pub output_token: String,
    pub output_token_decimals: u8,
    pub slippage_bps: u32,
    pub recipient_address: String,
    pub usdc_amount: Usdc6,
}

/// An internal USDC transfer planned for a `TRANSFER` step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferParams {
    pub chain: String,
    pub amount: Usdc6,
    pub recipient: String,
}

/// Tagged variant replacing the dynamic per-step bag `burnIntentData`, per
/// the typed-port redesign note: one discriminated union serialized into
/// the store's opaque blob column instead of an untyped map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum StepParams {
    Burn(BurnParams),
    Swap(SwapParams),
    Transfer(TransferParams),
    Empty,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    pub operation_id: String,
    pub step_index: u32,
    pub chain: String,
    pub step_type: StepType,
    pub status: StepStatus,
    pub call_data: Vec<CallRequest>,
    pub params: StepParams,
    pub attestation: Option<String>,
    pub operator_signature: Option<String>,
    pub tx_hash: Option<String>,
    pub error_message: Option<String>,
    pub created_at: u64,
    pub completed_at: Option<u64>,
}

impl Step {
    pub fn new(
        operation_id: impl Into<String>,
        step_index: u32,
        chain: impl Into<String>,
        step_type: StepType,
        status: StepStatus,
        call_data: Vec<CallRequest>,
        params: StepParams,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            operation_id: operation_id.into(),
            step_index,
            chain: chain.into(),
            step_type,
            status,
            call_data,
            params,
            attestation: None,
            operator_signature: None,
            tx_hash: None,
            error_message: None,
            created_at: now_secs(),
            completed_at: None,
        }
    }
}

/// One outstanding client-signable request surfaced on the operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignRequest {
    pub step_id: String,
    pub chain: String,
    pub step_type: StepType,
    pub calls: Vec<CallRequest>,
    pub description: String,
    pub server_side: bool,
    pub pending_mint: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    pub id: String,
    pub user_id: String,
    pub operation_type: OperationType,
    pub status: OperationStatus,
    pub params: serde_json::Value,
    pub summary: serde_json::Value,
    pub sign_requests: Vec<SignRequest>,
    pub fee_amount: Usdc6,
    pub fee_percent: String,
    pub created_at: u64,
    pub completed_at: Option<u64>,
    pub error_message: Option<String>,
}

impl Operation {
    pub fn new(
        user_id: impl Into<String>,
        operation_type: OperationType,
        params: serde_json::Value,
        summary: serde_json::Value,
        fee_amount: Usdc6,
        fee_percent: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            operation_type,
            status: OperationStatus::AwaitingSignature,
            params,
            summary,
            sign_requests: Vec::new(),
            fee_amount,
            fee_percent: fee_percent.into(),
            created_at: now_secs(),
            completed_at: None,
            error_message: None,
        }
    }
}

pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_secs()
}

/// Page of operations returned by the Query API, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationPage {
    pub items: Vec<Operation>,
    pub next_cursor: Option<String>,
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn put_operation(&self, operation: Operation) -> Result<(), StoreError>;
    async fn get_operation(&self, id: &str) -> Result<Operation, StoreError>;
    async fn list_operations(
        &self,
        user_id: &str,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<OperationPage, StoreError>;

    /// Atomically transitions `operation.status` from `expected` to `new`,
    /// failing with `Conflict` if the current status has already moved on.
    async fn compare_and_swap_operation_status(
        &self,
        id: &str,
        expected: OperationStatus,
        new: OperationStatus,
    ) -> Result<(), StoreError>;

    async fn put_step(&self, step: Step) -> Result<(), StoreError>;
    async fn get_step(&self, operation_id: &str, step_index: u32) -> Result<Step, StoreError>;
    async fn list_steps(&self, operation_id: &str) -> Result<Vec<Step>, StoreError>;

    /// Atomically transitions `step.status` from `expected` to `new`,
    /// failing with `Conflict` if another writer already moved it — the
    /// PENDING -> CONFIRMED guard the executor and reconciler share.
    async fn compare_and_swap_step_status(
        &self,
        operation_id: &str,
        step_index: u32,
        expected: StepStatus,
        new: StepStatus,
    ) -> Result<(), StoreError>;

    /// Lists every operation currently non-terminal, for the reconciler tick.
    async fn list_processing_operations(&self) -> Result<Vec<Operation>, StoreError>;
}

/// In-memory implementation for tests: one `RwLock<HashMap>` per entity.
#[derive(Default)]
pub struct InMemoryRecordStore {
    operations: RwLock<HashMap<String, Operation>>,
    steps: RwLock<HashMap<(String, u32), Step>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn put_operation(&self, operation: Operation) -> Result<(), StoreError> {
        self.operations
            .write()
            .unwrap()
            .insert(operation.id.clone(), operation);
        Ok(())
    }

    async fn get_operation(&self, id: &str) -> Result<Operation, StoreError> {
        self.operations
            .read()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::OperationNotFound(id.to_string()))
    }

    async fn list_operations(
        &self,
        user_id: &str,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<OperationPage, StoreError> {
        let guard = self.operations.read().unwrap();
        let mut items: Vec<Operation> = guard
            .values()
            .filter(|op| op.user_id == user_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        let start = match cursor {
            Some(c) => items.iter().position(|op| op.id == c).map(|p| p + 1).unwrap_or(0),
            None => 0,
        };
        let page: Vec<Operation> = items.iter().skip(start).take(limit).cloned().collect();
        let next_cursor = if start + page.len() < items.len() {
            page.last().map(|op| op.id.clone())
        } else {
            None
        };
        Ok(OperationPage { items: page, next_cursor })
    }

    async fn compare_and_swap_operation_status(
        &self,
        id: &str,
        expected: OperationStatus,
        new: OperationStatus,
    ) -> Result<(), StoreError> {
        let mut guard = self.operations.write().unwrap();
        let op = guard
            .get_mut(id)
            .ok_or_else(|| StoreError::OperationNotFound(id.to_string()))?;
        if op.status != expected {
            return Err(StoreError::Conflict(format!(
                "operation {id} expected {expected:?} but was {:?}",
                op.status
            )));
        }
        op.status = new;
        Ok(())
    }

    async fn put_step(&self, step: Step) -> Result<(), StoreError> {
        self.steps
            .write()
            .unwrap()
            .insert((step.operation_id.clone(), step.step_index), step);
        Ok(())
    }

    async fn get_step(&self, operation_id: &str, step_index: u32) -> Result<Step, StoreError> {
        self.steps
            .read()
            .unwrap()
            .get(&(operation_id.to_string(), step_index))
            .cloned()
            .ok_or_else(|| StoreError::StepNotFound(operation_id.to_string(), step_index))
    }

    async fn list_steps(&self, operation_id: &str) -> Result<Vec<Step>, StoreError> {
        let guard = self.steps.read().unwrap();
        let mut steps: Vec<Step> = guard
            .values()
            .filter(|s| s.operation_id == operation_id)
            .cloned()
            .collect();
        steps.sort_by_key(|s| s.step_index);
        Ok(steps)
    }

    async fn compare_and_swap_step_status(
        &self,
        operation_id: &str,
        step_index: u32,
        expected: StepStatus,
        new: StepStatus,
    ) -> Result<(), StoreError> {
        let mut guard = self.steps.write().unwrap();
        let step = guard
            .get_mut(&(operation_id.to_string(), step_index))
            .ok_or_else(|| StoreError::StepNotFound(operation_id.to_string(), step_index))?;
        if step.status != expected {
            return Err(StoreError::Conflict(format!(
                "step {operation_id}/{step_index} expected {expected:?} but was {:?}",
                step.status
            )));
        }
        step.status = new;
        Ok(())
    }

    async fn list_processing_operations(&self) -> Result<Vec<Operation>, StoreError> {
        Ok(self
            .operations
            .read()
            .unwrap()
            .values()
            .filter(|op| {
                matches!(
                    op.status,
                    OperationStatus::AwaitingSignature | OperationStatus::Processing
                )
            })
            .cloned()
            .collect())
    }
}

/// `sled`-backed implementation, following `NullifierStore::persistent`:
/// one tree for operations keyed by id, one for steps keyed
/// `operation_id/step_index`.
pub struct SledRecordStore {
    operations: sled::Tree,
    steps: sled::Tree,
    // Serializes read-modify-write CAS sequences; sled's own CAS covers the
    // single-key race, this mutex covers the check against the decoded value.
    cas_lock: Mutex<()>,
}

impl SledRecordStore {
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, StoreError> {
        let db = sled::open(path).map_err(|e| StoreError::Backend(e.to_string()))?;
        let operations = db
            .open_tree("operations")
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let steps = db
            .open_tree("steps")
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(Self {
            operations,
            steps,
            cas_lock: Mutex::new(()),
        })
    }

    fn step_key(operation_id: &str, step_index: u32) -> String {
        format!("{operation_id}/{step_index:010}")
    }
}

#[async_trait]
impl RecordStore for SledRecordStore {
    async fn put_operation(&self, operation: Operation) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(&operation).map_err(|e| StoreError::Backend(e.to_string()))?;
        self.operations
            .insert(operation.id.as_bytes(), bytes)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn get_operation(&self, id: &str) -> Result<Operation, StoreError> {
        let bytes = self
            .operations
            .get(id.as_bytes())
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .ok_or_else(|| StoreError::OperationNotFound(id.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn list_operations(
        &self,
        user_id: &str,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<OperationPage, StoreError> {
        let mut items = Vec::new();
        for entry in self.operations.iter() {
            let (_, bytes) = entry.map_err(|e| StoreError::Backend(e.to_string()))?;
            let op: Operation = serde_json::from_slice(&bytes).map_err(|e| StoreError::Backend(e.to_string()))?;
            if op.user_id == user_id {
                items.push(op);
            }
        }
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        let start = match cursor {
            Some(c) => items.iter().position(|op| op.id == c).map(|p| p + 1).unwrap_or(0),
            None => 0,
        };
        let page: Vec<Operation> = items.iter().skip(start).take(limit).cloned().collect();
        let next_cursor = if start + page.len() < items.len() {
            page.last().map(|op| op.id.clone())
        } else {
            None
        };
        Ok(OperationPage { items: page, next_cursor })
    }

    async fn compare_and_swap_operation_status(
        &self,
        id: &str,
        expected: OperationStatus,
        new: OperationStatus,
    ) -> Result<(), StoreError> {
        let _guard = self.cas_lock.lock().unwrap();
        let before = self
            .operations
            .get(id.as_bytes())
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .ok_or_else(|| StoreError::OperationNotFound(id.to_string()))?;
        let mut operation: Operation =
            serde_json::from_slice(&before).map_err(|e| StoreError::Backend(e.to_string()))?;
        if operation.status != expected {
            return Err(StoreError::Conflict(format!(
                "operation {id} expected {expected:?} but was {:?}",
                operation.status
            )));
        }
        operation.status = new;
        let after = serde_json::to_vec(&operation).map_err(|e| StoreError::Backend(e.to_string()))?;
        self.operations
            .compare_and_swap(id.as_bytes(), Some(before.as_ref()), Some(after))
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .map_err(|_| StoreError::Conflict(format!("operation {id} changed concurrently")))
    }

    async fn put_step(&self, step: Step) -> Result<(), StoreError> {
        let key = Self::step_key(&step.operation_id, step.step_index);
        let bytes = serde_json::to_vec(&step).map_err(|e| StoreError::Backend(e.to_string()))?;
        self.steps
            .insert(key.as_bytes(), bytes)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn get_step(&self, operation_id: &str, step_index: u32) -> Result<Step, StoreError> {
        let key = Self::step_key(operation_id, step_index);
        let bytes = self
            .steps
            .get(key.as_bytes())
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .ok_or_else(|| StoreError::StepNotFound(operation_id.to_string(), step_index))?;
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn list_steps(&self, operation_id: &str) -> Result<Vec<Step>, StoreError> {
        let prefix = format!("{operation_id}/");
        let mut steps = Vec::new();
        for entry in self.steps.scan_prefix(prefix.as_bytes()) {
            let (_, bytes) = entry.map_err(|e| StoreError::Backend(e.to_string()))?;
            steps.push(serde_json::from_slice(&bytes).map_err(|e| StoreError::Backend(e.to_string()))?);
        }
        steps.sort_by_key(|s: &Step| s.step_index);
        Ok(steps)
    }

    async fn compare_and_swap_step_status(
        &self,
        operation_id: &str,
        step_index: u32,
        expected: StepStatus,
        new: StepStatus,
    ) -> Result<(), StoreError> {
        let _guard = self.cas_lock.lock().unwrap();
        let key = Self::step_key(operation_id, step_index);
        let before = self
            .steps
            .get(key.as_bytes())
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .ok_or_else(|| StoreError::StepNotFound(operation_id.to_string(), step_index))?;
        let mut step: Step = serde_json::from_slice(&before).map_err(|e| StoreError::Backend(e.to_string()))?;
        if step.status != expected {
            return Err(StoreError::Conflict(format!(
                "step {operation_id}/{step_index} expected {expected:?} but was {:?}",
                step.status
            )));
        }
        step.status = new;
        let after = serde_json::to_vec(&step).map_err(|e| StoreError::Backend(e.to_string()))?;
        self.steps
            .compare_and_swap(key.as_bytes(), Some(before.as_ref()), Some(after))
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .map_err(|_| StoreError::Conflict(format!("step {operation_id}/{step_index} changed concurrently")))
    }

    async fn list_processing_operations(&self) -> Result<Vec<Operation>, StoreError> {
        let mut items = Vec::new();
        for entry in self.operations.iter() {
            let (_, bytes) = entry.map_err(|e| StoreError::Backend(e.to_string()))?;
            let op: Operation = serde_json::from_slice(&bytes).map_err(|e| StoreError::Backend(e.to_string()))?;
            if matches!(
                op.status,
                OperationStatus::AwaitingSignature | OperationStatus::Processing
            ) {
                items.push(op);
            }
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_operation() -> Operation {
        Operation::new(
            "user-1",
            OperationType::Bridge,
            serde_json::json!({}),
            serde_json::json!({}),
            Usdc6::from_minor(alloy_primitives::U256::from(1000u64)),
            "0.25",
        )
    }

    #[tokio::test]
    async fn in_memory_round_trips_operation() {
        let store = InMemoryRecordStore::new();
        let op = sample_operation();
        let id = op.id.clone();
        store.put_operation(op).await.unwrap();
        let fetched = store.get_operation(&id).await.unwrap();
        assert_eq!(fetched.id, id);
    }

    #[tokio::test]
    async fn cas_rejects_stale_expected_status() {
        let store = InMemoryRecordStore::new();
        let op = sample_operation();
        let id = op.id.clone();
        store.put_operation(op).await.unwrap();
        store
            .compare_and_swap_operation_status(&id, OperationStatus::AwaitingSignature, OperationStatus::Processing)
            .await
            .unwrap();
        let err = store
            .compare_and_swap_operation_status(&id, OperationStatus::AwaitingSignature, OperationStatus::Completed)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn sled_store_round_trips_operation_and_steps() {
        let dir = tempdir();
        let store = SledRecordStore::open(&dir).unwrap();
        let op = sample_operation();
        let id = op.id.clone();
        store.put_operation(op).await.unwrap();
        let fetched = store.get_operation(&id).await.unwrap();
        assert_eq!(fetched.id, id);

        let step = Step::new(
            &id,
            0,
            "base",
            StepType::BurnIntent,
            StepStatus::Pending,
            vec![],
            StepParams::Empty,
        );
        store.put_step(step).await.unwrap();
        let steps = store.list_steps(&id).await.unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].step_index, 0);

        store
            .compare_and_swap_step_status(&id, 0, StepStatus::Pending, StepStatus::Confirmed)
            .await
            .unwrap();
        let conflict = store
            .compare_and_swap_step_status(&id, 0, StepStatus::Pending, StepStatus::Confirmed)
            .await
            .unwrap_err();
        assert!(matches!(conflict, StoreError::Conflict(_)));

        std::fs::remove_dir_all(&dir).ok();
    }

    fn tempdir() -> std::path::PathBuf {
        let mut dir = std::env::temp_dir();
        dir.push(format!("xchain-store-test-{}", uuid::Uuid::new_v4()));
        dir
    }
}

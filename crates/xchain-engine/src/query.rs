//! Read-only query API: single-operation detail and a paginated,
//! type/status-filtered list, both scoped to the requesting user.

use xchain_store::{Operation, OperationStatus, OperationType, RecordStore, Step};

use crate::error::EngineError;

#[derive(Debug, serde::Serialize)]
pub struct OperationDetail {
    pub operation: Operation,
    pub steps: Vec<Step>,
}

pub async fn get_operation(
    store: &dyn RecordStore,
    user_id: &str,
    operation_id: &str,
) -> Result<OperationDetail, EngineError> {
    let operation = store.get_operation(operation_id).await?;
    if operation.user_id != user_id {
        return Err(EngineError::NotFound(format!("operation {operation_id}")));
    }
    let mut steps = store.list_steps(operation_id).await?;
    steps.sort_by_key(|s| s.step_index);
    Ok(OperationDetail { operation, steps })
}

#[derive(Debug, Default, Clone, Copy)]
pub struct OperationFilter {
    pub operation_type: Option<OperationType>,
    pub status: Option<OperationStatus>,
}

pub struct OperationListPage {
    pub items: Vec<Operation>,
    pub total: usize,
}

pub async fn get_operations(
    store: &dyn RecordStore,
    user_id: &str,
    filter: OperationFilter,
    limit: usize,
    offset: usize,
) -> Result<OperationListPage, EngineError> {
    let page = store.list_operations(user_id, None, usize::MAX).await?;
    let matching: Vec<Operation> = page
        .items
        .into_iter()
        .filter(|op| filter.operation_type.is_none_or(|t| op.operation_type == t))
        .filter(|op| filter.status.is_none_or(|s| op.status == s))
        .collect();
    let total = matching.len();
    let items = matching.into_iter().skip(offset).take(limit).collect();
    Ok(OperationListPage { items, total })
}

//! HTTP routes, mirroring `zkpf-backend::app_router`'s structure: one
//! `Router<AppState>`, one handler per path, `EngineError` mapped to a
//! response through [`crate::error::ApiError`].

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use xchain_engine::{
    get_operation, get_operations, prepare_collect, prepare_send, prepare_swap_deposit,
    submit_operation, CollectInput, ExecutorDeps, OperationDetail, OperationFilter, PlannerDeps,
    Reconciler, SendInput, SubmittedStep, SwapDepositInput,
};
use xchain_gateway::GatewayClient;
use xchain_store::{OperationStatus, OperationType, RecordStore};
use xchain_swap::SwapRouterClient;

use crate::auth::AuthenticatedUser;
use crate::error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub gateway: Arc<dyn GatewayClient>,
    pub swap: Arc<dyn SwapRouterClient>,
    pub reconciler: Arc<Reconciler>,
    pub signer: String,
    pub delegate_address: String,
    pub delegate_private_key: String,
    pub relayer_private_key: String,
}

impl AppState {
    fn planner_deps(&self) -> PlannerDeps<'_> {
        PlannerDeps {
            gateway: self.gateway.as_ref(),
            swap: self.swap.as_ref(),
            delegate_address: self.delegate_address.clone(),
        }
    }

    fn executor_deps(&self) -> ExecutorDeps<'_> {
        ExecutorDeps {
            store: self.store.as_ref(),
            gateway: self.gateway.as_ref(),
            signer: self.signer.clone(),
            delegate_priv_key: self.delegate_private_key.clone(),
            relayer_priv_key: self.relayer_private_key.clone(),
        }
    }
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/operations/collect", post(collect_handler))
        .route("/v1/operations/send", post(send_handler))
        .route("/v1/operations/swap-deposit", post(swap_deposit_handler))
        .route("/v1/operations/:id/refresh-swap", post(refresh_swap_handler))
        .route("/v1/operations/:id/submit", post(submit_handler))
        .route("/v1/operations", get(list_operations_handler))
        .route("/v1/operations/:id", get(get_operation_handler))
        .with_state(state)
}

#[derive(Serialize)]
struct PlanResponse {
    operation: xchain_store::Operation,
    steps: Vec<xchain_store::Step>,
}

async fn persist_plan(
    store: &dyn RecordStore,
    plan: xchain_engine::Plan,
) -> Result<PlanResponse, ApiError> {
    store.put_operation(plan.operation.clone()).await.map_err(xchain_engine::EngineError::from)?;
    for step in &plan.steps {
        store.put_step(step.clone()).await.map_err(xchain_engine::EngineError::from)?;
    }
    Ok(PlanResponse { operation: plan.operation, steps: plan.steps })
}

async fn collect_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(input): Json<CollectInput>,
) -> Result<Json<PlanResponse>, ApiError> {
    let deps = state.planner_deps();
    let plan = prepare_collect(input, &user.user_id, &user.wallet_address, &deps).await?;
    Ok(Json(persist_plan(state.store.as_ref(), plan).await?))
}

async fn send_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(input): Json<SendInput>,
) -> Result<Json<PlanResponse>, ApiError> {
    let deps = state.planner_deps();
    let plan = prepare_send(input, &user.user_id, &user.wallet_address, &deps).await?;
    Ok(Json(persist_plan(state.store.as_ref(), plan).await?))
}

async fn swap_deposit_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(input): Json<SwapDepositInput>,
) -> Result<Json<PlanResponse>, ApiError> {
    let deps = state.planner_deps();
    let plan = prepare_swap_deposit(input, &user.user_id, &user.wallet_address, &deps).await?;
    Ok(Json(persist_plan(state.store.as_ref(), plan).await?))
}

async fn refresh_swap_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(operation_id): Path<String>,
) -> Result<Json<OperationDetail>, ApiError> {
    let detail = get_operation(state.store.as_ref(), &user.user_id, &operation_id).await?;
    state
        .reconciler
        .reconcile_operation(&operation_id)
        .await?;
    let refreshed = get_operation(state.store.as_ref(), &user.user_id, &detail.operation.id).await?;
    Ok(Json(refreshed))
}

#[derive(Deserialize)]
struct SubmitRequest {
    submitted: Vec<SubmittedStep>,
}

async fn submit_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(operation_id): Path<String>,
    Json(body): Json<SubmitRequest>,
) -> Result<Json<OperationDetail>, ApiError> {
    // Scope check: the operation must belong to the caller before anything
    // is submitted on its behalf.
    get_operation(state.store.as_ref(), &user.user_id, &operation_id).await?;
    let deps = state.executor_deps();
    submit_operation(&operation_id, body.submitted, &deps).await?;
    let detail = get_operation(state.store.as_ref(), &user.user_id, &operation_id).await?;
    Ok(Json(detail))
}

async fn get_operation_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(operation_id): Path<String>,
) -> Result<Json<OperationDetail>, ApiError> {
    let detail = get_operation(state.store.as_ref(), &user.user_id, &operation_id).await?;
    Ok(Json(detail))
}

#[derive(Deserialize)]
struct ListOperationsQuery {
    #[serde(rename = "type")]
    operation_type: Option<OperationType>,
    status: Option<OperationStatus>,
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default)]
    offset: usize,
}

fn default_limit() -> usize {
    20
}

#[derive(Serialize)]
struct OperationListResponse {
    items: Vec<xchain_store::Operation>,
    total: usize,
}

async fn list_operations_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<ListOperationsQuery>,
) -> Result<Json<OperationListResponse>, ApiError> {
    let filter = OperationFilter { operation_type: query.operation_type, status: query.status };
    let page = get_operations(state.store.as_ref(), &user.user_id, filter, query.limit, query.offset).await?;
    Ok(Json(OperationListResponse { items: page.items, total: page.total }))
}

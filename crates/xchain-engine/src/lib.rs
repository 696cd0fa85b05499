//! The orchestration layer: planner, executor, reconciler, and query API
//! on top of [`xchain_store`]'s data model, plus the pure error classifier
//! and the `advance_*` functions shared by the executor and reconciler.

pub mod advance;
pub mod classify;
pub mod error;
pub mod executor;
pub mod planner;
pub mod query;
pub mod reconciler;

pub use classify::{BurnOutcome, MintOutcome};
pub use error::EngineError;
pub use executor::{submit_operation, ExecutorDeps, SubmittedStep};
pub use planner::{
    prepare_collect, prepare_send, prepare_swap_deposit, CollectInput, Plan, PlannerDeps,
    RecipientInput, SendInput, SwapDepositInput,
};
pub use query::{get_operation, get_operations, OperationDetail, OperationFilter, OperationListPage};
pub use reconciler::{Reconciler, ReconcilerDeps};

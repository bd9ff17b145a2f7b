//! Client-side orchestration for the invoice to purchase-order matching service.

pub mod api;
pub mod config;
pub mod dashboard;
pub mod match_workflow;
pub mod policy;
pub mod render;

pub use api::{HttpReconciliationApi, InvoiceFile, ReconciliationApi};
pub use config::{load_settings, ClientSettings};
pub use dashboard::{ApprovalOutcome, Dashboard, DashboardPhase, DashboardSnapshot, ListState};
pub use match_workflow::{MatchWorkflow, WorkflowPhase, WorkflowSnapshot, WorkflowStage};
pub use policy::{CancelToken, RequestPolicy};

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;

//! Pending-match and purchase-order lists with confirmed-then-removed approval.

use std::{collections::HashMap, sync::Arc};

use shared::{
    domain::MatchId,
    error::ApiError,
    protocol::{PendingMatch, PurchaseOrderSummary},
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    api::{HttpReconciliationApi, ReconciliationApi},
    policy::{CancelToken, RequestPolicy},
};

#[derive(Debug, Clone, PartialEq)]
pub enum ListState<T> {
    Loading,
    Loaded(Vec<T>),
    Failed(String),
}

impl<T> ListState<T> {
    pub fn items(&self) -> &[T] {
        match self {
            Self::Loaded(items) => items,
            Self::Loading | Self::Failed(_) => &[],
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardPhase {
    Loading,
    Ready,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSnapshot {
    pub phase: DashboardPhase,
    pub pending: ListState<PendingMatch>,
    pub purchase_orders: ListState<PurchaseOrderSummary>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalOutcome {
    /// The server accepted the approval and the entry left the cache.
    Approved,
    /// Nothing left to approve: not cached, or the server no longer knows it.
    AlreadyResolved,
}

struct DashboardState {
    phase: DashboardPhase,
    pending: ListState<PendingMatch>,
    purchase_orders: ListState<PurchaseOrderSummary>,
    activation: u64,
    cancel: Option<CancelToken>,
    next_approval: u64,
    approvals: HashMap<u64, CancelToken>,
}

impl DashboardState {
    fn snapshot(&self) -> DashboardSnapshot {
        DashboardSnapshot {
            phase: self.phase,
            pending: self.pending.clone(),
            purchase_orders: self.purchase_orders.clone(),
        }
    }

    fn remove_pending(&mut self, match_id: &MatchId) -> bool {
        let ListState::Loaded(items) = &mut self.pending else {
            return false;
        };
        let before = items.len();
        items.retain(|item| &item.match_id != match_id);
        items.len() != before
    }
}

/// Local cache of server lists. It is never authoritative: `activate`
/// replaces it wholesale and `approve` only removes confirmed entries.
pub struct Dashboard {
    api: Arc<dyn ReconciliationApi>,
    policy: RequestPolicy,
    inner: Mutex<DashboardState>,
}

impl Dashboard {
    pub fn new(api: Arc<dyn ReconciliationApi>, policy: RequestPolicy) -> Self {
        Self {
            api,
            policy,
            inner: Mutex::new(DashboardState {
                phase: DashboardPhase::Loading,
                pending: ListState::Loading,
                purchase_orders: ListState::Loading,
                activation: 0,
                cancel: None,
                next_approval: 0,
                approvals: HashMap::new(),
            }),
        }
    }

    pub fn connect(base_url: &str, policy: RequestPolicy) -> Result<Self, ApiError> {
        let api = HttpReconciliationApi::new(base_url)?;
        Ok(Self::new(Arc::new(api), policy))
    }

    pub async fn snapshot(&self) -> DashboardSnapshot {
        self.inner.lock().await.snapshot()
    }

    pub async fn pending_matches(&self) -> Vec<PendingMatch> {
        self.inner.lock().await.pending.items().to_vec()
    }

    /// Fetches both lists concurrently; each settles independently.
    pub async fn activate(&self) -> DashboardSnapshot {
        let token = CancelToken::new();
        let activation = {
            let mut guard = self.inner.lock().await;
            guard.activation += 1;
            guard.phase = DashboardPhase::Loading;
            guard.pending = ListState::Loading;
            guard.purchase_orders = ListState::Loading;
            guard.cancel = Some(token.clone());
            guard.activation
        };

        let (pending, purchase_orders) = futures::join!(
            self.policy.run(&token, self.api.list_pending_matches()),
            self.policy.run(&token, self.api.list_purchase_orders()),
        );

        let mut guard = self.inner.lock().await;
        if guard.activation != activation {
            debug!(activation, "discarding superseded dashboard load");
            return guard.snapshot();
        }
        guard.pending = settle("pending matches", pending);
        guard.purchase_orders = settle("purchase orders", purchase_orders);
        guard.phase = DashboardPhase::Ready;
        guard.cancel = None;
        info!(
            pending = guard.pending.items().len(),
            purchase_orders = guard.purchase_orders.items().len(),
            "dashboard ready"
        );
        guard.snapshot()
    }

    /// Cancels the fetches of the current activation and any approvals in
    /// flight. Unfinished lists fail; cancelled approvals leave the cache as
    /// it was. Returns whether anything was running.
    pub async fn cancel(&self) -> bool {
        let guard = self.inner.lock().await;
        let mut cancelled = false;
        if let Some(token) = guard.cancel.as_ref() {
            token.cancel();
            cancelled = true;
        }
        for token in guard.approvals.values() {
            token.cancel();
            cancelled = true;
        }
        cancelled
    }

    /// Approves a pending match and drops it from the cache once the server
    /// has confirmed. A failed approval leaves the cache untouched.
    pub async fn approve(&self, match_id: &MatchId) -> Result<ApprovalOutcome, ApiError> {
        let (approval, token) = {
            let mut guard = self.inner.lock().await;
            let cached = guard
                .pending
                .items()
                .iter()
                .any(|item| &item.match_id == match_id);
            if !cached {
                debug!(%match_id, "approve skipped: match not in pending cache");
                return Ok(ApprovalOutcome::AlreadyResolved);
            }
            let token = CancelToken::new();
            guard.next_approval += 1;
            let approval = guard.next_approval;
            guard.approvals.insert(approval, token.clone());
            (approval, token)
        };

        let result = self
            .policy
            .run(&token, self.api.approve_match(match_id))
            .await;
        self.inner.lock().await.approvals.remove(&approval);

        match result {
            Ok(()) => {
                let removed = self.inner.lock().await.remove_pending(match_id);
                if removed {
                    info!(%match_id, "match approved");
                    Ok(ApprovalOutcome::Approved)
                } else {
                    debug!(%match_id, "match approved by an earlier request");
                    Ok(ApprovalOutcome::AlreadyResolved)
                }
            }
            Err(err) if err.is_not_found() => {
                self.inner.lock().await.remove_pending(match_id);
                debug!(%match_id, "approve target already gone on server");
                Ok(ApprovalOutcome::AlreadyResolved)
            }
            Err(err) => {
                warn!(%match_id, error = %err, "match approval failed");
                Err(err)
            }
        }
    }
}

fn settle<T>(list: &str, result: Result<Vec<T>, ApiError>) -> ListState<T> {
    match result {
        Ok(items) => ListState::Loaded(items),
        Err(err) => {
            warn!(list, error = %err, "dashboard list fetch failed");
            ListState::Failed(err.user_message())
        }
    }
}

#[cfg(test)]
#[path = "tests/dashboard_tests.rs"]
mod tests;

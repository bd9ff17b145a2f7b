//! Upload-then-match sequencing for a single invoice document.

use std::{fmt, sync::Arc};

use shared::{
    error::ApiError,
    protocol::{MatchOutcome, UploadResult},
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::{
    api::{HttpReconciliationApi, InvoiceFile, ReconciliationApi},
    policy::{CancelToken, RequestPolicy},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowStage {
    Upload,
    Match,
}

impl fmt::Display for WorkflowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Upload => f.write_str("upload"),
            Self::Match => f.write_str("match"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowPhase {
    Idle,
    FileSelected,
    Uploading,
    Uploaded,
    Matching,
    Completed(MatchOutcome),
    Errored {
        stage: WorkflowStage,
        message: String,
    },
}

impl WorkflowPhase {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Uploading | Self::Uploaded | Self::Matching)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed(_) | Self::Errored { .. })
    }
}

/// Point-in-time view for rendering. `upload` survives a failed match.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowSnapshot {
    pub phase: WorkflowPhase,
    pub file_name: Option<String>,
    pub upload: Option<UploadResult>,
}

struct WorkflowState {
    phase: WorkflowPhase,
    file: Option<InvoiceFile>,
    upload: Option<UploadResult>,
    generation: u64,
    cancel: Option<CancelToken>,
}

pub struct MatchWorkflow {
    api: Arc<dyn ReconciliationApi>,
    policy: RequestPolicy,
    inner: Mutex<WorkflowState>,
    events: broadcast::Sender<WorkflowPhase>,
}

impl MatchWorkflow {
    pub fn new(api: Arc<dyn ReconciliationApi>, policy: RequestPolicy) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            api,
            policy,
            inner: Mutex::new(WorkflowState {
                phase: WorkflowPhase::Idle,
                file: None,
                upload: None,
                generation: 0,
                cancel: None,
            }),
            events,
        }
    }

    pub fn connect(base_url: &str, policy: RequestPolicy) -> Result<Self, ApiError> {
        let api = HttpReconciliationApi::new(base_url)?;
        Ok(Self::new(Arc::new(api), policy))
    }

    /// Every phase transition, in order, starting from the next one.
    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowPhase> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> WorkflowSnapshot {
        let guard = self.inner.lock().await;
        WorkflowSnapshot {
            phase: guard.phase.clone(),
            file_name: guard.file.as_ref().map(|file| file.file_name.clone()),
            upload: guard.upload.clone(),
        }
    }

    /// Replaces the selection and clears any previous result or error.
    /// A submission still in flight is superseded and its results dropped.
    pub async fn select_file(&self, file: InvoiceFile) {
        let mut guard = self.inner.lock().await;
        if guard.phase.is_in_flight() {
            debug!(file_name = %file.file_name, "file selected during in-flight submission");
        }
        guard.generation += 1;
        if let Some(token) = guard.cancel.take() {
            token.cancel();
        }
        guard.file = Some(file);
        guard.upload = None;
        self.transition(&mut guard, WorkflowPhase::FileSelected);
    }

    pub async fn reset(&self) {
        let mut guard = self.inner.lock().await;
        guard.generation += 1;
        if let Some(token) = guard.cancel.take() {
            token.cancel();
        }
        guard.file = None;
        guard.upload = None;
        self.transition(&mut guard, WorkflowPhase::Idle);
    }

    /// Cancels the in-flight request, if any. Returns whether one was running.
    pub async fn cancel(&self) -> bool {
        let guard = self.inner.lock().await;
        match guard.cancel.as_ref() {
            Some(token) if guard.phase.is_in_flight() => {
                token.cancel();
                true
            }
            _ => false,
        }
    }

    /// Runs upload followed by match.
    ///
    /// Returns the terminal phase, or `None` when nothing ran (no file
    /// selected, another submission in flight) or when a newer file
    /// selection superseded this submission.
    pub async fn submit(&self) -> Option<WorkflowPhase> {
        let (file, generation, token) = {
            let mut guard = self.inner.lock().await;
            if guard.phase.is_in_flight() {
                debug!("submit ignored: submission already in flight");
                return None;
            }
            let Some(file) = guard.file.clone() else {
                debug!("submit ignored: no file selected");
                return None;
            };
            let token = CancelToken::new();
            guard.cancel = Some(token.clone());
            guard.upload = None;
            self.transition(&mut guard, WorkflowPhase::Uploading);
            (file, guard.generation, token)
        };

        let upload = match self.policy.run(&token, self.api.upload_invoice(file)).await {
            Ok(upload) => upload,
            Err(err) => return self.fail(generation, WorkflowStage::Upload, err).await,
        };

        let invoice_id = upload.invoice_id.clone();
        {
            let mut guard = self.inner.lock().await;
            if guard.generation != generation {
                debug!(%invoice_id, "discarding upload of superseded submission");
                return None;
            }
            guard.upload = Some(upload);
            self.transition(&mut guard, WorkflowPhase::Uploaded);
            self.transition(&mut guard, WorkflowPhase::Matching);
        }

        match self.policy.run(&token, self.api.match_invoice(&invoice_id)).await {
            Ok(outcome) => {
                self.finish(generation, WorkflowPhase::Completed(outcome))
                    .await
            }
            Err(err) => self.fail(generation, WorkflowStage::Match, err).await,
        }
    }

    async fn fail(
        &self,
        generation: u64,
        stage: WorkflowStage,
        err: ApiError,
    ) -> Option<WorkflowPhase> {
        let message = err.user_message();
        warn!(%stage, error = %message, "match workflow step failed");
        self.finish(generation, WorkflowPhase::Errored { stage, message })
            .await
    }

    async fn finish(&self, generation: u64, phase: WorkflowPhase) -> Option<WorkflowPhase> {
        let mut guard = self.inner.lock().await;
        if guard.generation != generation {
            debug!("discarding result of superseded submission");
            return None;
        }
        guard.cancel = None;
        if matches!(phase, WorkflowPhase::Completed(_)) {
            guard.file = None;
        }
        self.transition(&mut guard, phase.clone());
        Some(phase)
    }

    fn transition(&self, state: &mut WorkflowState, phase: WorkflowPhase) {
        info!(from = ?state.phase, to = ?phase, "match workflow transition");
        state.phase = phase.clone();
        let _ = self.events.send(phase);
    }
}

#[cfg(test)]
#[path = "tests/match_workflow_tests.rs"]
mod tests;

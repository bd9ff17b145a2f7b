//! Timeout and cancellation applied to every backend request.

use std::{future::Future, sync::Arc, time::Duration};

use shared::error::ApiError;
use tokio::sync::watch;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Cloneable cancellation flag; once cancelled it stays cancelled.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
        }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so `changed` cannot fail here.
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestPolicy {
    pub timeout: Duration,
}

impl RequestPolicy {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub async fn run<T, F>(&self, token: &CancelToken, request: F) -> Result<T, ApiError>
    where
        F: Future<Output = Result<T, ApiError>>,
    {
        if token.is_cancelled() {
            return Err(ApiError::Cancelled);
        }

        tokio::select! {
            _ = token.cancelled() => Err(ApiError::Cancelled),
            outcome = tokio::time::timeout(self.timeout, request) => {
                outcome.unwrap_or_else(|_| Err(ApiError::TimedOut(self.timeout)))
            }
        }
    }
}

impl Default for RequestPolicy {
    fn default() -> Self {
        Self::with_timeout(DEFAULT_REQUEST_TIMEOUT)
    }
}

//! Cancellation controller for workflow runs
//!
//! Every run owns exactly one [`CancelHandle`], created fresh when the run starts and
//! installed into the workflow before the first network call. The handle wraps a
//! [`CancellationToken`] and records *why* the run was cancelled, so the workflow
//! can tell a user pressing "cancel" apart from a cancellation it triggered itself
//! after an upstream failure.
//!
//! Cancellation is cooperative: suspending calls go through [`CancelHandle::run`] or
//! [`CancelHandle::sleep`], which refuse to start once the token is cancelled and
//! abort (drop) the in-flight future when cancellation arrives while awaiting.

use crate::error::{Error, Result};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Why a run was cancelled
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CancelReason {
    /// The user pressed cancel (or logged out) while the run was active
    User,
    /// The run cancelled itself because a step failed; carries the original error message
    Failure(String),
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CancelReason::User => write!(f, "cancelled by user"),
            CancelReason::Failure(message) => write!(f, "aborted after failure: {}", message),
        }
    }
}

/// Cancel handle for a single run (cloneable - all clones share state)
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    token: CancellationToken,
    reason: Arc<Mutex<Option<CancelReason>>>,
}

impl CancelHandle {
    /// Create a fresh, un-cancelled handle
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel on behalf of the user
    ///
    /// Returns true if this call performed the cancellation, false if the handle
    /// was already cancelled (the first reason wins).
    pub fn cancel(&self) -> bool {
        self.cancel_with(CancelReason::User)
    }

    /// Cancel with an explicit reason
    pub fn cancel_with(&self, reason: CancelReason) -> bool {
        {
            let mut slot = self.reason.lock().unwrap_or_else(|e| e.into_inner());
            if slot.is_some() {
                return false;
            }
            *slot = Some(reason);
        }
        self.token.cancel();
        true
    }

    /// Whether the run has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The recorded cancellation reason, if cancelled
    pub fn reason(&self) -> Option<CancelReason> {
        self.reason.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// The underlying token, for integration with other tokio-util consumers
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Fail with [`Error::Cancelled`] if the handle is already cancelled
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(self.cancelled_error())
        } else {
            Ok(())
        }
    }

    /// Await `operation` unless the run is cancelled first
    ///
    /// The operation is never polled if the handle is already cancelled. If
    /// cancellation arrives while it is pending, the future is dropped (aborting
    /// any in-flight request) and [`Error::Cancelled`] is returned.
    pub async fn run<F, T>(&self, operation: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.check()?;
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(self.cancelled_error()),
            result = operation => result,
        }
    }

    /// Sleep for `duration`, waking early with [`Error::Cancelled`] on cancellation
    pub async fn sleep(&self, duration: Duration) -> Result<()> {
        self.run(async {
            tokio::time::sleep(duration).await;
            Ok(())
        })
        .await
    }

    fn cancelled_error(&self) -> Error {
        Error::Cancelled(self.reason().unwrap_or(CancelReason::User))
    }
}

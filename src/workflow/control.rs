//! Workflow control - start, cancel, confirm, choose another account, logout.

use super::run::{self, Run};
use super::{ActiveRun, Emitter, Workflow};
use crate::cancel::CancelHandle;
use crate::config::UploadPolicy;
use crate::error::{AuthError, Error, Result};
use crate::providers::{EventSink, RunContext};
use crate::types::{Credential, Event, Stage};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

impl Workflow {
    /// Start a run, authorizing through the session's authorizer
    ///
    /// The run executes on a spawned task; the returned handle resolves once
    /// it has reached a terminal stage or was cancelled. Refused with
    /// [`Error::InvalidStage`] while another run is active.
    pub fn start(&self) -> Result<JoinHandle<()>> {
        self.launch(None)
    }

    /// Start a run with a credential obtained elsewhere
    ///
    /// An expired credential is rejected with [`AuthError::Expired`] before
    /// any network call is made.
    pub fn start_with_credential(&self, credential: Credential) -> Result<JoinHandle<()>> {
        if credential.is_expired() {
            tracing::warn!(
                provider = %self.provider,
                email = %credential.account_email,
                "Refusing to start with an expired credential"
            );
            return Err(AuthError::Expired {
                email: credential.account_email,
            }
            .into());
        }
        self.launch(Some(credential))
    }

    fn launch(&self, credential: Option<Credential>) -> Result<JoinHandle<()>> {
        let mut runs = self.lock_runs();
        let stage = self.state_tx.borrow().stage;
        if stage.is_active() {
            return Err(Error::InvalidStage {
                operation: "start".to_string(),
                stage: stage.to_string(),
            });
        }

        runs.next_id += 1;
        let id = runs.next_id;
        let cancel = CancelHandle::new();
        let (confirm_tx, confirm_rx) = oneshot::channel();
        runs.current = Some(ActiveRun {
            id,
            cancel: cancel.clone(),
            confirm: Some(confirm_tx),
            credential: None,
        });

        // Published under the lock so the run is active before start returns
        self.publish(Event::RunStarted {
            provider: self.provider,
        });
        drop(runs);

        tracing::info!(provider = %self.provider, run = id, "Starting acquisition run");

        let run = Run {
            cancel,
            confirm: confirm_rx,
            emitter: Emitter::new(id, self.clone()),
            credential,
        };
        Ok(tokio::spawn(run::drive(self.clone(), run)))
    }

    /// Cancel the active run on behalf of the user
    ///
    /// Only effective while fetching lists or records; returns false (and
    /// changes nothing) in any other stage. Once this returns true no further
    /// list page or chunk request is started; the run then returns to
    /// not-started.
    pub fn cancel(&self) -> bool {
        let runs = self.lock_runs();
        let stage = self.state_tx.borrow().stage;
        if !stage.is_cancellable() {
            tracing::debug!(stage = %stage, "Cancel ignored outside fetching stages");
            return false;
        }

        match runs.current.as_ref() {
            Some(run) if run.cancel.cancel() => {
                tracing::info!(provider = %self.provider, run = run.id, stage = %stage, "Run cancelled by user");
                true
            }
            _ => false,
        }
    }

    /// Continue to signing and upload after records were fetched
    ///
    /// Only valid under [`UploadPolicy::ConfirmBeforeUpload`] while the run
    /// waits in the records-fetched stage.
    pub fn confirm_upload(&self) -> Result<()> {
        let mut runs = self.lock_runs();
        let stage = self.state_tx.borrow().stage;
        let invalid = || Error::InvalidStage {
            operation: "confirm upload".to_string(),
            stage: stage.to_string(),
        };

        if self.config.upload_policy != UploadPolicy::ConfirmBeforeUpload
            || stage != Stage::RecordsFetched
        {
            return Err(invalid());
        }

        let confirm = runs
            .current
            .as_mut()
            .and_then(|run| run.confirm.take())
            .ok_or_else(invalid)?;
        confirm
            .send(())
            .map_err(|_| Error::Other("run is no longer waiting for confirmation".to_string()))?;
        tracing::info!(provider = %self.provider, "Upload confirmed");
        Ok(())
    }

    /// Sign out of the rejected account and start over
    ///
    /// Only valid in the wrong-account stage. The provider session is revoked
    /// where the provider supports it and the authorizer is torn down, both
    /// best-effort, then a new run starts through a fresh authorizer.
    pub async fn choose_another_account(&self) -> Result<JoinHandle<()>> {
        let stage = self.state().stage;
        if stage != Stage::WrongAccount {
            return Err(Error::InvalidStage {
                operation: "choose another account".to_string(),
                stage: stage.to_string(),
            });
        }

        let credential = self
            .lock_runs()
            .current
            .as_ref()
            .and_then(|run| run.credential.clone());
        if let Some(credential) = credential {
            let ctx = RunContext::new(
                self.api.clone(),
                Arc::clone(&self.config),
                credential,
                CancelHandle::new(),
                EventSink::discard(),
            );
            if let Err(e) = self.source.revoke(&ctx).await {
                tracing::warn!(provider = %self.provider, error = %e, "Failed to revoke provider session");
            }
        }

        self.collaborators.auth.teardown(self.provider).await;
        self.start()
    }

    /// Cancel any active run, sign out of the provider and reset
    pub async fn logout(&self) {
        {
            let mut runs = self.lock_runs();
            if let Some(run) = runs.current.take()
                && run.cancel.cancel()
            {
                tracing::info!(provider = %self.provider, run = run.id, "Active run cancelled by logout");
            }
            self.publish(Event::LoggedOut);
        }

        self.collaborators.auth.teardown(self.provider).await;
        tracing::info!(provider = %self.provider, "Session logged out");
    }
}

//! Execution of a single run.

use super::{Emitter, Workflow};
use crate::auth::{AuthRequest, authorize};
use crate::cancel::{CancelHandle, CancelReason};
use crate::config::UploadPolicy;
use crate::error::{AuthError, Error, Result};
use crate::package::Package;
use crate::providers::RunContext;
use crate::types::{Credential, Event};
use crate::validator::{AccountValidator, Verdict};
use std::sync::Arc;
use tokio::sync::oneshot;

/// Per-run inputs handed to the spawned task
pub(super) struct Run {
    pub(super) cancel: CancelHandle,
    pub(super) confirm: oneshot::Receiver<()>,
    pub(super) emitter: Emitter,
    /// Credential supplied by the caller; authorized through the registry otherwise
    pub(super) credential: Option<Credential>,
}

/// Execute a run and turn its outcome into a final event
///
/// A user cancellation returns the workflow to not-started and a rejected
/// account ends in the wrong-account stage. Any other error
/// cancels the run's token with the error as reason and ends in the error
/// stage; a cancellation caused by such a failure reports the original error.
pub(super) async fn drive(workflow: Workflow, run: Run) {
    let emitter = run.emitter.clone();
    let cancel = run.cancel.clone();

    let error = match execute(&workflow, run).await {
        Ok(()) => return,
        Err(e) => e,
    };

    let message = match error {
        Error::Cancelled(CancelReason::User) => {
            tracing::info!(provider = %workflow.provider, "Run stopped after user cancellation");
            emitter.emit(Event::Cancelled);
            return;
        }
        Error::WrongAccount { email, allowed } => {
            tracing::warn!(provider = %workflow.provider, email = %email, "Authenticated account is not allowed");
            emitter.emit(Event::WrongAccount { email, allowed });
            return;
        }
        Error::Cancelled(CancelReason::Failure(message)) => message,
        other => other.to_string(),
    };
    if cancel.cancel_with(CancelReason::Failure(message.clone())) {
        tracing::warn!(provider = %workflow.provider, "Run cancelled after upstream failure");
    }
    tracing::error!(provider = %workflow.provider, error = %message, "Acquisition run failed");
    emitter.emit(Event::Failed { error: message });
}

async fn execute(workflow: &Workflow, run: Run) -> Result<()> {
    let Run {
        cancel,
        confirm,
        emitter,
        credential,
    } = run;
    let provider = workflow.provider;

    emitter.emit(Event::Authorizing { interactive: false });
    let allowed = cancel
        .run(workflow.collaborators.allow_list.allowed_emails())
        .await?;
    let validator = AccountValidator::new(&allowed);

    let credential = match credential {
        Some(credential) => credential,
        None => {
            let authorizer = workflow.collaborators.auth.get(provider)?;
            let request =
                AuthRequest::for_application(provider, validator.login_hint().map(str::to_string));
            let interactive = emitter.clone();
            authorize(authorizer.as_ref(), &request, &cancel, move || {
                interactive.emit(Event::Authorizing { interactive: true })
            })
            .await?
        }
    };
    if credential.is_expired() {
        return Err(AuthError::Expired {
            email: credential.account_email,
        }
        .into());
    }
    emitter.remember_credential(&credential);

    let ctx = RunContext::new(
        workflow.api.clone(),
        Arc::clone(&workflow.config),
        credential,
        cancel.clone(),
        emitter.sink(),
    );

    let identity = workflow.source.whoami(&ctx).await?;
    let email = match validator.validate(&identity) {
        Verdict::Allowed { email } => email,
        Verdict::Rejected { email, allowed } => {
            return Err(Error::WrongAccount { email, allowed });
        }
    };
    tracing::info!(provider = %provider, email = %email, "Account authorized");
    emitter.emit(Event::Authorized {
        email: email.clone(),
    });

    emitter.emit(Event::ListingStarted);
    let records = workflow.source.collect(&ctx).await?;
    let total = records.len() as u64;
    tracing::info!(provider = %provider, records = total, "Records fetched");
    emitter.emit(Event::RecordsFetched { total });

    if workflow.config.upload_policy == UploadPolicy::ConfirmBeforeUpload {
        tracing::info!(provider = %provider, "Waiting for upload confirmation");
        cancel
            .run(async {
                confirm
                    .await
                    .map_err(|_| Error::Other("upload confirmation abandoned".to_string()))
            })
            .await?;
    }

    let package = Package::from_records(workflow.config.package.file_name.clone(), &records)?;
    drop(records);
    let upload_events = emitter.clone();
    let package_id = workflow
        .uploader
        .upload(package, &email, &cancel, move |event| upload_events.emit(event))
        .await?;

    emitter.emit(Event::Done {
        package_id,
        records: total,
    });
    Ok(())
}

//! Workflow state machine
//!
//! A [`Workflow`] sequences one provider's run: authorize, validate the
//! account, enumerate, fetch, package, upload and notify. It is split into:
//! - [`state`] - the published snapshot and the reducer that advances it
//! - `control` - start, cancel, confirm, choose another account, logout
//! - `run` - the spawned task that executes a single run
//!
//! Runs emit [`Event`]s; the reducer applies them to the shared
//! [`WorkflowState`] and they are broadcast to subscribers. Events from a run
//! that is no longer current (after logout or a restart) are dropped, so a
//! stale task can never overwrite a newer run's state.

mod control;
mod run;
pub mod state;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use state::{WorkflowState, WrongAccount};

use crate::auth::AuthRegistry;
use crate::backend::BackendClient;
use crate::cancel::CancelHandle;
use crate::config::Config;
use crate::error::Result;
use crate::http::ApiClient;
use crate::package::{HttpObjectStorage, NotifyService, ObjectStorage, SigningService, Uploader};
use crate::providers::{self, EventSink, ProviderSource};
use crate::types::{Credential, Event, Provider};
use crate::validator::AllowListSource;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{broadcast, oneshot, watch};
use tokio_stream::Stream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::{BroadcastStream, WatchStream};

/// External services a workflow relies on
#[derive(Clone)]
pub struct Collaborators {
    /// Provider authorizers for this session
    pub auth: Arc<AuthRegistry>,
    /// Where the allow-list comes from
    pub allow_list: Arc<dyn AllowListSource>,
    /// Issues upload targets
    pub signing: Arc<dyn SigningService>,
    /// Receives the package bytes
    pub storage: Arc<dyn ObjectStorage>,
    /// Acknowledges uploaded packages
    pub notify: Arc<dyn NotifyService>,
}

impl Collaborators {
    /// Use the backend service for the allow-list, signing and notify, and a
    /// plain HTTP PUT for the upload
    ///
    /// The upload client honors `config.request_timeout` like the provider calls.
    pub fn from_backend(
        auth: Arc<AuthRegistry>,
        backend: Arc<BackendClient>,
        config: &Config,
    ) -> Result<Self> {
        let storage = HttpObjectStorage::new(ApiClient::from_config(config)?.inner().clone());
        Ok(Self {
            auth,
            allow_list: Arc::clone(&backend) as Arc<dyn AllowListSource>,
            signing: Arc::clone(&backend) as Arc<dyn SigningService>,
            storage: Arc::new(storage),
            notify: backend,
        })
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("auth", &self.auth)
            .finish_non_exhaustive()
    }
}

/// The run that currently owns the workflow state
pub(crate) struct ActiveRun {
    pub(crate) id: u64,
    pub(crate) cancel: CancelHandle,
    /// Taken by `confirm_upload`
    pub(crate) confirm: Option<oneshot::Sender<()>>,
    /// Set once the provider credential is known
    pub(crate) credential: Option<Credential>,
}

#[derive(Default)]
pub(crate) struct RunSlot {
    pub(crate) next_id: u64,
    /// Last started run; kept after it ends until logout or the next start
    pub(crate) current: Option<ActiveRun>,
}

/// Acquisition workflow for one provider (cloneable - all clones share state)
#[derive(Clone)]
pub struct Workflow {
    pub(crate) provider: Provider,
    pub(crate) config: Arc<Config>,
    pub(crate) api: ApiClient,
    pub(crate) source: Arc<dyn ProviderSource>,
    pub(crate) collaborators: Collaborators,
    pub(crate) uploader: Uploader,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    pub(crate) state_tx: Arc<watch::Sender<WorkflowState>>,
    pub(crate) runs: Arc<Mutex<RunSlot>>,
}

impl std::fmt::Debug for Workflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workflow")
            .field("provider", &self.provider)
            .field("stage", &self.state_tx.borrow().stage)
            .finish_non_exhaustive()
    }
}

impl Workflow {
    /// Create a workflow for `provider` using its default source
    ///
    /// Fails if the configuration is invalid or the HTTP client cannot be built.
    pub fn new(provider: Provider, config: Config, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;
        let api = ApiClient::from_config(&config)?;
        let uploader = Uploader::new(
            Arc::clone(&collaborators.signing),
            Arc::clone(&collaborators.storage),
            Arc::clone(&collaborators.notify),
        );

        let (event_tx, _rx) = broadcast::channel(1000);
        let (state_tx, _rx) = watch::channel(WorkflowState::default());

        Ok(Self {
            provider,
            config: Arc::new(config),
            api,
            source: providers::source_for(provider),
            collaborators,
            uploader,
            event_tx,
            state_tx: Arc::new(state_tx),
            runs: Arc::new(Mutex::new(RunSlot::default())),
        })
    }

    /// Replace the provider source (custom endpoints, fakes)
    pub fn with_source(mut self, source: Arc<dyn ProviderSource>) -> Self {
        self.source = source;
        self
    }

    /// Provider this workflow acquires from
    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// The configuration in use
    pub fn config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Current state snapshot
    pub fn state(&self) -> WorkflowState {
        self.state_tx.borrow().clone()
    }

    /// Watch state snapshots; the receiver always sees the latest one
    pub fn watch(&self) -> watch::Receiver<WorkflowState> {
        self.state_tx.subscribe()
    }

    /// State snapshots as a stream, starting with the current one
    pub fn states(&self) -> WatchStream<WorkflowState> {
        WatchStream::new(self.state_tx.subscribe())
    }

    /// Subscribe to every event from now on
    ///
    /// Slow subscribers that fall more than 1000 events behind miss the
    /// oldest ones (`RecvError::Lagged`).
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Events as a stream; lagged gaps are logged and skipped
    pub fn events(&self) -> impl Stream<Item = Event> + Send + 'static {
        use tokio_stream::StreamExt;

        BroadcastStream::new(self.event_tx.subscribe()).filter_map(|item| match item {
            Ok(event) => Some(event),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Event subscriber lagged, events dropped");
                None
            }
        })
    }

    /// Apply an event to the shared state and broadcast it
    pub(crate) fn publish(&self, event: Event) {
        self.state_tx.send_modify(|state| state.apply(&event));
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }

    pub(crate) fn lock_runs(&self) -> MutexGuard<'_, RunSlot> {
        self.runs.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Publishes a single run's events while that run is current
#[derive(Clone)]
pub(crate) struct Emitter {
    run_id: u64,
    workflow: Workflow,
}

impl Emitter {
    pub(crate) fn new(run_id: u64, workflow: Workflow) -> Self {
        Self { run_id, workflow }
    }

    pub(crate) fn emit(&self, event: Event) {
        let runs = self.workflow.lock_runs();
        if runs.current.as_ref().map(|run| run.id) != Some(self.run_id) {
            tracing::trace!(run = self.run_id, ?event, "Dropping event from stale run");
            return;
        }
        self.workflow.publish(event);
    }

    /// Remember the run's credential for a later `choose_another_account`
    pub(crate) fn remember_credential(&self, credential: &Credential) {
        let mut runs = self.workflow.lock_runs();
        if let Some(run) = runs.current.as_mut().filter(|run| run.id == self.run_id) {
            run.credential = Some(credential.clone());
        }
    }

    pub(crate) fn sink(&self) -> EventSink {
        let emitter = self.clone();
        EventSink::new(move |event| emitter.emit(event))
    }
}

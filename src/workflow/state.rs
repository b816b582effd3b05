//! Workflow state snapshot and the reducer that advances it

use crate::types::{Event, Progress, Provider, Stage};
use serde::{Deserialize, Serialize};

/// Rejected identity exposed for remediation UI
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrongAccount {
    /// The rejected address
    pub email: String,
    /// The allow-list it was checked against
    pub allowed: Vec<String>,
}

/// Snapshot of the workflow published to watchers
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowState {
    /// Provider of the current (or last) run
    pub provider: Option<Provider>,
    /// Current stage
    pub stage: Stage,
    /// Progress counters for the current run
    pub progress: Progress,
    /// Whether the interactive consent flow was needed
    pub interactive: bool,
    /// Authenticated and accepted account
    pub account: Option<String>,
    /// Set in the wrong-account stage
    pub wrong_account: Option<WrongAccount>,
    /// Package ID once the package has been signed
    pub package_id: Option<String>,
    /// Error message in the error stage
    pub error: Option<String>,
}

impl WorkflowState {
    /// Apply one event
    ///
    /// This is the only place workflow state changes. A new run resets every
    /// field; cancellation and logout return to the not-started default.
    pub fn apply(&mut self, event: &Event) {
        match event {
            Event::RunStarted { provider } => {
                *self = Self {
                    provider: Some(*provider),
                    stage: Stage::Authorizing,
                    ..Self::default()
                };
            }
            Event::Authorizing { interactive } => {
                self.stage = Stage::Authorizing;
                self.interactive = *interactive;
            }
            Event::Authorized { email } => {
                self.account = Some(email.clone());
            }
            Event::WrongAccount { email, allowed } => {
                self.stage = Stage::WrongAccount;
                self.wrong_account = Some(WrongAccount {
                    email: email.clone(),
                    allowed: allowed.clone(),
                });
            }
            Event::ListingStarted => self.stage = Stage::FetchingLists,
            Event::PageLoaded {
                pages,
                estimated_total,
                ..
            } => {
                // Pages only ever go up, even if sources number them per phase
                self.progress.pages = self.progress.pages.max(*pages);
                if estimated_total.is_some() {
                    self.progress.estimated_total = *estimated_total;
                }
            }
            Event::GroupsLoaded { count } => self.progress.groups = *count,
            Event::ChannelsLoaded { count } => {
                self.progress.channels = self.progress.channels.saturating_add(*count);
            }
            Event::TotalRecords { kind, total } => {
                self.progress.total = Some(*total);
                self.progress.total_kind = Some(*kind);
                // A total can arrive after its records were counted
                let counter = self.progress.count_mut(*kind);
                *counter = (*counter).min(*total);
            }
            Event::FetchingStarted => self.stage = Stage::FetchingRecords,
            Event::RecordsLoaded { kind, count } => {
                let cap = match (self.progress.total_kind, self.progress.total) {
                    (Some(total_kind), Some(total)) if total_kind == *kind => Some(total),
                    _ => None,
                };
                let counter = self.progress.count_mut(*kind);
                *counter = counter.saturating_add(*count);
                if let Some(cap) = cap {
                    *counter = (*counter).min(cap);
                }
            }
            Event::RecordsFetched { .. } => self.stage = Stage::RecordsFetched,
            Event::Signing { .. } => self.stage = Stage::SigningFile,
            Event::Uploading { package_id } => {
                self.stage = Stage::UploadingFile;
                self.package_id = Some(package_id.clone());
            }
            Event::Notifying { .. } => self.stage = Stage::Notifying,
            Event::Done { package_id, .. } => {
                self.stage = Stage::Done;
                self.package_id = Some(package_id.clone());
            }
            Event::Failed { error } => {
                self.stage = Stage::Error;
                self.error = Some(error.clone());
            }
            Event::Cancelled | Event::LoggedOut => *self = Self::default(),
        }
    }

    /// Whether a run is in progress
    pub fn is_active(&self) -> bool {
        self.stage.is_active()
    }
}

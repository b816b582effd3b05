//! Core types and events for acquisition

use crate::records::RecordKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Provider application a run acquires data from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    /// Google Gmail (message headers)
    Gmail,
    /// Microsoft Outlook (message recipients)
    Outlook,
    /// Microsoft Teams (channel messages)
    Teams,
    /// Zoom (meetings and participants)
    Zoom,
}

impl Provider {
    /// Stable lowercase name, used in logs and package metadata
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Gmail => "gmail",
            Provider::Outlook => "outlook",
            Provider::Teams => "teams",
            Provider::Zoom => "zoom",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider access credential
///
/// Created on a successful provider login and replaced wholesale by the next
/// one; never mutated.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Bearer token for provider API calls
    pub access_token: String,
    /// Account the token was issued for
    pub account_email: String,
    /// When the token stops being valid
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    /// Create a credential
    pub fn new(
        access_token: impl Into<String>,
        account_email: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            account_email: account_email.into(),
            expires_at,
        }
    }

    /// Whether the credential is expired at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Whether the credential is expired right now
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

// Tokens never end up in logs
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("account_email", &self.account_email)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Workflow stage
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Idle, waiting for `start`
    #[default]
    NotStarted,
    /// Provider login/consent in progress
    Authorizing,
    /// Enumerating lists (message ids, groups, channels, meetings)
    FetchingLists,
    /// Fetching full records
    FetchingRecords,
    /// All records fetched, waiting for upload confirmation
    RecordsFetched,
    /// Requesting a signed upload target
    SigningFile,
    /// Uploading the package
    UploadingFile,
    /// Notifying the backend
    Notifying,
    /// Run completed
    Done,
    /// Run failed
    Error,
    /// Authenticated account is not in the allow-list
    WrongAccount,
}

impl Stage {
    /// Stable snake_case name
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::NotStarted => "not_started",
            Stage::Authorizing => "authorizing",
            Stage::FetchingLists => "fetching_lists",
            Stage::FetchingRecords => "fetching_records",
            Stage::RecordsFetched => "records_fetched",
            Stage::SigningFile => "signing_file",
            Stage::UploadingFile => "uploading_file",
            Stage::Notifying => "notifying",
            Stage::Done => "done",
            Stage::Error => "error",
            Stage::WrongAccount => "wrong_account",
        }
    }

    /// Whether `cancel()` has an effect in this stage
    pub fn is_cancellable(&self) -> bool {
        matches!(self, Stage::FetchingLists | Stage::FetchingRecords)
    }

    /// Whether a run is in progress (a new `start` is refused)
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Stage::Authorizing
                | Stage::FetchingLists
                | Stage::FetchingRecords
                | Stage::RecordsFetched
                | Stage::SigningFile
                | Stage::UploadingFile
                | Stage::Notifying
        )
    }

    /// Whether the run has ended (successfully or not)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Done | Stage::Error | Stage::WrongAccount)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-run progress counters, reset at the start of every run
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// List pages loaded so far
    pub pages: u64,
    /// Provider's running estimate of the list size, if it reports one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_total: Option<u64>,
    /// Identifiers collected while listing, reported before record fetching starts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    /// Record kind `total` refers to; that counter never exceeds it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_kind: Option<RecordKind>,
    /// Groups (teams) enumerated
    pub groups: u64,
    /// Channels enumerated
    pub channels: u64,
    /// Messages (mail or channel) fetched
    pub messages: u64,
    /// Meetings fetched
    pub meetings: u64,
    /// Participants fetched
    pub participants: u64,
}

impl Progress {
    /// Counter for a record kind
    pub fn count(&self, kind: RecordKind) -> u64 {
        match kind {
            RecordKind::Message | RecordKind::MailMessage | RecordKind::ChannelMessage => {
                self.messages
            }
            RecordKind::Meeting => self.meetings,
            RecordKind::Participant => self.participants,
        }
    }

    pub(crate) fn count_mut(&mut self, kind: RecordKind) -> &mut u64 {
        match kind {
            RecordKind::Message | RecordKind::MailMessage | RecordKind::ChannelMessage => {
                &mut self.messages
            }
            RecordKind::Meeting => &mut self.meetings,
            RecordKind::Participant => &mut self.participants,
        }
    }
}

/// Event emitted during a workflow run
///
/// Events are the only input to the workflow's state reducer; consumers can
/// subscribe to them for fine-grained progress or watch the reduced state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A run was started for a provider
    RunStarted {
        /// Provider being acquired
        provider: Provider,
    },

    /// Login/consent handshake started
    Authorizing {
        /// Whether an interactive consent window is being used
        interactive: bool,
    },

    /// Provider identity resolved and accepted
    Authorized {
        /// Canonical address of the authenticated account
        email: String,
    },

    /// Provider identity is not in the allow-list
    WrongAccount {
        /// The rejected address
        email: String,
        /// The allow-list it was checked against
        allowed: Vec<String>,
    },

    /// Enumeration started
    ListingStarted,

    /// One list page was loaded
    PageLoaded {
        /// Pages loaded so far in this run
        pages: u64,
        /// Items on this page
        items: u64,
        /// Provider's running estimate of the total, if any
        #[serde(skip_serializing_if = "Option::is_none")]
        estimated_total: Option<u64>,
    },

    /// Groups (teams) enumerated
    GroupsLoaded {
        /// Number of groups
        count: u64,
    },

    /// Channels enumerated for one group
    ChannelsLoaded {
        /// Number of channels added
        count: u64,
    },

    /// Enumeration finished with this many identifiers to fetch
    TotalRecords {
        /// Kind of record the total refers to
        kind: RecordKind,
        /// Identifiers collected
        total: u64,
    },

    /// Record fetching started
    FetchingStarted,

    /// A chunk/page of records was fetched
    RecordsLoaded {
        /// Kind of record fetched
        kind: RecordKind,
        /// Records in this chunk/page
        count: u64,
    },

    /// Every record has been fetched
    RecordsFetched {
        /// Records collected in total
        total: u64,
    },

    /// Requesting a signed upload target
    Signing {
        /// Package file name
        name: String,
        /// Package size in bytes
        size: u64,
    },

    /// Uploading the package
    Uploading {
        /// Package ID issued by the signing service
        package_id: String,
    },

    /// Notifying the backend
    Notifying {
        /// Package ID issued by the signing service
        package_id: String,
    },

    /// Run completed
    Done {
        /// Package ID issued by the signing service
        package_id: String,
        /// Records contained in the package
        records: u64,
    },

    /// Run failed
    Failed {
        /// Error message
        error: String,
    },

    /// Run cancelled by the user; the workflow returns to not-started
    Cancelled,

    /// Session logged out; the workflow returns to not-started
    LoggedOut,
}

//! # acquisition
//!
//! Paginated, cancellable metadata acquisition from mail, chat and meeting
//! providers (Gmail, Outlook, Teams and Zoom).
//!
//! ## Design Philosophy
//!
//! acquisition is designed to be:
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers watch state or subscribe to events, no polling required
//! - **Cancellable** - Every network call and throttle delay of a run can be aborted
//! - **Metadata only** - Addresses, identities and timestamps; never message bodies
//!
//! A run authorizes against the provider, checks the account against the
//! allow-list, pages through the provider's lists, fetches records in
//! throttled chunks, then packages them as JSON, uploads the package to a
//! signed URL and notifies the backend.
//!
//! ## Quick Start
//!
//! ```no_run
//! use acquisition::auth::{AuthRegistry, StaticAuthorizer};
//! use acquisition::backend::{BackendClient, Session};
//! use acquisition::workflow::Collaborators;
//! use acquisition::{Config, Credential, Provider, Workflow};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let credential = Credential::new(
//!         "provider-access-token",
//!         "me@example.com",
//!         chrono::Utc::now() + chrono::Duration::hours(1),
//!     );
//!     let auth = Arc::new(AuthRegistry::single(Arc::new(StaticAuthorizer::new(credential))));
//!     let backend = Arc::new(BackendClient::new(
//!         reqwest::Client::new(),
//!         "https://api.example.com",
//!         Session {
//!             access_token: "session-jwt".to_string(),
//!             refresh_token: None,
//!         },
//!     ));
//!
//!     let config = Config::default();
//!     let collaborators = Collaborators::from_backend(auth, backend, &config)?;
//!     let workflow = Workflow::new(Provider::Gmail, config, collaborators)?;
//!
//!     // Watch the stage and progress counters
//!     let mut state = workflow.watch();
//!     tokio::spawn(async move {
//!         while state.changed().await.is_ok() {
//!             let snapshot = state.borrow().clone();
//!             println!("{} {:?}", snapshot.stage, snapshot.progress);
//!         }
//!     });
//!
//!     workflow.start()?.await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Provider authorization seam and per-session authorizer registry
pub mod auth;
/// Backend service client (allow-list, signing, notify)
pub mod backend;
/// Chunked record fetching
pub mod batch;
/// Per-run cancellation
pub mod cancel;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// HTTP client for provider APIs
pub mod http;
/// Gmail multipart batch bodies
pub mod multipart;
/// Packaging and signed upload
pub mod package;
/// Lazy cursor-based pagination
pub mod pagination;
/// Provider sources
pub mod providers;
/// Fixed delay between chunks
pub mod rate_limiter;
/// Normalized records
pub mod records;
/// Core types and events
pub mod types;
/// Progress display helpers
pub mod utils;
/// Account allow-list validation
pub mod validator;
/// Workflow state machine
pub mod workflow;

// Re-export commonly used types
pub use cancel::{CancelHandle, CancelReason};
pub use config::{Config, UploadPolicy};
pub use error::{ApiError, AuthError, Error, ErrorCategory, PackageError, Result};
pub use records::{Record, RecordKind};
pub use types::{Credential, Event, Progress, Provider, Stage};
pub use workflow::{Collaborators, Workflow, WorkflowState};

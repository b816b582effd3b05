//! Provider sources
//!
//! Each provider knows how to resolve the authenticated identity and how to
//! enumerate and fetch its records:
//! - [`gmail`] - message id pages, then multipart batch fetches of headers
//! - [`outlook`] - Graph message pages carrying recipients directly
//! - [`teams`] - groups, their channels, then channel message pages
//! - [`zoom`] - meeting pages, then participant pages per meeting
//!
//! Sources report progress by emitting [`Event`]s through the run context and
//! never touch workflow state directly.

mod graph;

pub mod gmail;
pub mod outlook;
pub mod teams;
pub mod zoom;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use gmail::GmailSource;
pub use outlook::OutlookSource;
pub use teams::TeamsSource;
pub use zoom::ZoomSource;

use crate::batch::BatchFetcher;
use crate::cancel::CancelHandle;
use crate::config::Config;
use crate::error::Result;
use crate::http::ApiClient;
use crate::rate_limiter::RateLimiter;
use crate::records::Record;
use crate::types::{Credential, Event, Provider};
use async_trait::async_trait;
use std::sync::Arc;

/// Receiver for the events a run emits
#[derive(Clone)]
pub struct EventSink(Arc<dyn Fn(Event) + Send + Sync>);

impl EventSink {
    /// Forward events to `f`
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// A sink that drops every event
    pub fn discard() -> Self {
        Self::new(|_| {})
    }

    /// Emit one event
    pub fn emit(&self, event: Event) {
        (self.0)(event)
    }
}

impl std::fmt::Debug for EventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EventSink")
    }
}

/// Everything a provider needs during one run
#[derive(Clone, Debug)]
pub struct RunContext {
    /// HTTP client for provider APIs
    pub api: ApiClient,
    /// Run configuration
    pub config: Arc<Config>,
    /// Provider credential for this run
    pub credential: Credential,
    /// The run's cancel handle
    pub cancel: CancelHandle,
    /// Progress event receiver
    pub events: EventSink,
    /// Throttle between chunk fetches
    pub limiter: RateLimiter,
}

impl RunContext {
    /// Build a context; the throttle delay comes from `config.fetch.chunk_delay`
    pub fn new(
        api: ApiClient,
        config: Arc<Config>,
        credential: Credential,
        cancel: CancelHandle,
        events: EventSink,
    ) -> Self {
        let limiter = RateLimiter::new(config.fetch.chunk_delay);
        Self {
            api,
            config,
            credential,
            cancel,
            events,
            limiter,
        }
    }

    /// Bearer token for provider calls
    pub fn token(&self) -> &str {
        &self.credential.access_token
    }

    /// Emit a progress event
    pub fn emit(&self, event: Event) {
        self.events.emit(event);
    }

    /// Chunked fetcher using the configured chunk size and throttle
    pub fn fetcher(&self) -> BatchFetcher {
        BatchFetcher::new(self.config.fetch.chunk_size, self.limiter.clone())
    }
}

/// A provider the workflow can acquire records from
#[async_trait]
pub trait ProviderSource: Send + Sync {
    /// Which provider this is
    fn provider(&self) -> Provider;

    /// Address of the account the credential belongs to
    async fn whoami(&self, ctx: &RunContext) -> Result<String>;

    /// Enumerate and fetch every record, emitting progress along the way
    ///
    /// Emits `FetchingStarted` when moving from listing to record fetching.
    async fn collect(&self, ctx: &RunContext) -> Result<Vec<Record>>;

    /// Revoke the provider session so another account can be chosen
    ///
    /// Providers without a revocation endpoint do nothing.
    async fn revoke(&self, _ctx: &RunContext) -> Result<()> {
        Ok(())
    }
}

/// Default source for a provider
pub fn source_for(provider: Provider) -> Arc<dyn ProviderSource> {
    match provider {
        Provider::Gmail => Arc::new(GmailSource),
        Provider::Outlook => Arc::new(OutlookSource),
        Provider::Teams => Arc::new(TeamsSource),
        Provider::Zoom => Arc::new(ZoomSource),
    }
}

/// Build `base/path?query` with properly encoded parameters
pub(crate) fn build_url(base: &str, path: &str, query: &[(&str, String)]) -> Result<String> {
    let mut url = url::Url::parse(&crate::http::join_url(base, path))?;
    if !query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in query {
            pairs.append_pair(key, value);
        }
    }
    Ok(url.into())
}

//! Shared helpers for provider and workflow tests.

use crate::cancel::CancelHandle;
use crate::config::Config;
use crate::http::ApiClient;
use crate::providers::{EventSink, RunContext};
use crate::types::{Credential, Event};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Config with every endpoint pointed at `uri` and no throttling
pub(crate) fn test_config(uri: &str) -> Config {
    let mut config = Config::default();
    config.endpoints.gmail_api = uri.to_string();
    config.endpoints.gmail_batch = format!("{}/batch/gmail/v1", uri);
    config.endpoints.graph_api = uri.to_string();
    config.endpoints.zoom_api = uri.to_string();
    config.endpoints.backend_api = uri.to_string();
    config.fetch.chunk_delay = Duration::ZERO;
    config
}

/// A credential valid for the next hour
pub(crate) fn valid_credential(email: &str) -> Credential {
    Credential::new(
        "tok",
        email,
        chrono::Utc::now() + chrono::Duration::hours(1),
    )
}

/// Collects every emitted event
#[derive(Clone, Default)]
pub(crate) struct Recorder {
    events: Arc<Mutex<Vec<Event>>>,
}

impl Recorder {
    pub(crate) fn sink(&self) -> EventSink {
        let events = Arc::clone(&self.events);
        EventSink::new(move |event| events.lock().unwrap().push(event))
    }

    pub(crate) fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    /// Number of `PageLoaded` events
    pub(crate) fn pages(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::PageLoaded { .. }))
            .count()
    }
}

/// A run context against `config` with a fresh cancel handle
pub(crate) fn context(config: Config, recorder: &Recorder) -> RunContext {
    RunContext::new(
        ApiClient::new(None).unwrap(),
        Arc::new(config),
        valid_credential("a@x.com"),
        CancelHandle::new(),
        recorder.sink(),
    )
}

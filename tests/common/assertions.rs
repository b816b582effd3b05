//! Waiting on workflow outcomes

use acquisition::Event;
use std::time::Duration;
use tokio::sync::broadcast;

/// How a run ended
#[derive(Debug, PartialEq, Eq)]
pub enum WaitResult {
    /// Run completed with this package ID
    Done(String),
    /// Run failed with error
    Failed(String),
    /// Authenticated account was rejected
    WrongAccount(String),
    /// Run was cancelled by the user
    Cancelled,
    /// Timeout waiting for an outcome
    Timeout,
    /// Channel closed unexpectedly
    ChannelClosed,
}

/// Wait for the run's final event
///
/// Subscribe before starting the run so no event is missed.
pub async fn wait_for_outcome(
    events: &mut broadcast::Receiver<Event>,
    timeout: Duration,
) -> WaitResult {
    let result = tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(Event::Done { package_id, .. }) => return WaitResult::Done(package_id),
                Ok(Event::Failed { error }) => return WaitResult::Failed(error),
                Ok(Event::WrongAccount { email, .. }) => return WaitResult::WrongAccount(email),
                Ok(Event::Cancelled) => return WaitResult::Cancelled,
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return WaitResult::ChannelClosed,
            }
        }
    })
    .await;

    result.unwrap_or(WaitResult::Timeout)
}

/// Collect every event already received
pub fn drain(events: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

//! Outlook: mailbox message recipients through Microsoft Graph
//!
//! Graph pages carry the selected fields directly, so there is no separate
//! id listing phase: every page is normalized as it arrives.

use super::graph::{self, V1};
use super::{ProviderSource, RunContext};
use crate::error::Result;
use crate::records::{OutlookMessage, RawOutlookMessage, Record, RecordKind};
use crate::types::{Event, Provider};
use async_trait::async_trait;
use futures::TryStreamExt;

const SELECT: &[&str] = &[
    "from",
    "toRecipients",
    "ccRecipients",
    "bccRecipients",
    "createdDateTime",
];

/// Outlook message recipients
#[derive(Clone, Copy, Debug, Default)]
pub struct OutlookSource;

#[async_trait]
impl ProviderSource for OutlookSource {
    fn provider(&self) -> Provider {
        Provider::Outlook
    }

    async fn whoami(&self, ctx: &RunContext) -> Result<String> {
        graph::whoami(ctx).await
    }

    async fn collect(&self, ctx: &RunContext) -> Result<Vec<Record>> {
        ctx.emit(Event::FetchingStarted);

        let first = graph::resource_url(ctx, V1, "me/messages", SELECT)?;
        let pages = graph::pages::<RawOutlookMessage>(ctx, first);
        futures::pin_mut!(pages);

        let mut records = Vec::new();
        while let Some(batch) = pages.try_next().await? {
            let count = batch.items.len() as u64;
            ctx.emit(Event::PageLoaded {
                pages: batch.page,
                items: count,
                estimated_total: None,
            });
            records.extend(
                batch
                    .items
                    .into_iter()
                    .map(|raw| Record::MailMessage(OutlookMessage::from(raw))),
            );
            ctx.emit(Event::RecordsLoaded {
                kind: RecordKind::MailMessage,
                count,
            });
        }

        tracing::debug!(records = records.len(), "Outlook messages collected");
        Ok(records)
    }
}

//! Teams: channel messages across every joined team
//!
//! Listing walks `me/memberOf` for group ids and each group's channels.
//! Groups that are not teams have no channel collection (404) and are
//! skipped. Messages are then paged per (group, channel) pair from the beta
//! endpoint, which does not support `$select`.

use super::graph::{self, BETA, IdOnly, V1};
use super::{ProviderSource, RunContext};
use crate::error::{ApiError, Error, Result};
use crate::records::{ChannelMessage, RawChannelMessage, Record, RecordKind};
use crate::types::{Event, Provider};
use async_trait::async_trait;
use futures::TryStreamExt;

/// Teams channel messages
#[derive(Clone, Copy, Debug, Default)]
pub struct TeamsSource;

impl TeamsSource {
    /// Ids of every group the user is a member of
    pub async fn list_groups(&self, ctx: &RunContext) -> Result<Vec<String>> {
        let first = graph::resource_url(ctx, V1, "me/memberOf", &["id"])?;
        collect_ids(ctx, first).await
    }

    /// Ids of a group's channels (empty when the group is not a team)
    pub async fn list_channels(&self, ctx: &RunContext, group: &str) -> Result<Vec<String>> {
        let path = format!("teams/{}/channels", urlencoding::encode(group));
        let first = graph::resource_url(ctx, V1, &path, &["id"])?;
        match collect_ids(ctx, first).await {
            Err(Error::Api(ApiError::Status { status: 404, .. })) => {
                tracing::debug!(group, "Group has no team channels, skipping");
                Ok(Vec::new())
            }
            other => other,
        }
    }
}

async fn collect_ids(ctx: &RunContext, first: String) -> Result<Vec<String>> {
    let pages = graph::pages::<IdOnly>(ctx, first);
    futures::pin_mut!(pages);

    let mut ids = Vec::new();
    while let Some(batch) = pages.try_next().await? {
        ids.extend(batch.items.into_iter().map(|item| item.id));
    }
    Ok(ids)
}

#[async_trait]
impl ProviderSource for TeamsSource {
    fn provider(&self) -> Provider {
        Provider::Teams
    }

    async fn whoami(&self, ctx: &RunContext) -> Result<String> {
        graph::whoami(ctx).await
    }

    async fn collect(&self, ctx: &RunContext) -> Result<Vec<Record>> {
        let groups = self.list_groups(ctx).await?;
        ctx.emit(Event::GroupsLoaded {
            count: groups.len() as u64,
        });

        let mut channels = Vec::new();
        for group in &groups {
            let ids = self.list_channels(ctx, group).await?;
            ctx.emit(Event::ChannelsLoaded {
                count: ids.len() as u64,
            });
            channels.extend(ids.into_iter().map(|channel| (group.clone(), channel)));
        }
        tracing::debug!(
            groups = groups.len(),
            channels = channels.len(),
            "Teams channels enumerated"
        );

        ctx.emit(Event::FetchingStarted);

        let mut records = Vec::new();
        let mut loaded_pages = 0u64;
        for (group, channel) in &channels {
            let path = format!(
                "teams/{}/channels/{}/messages",
                urlencoding::encode(group),
                urlencoding::encode(channel)
            );
            let first = graph::resource_url(ctx, BETA, &path, &[])?;
            let pages = graph::pages::<RawChannelMessage>(ctx, first);
            futures::pin_mut!(pages);

            while let Some(batch) = pages.try_next().await? {
                let count = batch.items.len() as u64;
                loaded_pages += 1;
                ctx.emit(Event::PageLoaded {
                    pages: loaded_pages,
                    items: count,
                    estimated_total: None,
                });
                records.extend(
                    batch
                        .items
                        .into_iter()
                        .map(|raw| Record::ChannelMessage(ChannelMessage::from(raw))),
                );
                ctx.emit(Event::RecordsLoaded {
                    kind: RecordKind::ChannelMessage,
                    count,
                });
            }
        }

        Ok(records)
    }
}

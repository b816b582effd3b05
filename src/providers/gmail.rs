//! Gmail: message id listing plus multipart batch fetches
//!
//! Listing pages through `users/me/messages`, which only returns ids and a
//! running `resultSizeEstimate`. Headers are then fetched in chunks through the
//! batch endpoint, one `format=metadata` sub-request per id.

use super::{ProviderSource, RunContext, build_url};
use crate::batch::ChunkSource;
use crate::error::Result;
use crate::multipart;
use crate::pagination::{Page, paginate};
use crate::records::{GmailMessage, RawGmailMessage, Record, RecordKind};
use crate::types::{Event, Provider};
use async_trait::async_trait;
use futures::TryStreamExt;
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageList {
    #[serde(default)]
    messages: Vec<MessageRef>,
    #[serde(default)]
    next_page_token: Option<String>,
    #[serde(default)]
    result_size_estimate: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Profile {
    email_address: String,
}

/// Gmail message headers
#[derive(Clone, Copy, Debug, Default)]
pub struct GmailSource;

impl GmailSource {
    /// Every message id in the mailbox, in listing order
    pub async fn list_message_ids(&self, ctx: &RunContext) -> Result<Vec<String>> {
        let pages = paginate(None::<String>, ctx.cancel.clone(), |page_token| {
            list_page(ctx, page_token)
        });
        futures::pin_mut!(pages);

        let mut ids = Vec::new();
        while let Some(batch) = pages.try_next().await? {
            tracing::debug!(
                page = batch.page,
                items = batch.items.len(),
                estimate = ?batch.estimated_total,
                "Gmail list page loaded"
            );
            ctx.emit(Event::PageLoaded {
                pages: batch.page,
                items: batch.items.len() as u64,
                estimated_total: batch.estimated_total,
            });
            ids.extend(batch.items);
        }
        Ok(ids)
    }
}

async fn list_page(
    ctx: &RunContext,
    page_token: Option<String>,
) -> Result<Page<String, Option<String>>> {
    let mut query = vec![("maxResults", ctx.config.fetch.gmail_page_size.to_string())];
    if let Some(token) = page_token {
        query.push(("pageToken", token));
    }
    let url = build_url(
        &ctx.config.endpoints.gmail_api,
        "gmail/v1/users/me/messages",
        &query,
    )?;
    let list: MessageList = ctx.api.get_json(&url, ctx.token(), &ctx.cancel).await?;

    let ids = list.messages.into_iter().map(|m| m.id).collect();
    let next = list
        .next_page_token
        .filter(|t| !t.is_empty())
        .map(Some);
    Ok(Page::new(ids, next).with_estimate(list.result_size_estimate))
}

#[async_trait]
impl ProviderSource for GmailSource {
    fn provider(&self) -> Provider {
        Provider::Gmail
    }

    async fn whoami(&self, ctx: &RunContext) -> Result<String> {
        let url = build_url(
            &ctx.config.endpoints.gmail_api,
            "gmail/v1/users/me/profile",
            &[],
        )?;
        let profile: Profile = ctx.api.get_json(&url, ctx.token(), &ctx.cancel).await?;
        Ok(profile.email_address)
    }

    async fn collect(&self, ctx: &RunContext) -> Result<Vec<Record>> {
        let ids = self.list_message_ids(ctx).await?;
        ctx.emit(Event::TotalRecords {
            kind: RecordKind::Message,
            total: ids.len() as u64,
        });
        ctx.emit(Event::FetchingStarted);

        let source = BatchSource { ctx };
        let messages = ctx
            .fetcher()
            .fetch_all(&source, &ids, &ctx.cancel, |progress| {
                ctx.emit(Event::RecordsLoaded {
                    kind: RecordKind::Message,
                    count: progress.fetched as u64,
                });
            })
            .await?;

        Ok(messages.into_iter().map(Record::Message).collect())
    }
}

/// One batch POST per chunk of message ids
struct BatchSource<'a> {
    ctx: &'a RunContext,
}

#[async_trait]
impl<'a> ChunkSource for BatchSource<'a> {
    type Item = GmailMessage;

    async fn fetch_chunk(&self, ids: &[String]) -> Result<HashMap<String, GmailMessage>> {
        let endpoints = &self.ctx.config.endpoints;
        let boundary = multipart::random_boundary();
        let body = multipart::build_batch_body(&boundary, ids, &endpoints.gmail_api);

        let (content_type, text) = self
            .ctx
            .api
            .post_raw(
                &endpoints.gmail_batch,
                self.ctx.token(),
                &multipart::content_type(&boundary),
                body,
                &self.ctx.cancel,
            )
            .await?;

        let parts = multipart::parse_batch_response(&text, &content_type)?;
        let mut messages = HashMap::with_capacity(parts.len());
        for (id, value) in parts {
            match serde_json::from_value::<RawGmailMessage>(value) {
                Ok(raw) => {
                    messages.insert(id, GmailMessage::from(raw));
                }
                Err(e) => {
                    tracing::warn!(id = %id, error = %e, "Skipping undecodable message");
                }
            }
        }
        Ok(messages)
    }
}

//! Zoom: meetings and their participants
//!
//! Meetings are paged by page number until `page_number >= page_count`; the
//! reported `total_records` caps how many are taken. Participants are then
//! paged per unique meeting id with `next_page_token`, pausing between
//! meetings like between chunks. A meeting without a participant report
//! (404) contributes no participants.

use super::{ProviderSource, RunContext, build_url};
use crate::error::{ApiError, Error, Result};
use crate::pagination::{Page, paginate};
use crate::records::{Meeting, Participant, Record, RecordKind};
use crate::types::{Event, Provider};
use async_trait::async_trait;
use futures::TryStreamExt;
use serde::Deserialize;
use std::collections::HashSet;

#[derive(Debug, Deserialize)]
struct MeetingPage {
    #[serde(default)]
    meetings: Vec<Meeting>,
    #[serde(default)]
    page_number: Option<u32>,
    #[serde(default)]
    page_count: Option<u32>,
    #[serde(default)]
    total_records: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ParticipantPage {
    #[serde(default)]
    participants: Vec<Participant>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Me {
    email: String,
}

/// Zoom meetings and participants
#[derive(Clone, Copy, Debug, Default)]
pub struct ZoomSource;

impl ZoomSource {
    /// Every scheduled meeting, in listing order
    pub async fn list_meetings(&self, ctx: &RunContext, pages_loaded: &mut u64) -> Result<Vec<Meeting>> {
        let pages = paginate(1u32, ctx.cancel.clone(), |page| meetings_page(ctx, page));
        futures::pin_mut!(pages);

        let mut meetings = Vec::new();
        while let Some(batch) = pages.try_next().await? {
            let count = batch.items.len() as u64;
            *pages_loaded += 1;
            ctx.emit(Event::PageLoaded {
                pages: *pages_loaded,
                items: count,
                estimated_total: None,
            });
            ctx.emit(Event::RecordsLoaded {
                kind: RecordKind::Meeting,
                count,
            });
            meetings.extend(batch.items);
        }
        Ok(meetings)
    }

    /// Participants of one past meeting
    pub async fn list_participants(
        &self,
        ctx: &RunContext,
        meeting_id: &str,
        pages_loaded: &mut u64,
    ) -> Result<Vec<Participant>> {
        let pages = paginate(None::<String>, ctx.cancel.clone(), |token| {
            participants_page(ctx, meeting_id, token)
        });
        futures::pin_mut!(pages);

        let mut participants = Vec::new();
        while let Some(batch) = pages.try_next().await? {
            let count = batch.items.len() as u64;
            *pages_loaded += 1;
            ctx.emit(Event::PageLoaded {
                pages: *pages_loaded,
                items: count,
                estimated_total: None,
            });
            ctx.emit(Event::RecordsLoaded {
                kind: RecordKind::Participant,
                count,
            });
            participants.extend(batch.items);
        }
        Ok(participants)
    }
}

async fn meetings_page(ctx: &RunContext, page: u32) -> Result<Page<Meeting, u32>> {
    let url = build_url(
        &ctx.config.endpoints.zoom_api,
        "users/me/meetings",
        &[
            ("page_size", ctx.config.fetch.zoom_page_size.to_string()),
            ("page_number", page.to_string()),
        ],
    )?;
    let response: MeetingPage = ctx.api.get_json(&url, ctx.token(), &ctx.cancel).await?;

    let current = response.page_number.unwrap_or(page);
    let count = response.page_count.unwrap_or(current);
    let next = (current < count).then_some(current + 1);
    Ok(Page::new(response.meetings, next).with_exact_total(response.total_records))
}

async fn participants_page(
    ctx: &RunContext,
    meeting_id: &str,
    token: Option<String>,
) -> Result<Page<Participant, Option<String>>> {
    let mut query = vec![("page_size", ctx.config.fetch.zoom_page_size.to_string())];
    if let Some(token) = token {
        query.push(("next_page_token", token));
    }
    let path = format!(
        "past_meetings/{}/participants",
        urlencoding::encode(meeting_id)
    );
    let url = build_url(&ctx.config.endpoints.zoom_api, &path, &query)?;

    let response: ParticipantPage = match ctx.api.get_json(&url, ctx.token(), &ctx.cancel).await {
        Err(Error::Api(ApiError::Status { status: 404, .. })) => {
            tracing::debug!(meeting_id, "No participant report for meeting");
            return Ok(Page::new(Vec::new(), None));
        }
        other => other?,
    };

    let participants = response
        .participants
        .into_iter()
        .map(|p| Participant {
            meeting_id: meeting_id.to_string(),
            ..p
        })
        .collect();
    let next = response
        .next_page_token
        .filter(|t| !t.is_empty())
        .map(Some);
    Ok(Page::new(participants, next))
}

/// Unique, non-empty meeting ids in first-seen order
fn unique_meeting_ids(meetings: &[Meeting]) -> Vec<String> {
    let mut seen = HashSet::new();
    meetings
        .iter()
        .filter(|m| !m.id.is_empty())
        .filter(|m| seen.insert(m.id.clone()))
        .map(|m| m.id.clone())
        .collect()
}

#[async_trait]
impl ProviderSource for ZoomSource {
    fn provider(&self) -> Provider {
        Provider::Zoom
    }

    async fn whoami(&self, ctx: &RunContext) -> Result<String> {
        let url = build_url(&ctx.config.endpoints.zoom_api, "users/me", &[])?;
        let me: Me = ctx.api.get_json(&url, ctx.token(), &ctx.cancel).await?;
        Ok(me.email)
    }

    async fn collect(&self, ctx: &RunContext) -> Result<Vec<Record>> {
        let mut pages_loaded = 0;
        let meetings = self.list_meetings(ctx, &mut pages_loaded).await?;
        let ids = unique_meeting_ids(&meetings);
        ctx.emit(Event::TotalRecords {
            kind: RecordKind::Meeting,
            total: ids.len() as u64,
        });
        ctx.emit(Event::FetchingStarted);

        let mut participants = Vec::new();
        for (index, id) in ids.iter().enumerate() {
            participants.extend(self.list_participants(ctx, id, &mut pages_loaded).await?);
            ctx.limiter.pause_after(index, ids.len(), &ctx.cancel).await?;
        }

        tracing::debug!(
            meetings = meetings.len(),
            participants = participants.len(),
            "Zoom records collected"
        );

        let mut records: Vec<Record> = meetings.into_iter().map(Record::Meeting).collect();
        records.extend(participants.into_iter().map(Record::Participant));
        Ok(records)
    }

    async fn revoke(&self, ctx: &RunContext) -> Result<()> {
        let url = build_url(&ctx.config.endpoints.zoom_api, "users/me/token", &[])?;
        ctx.api.delete(&url, ctx.token(), &ctx.cancel).await?;
        tracing::info!("Zoom token revoked");
        Ok(())
    }
}

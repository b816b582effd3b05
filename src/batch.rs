//! Chunked record fetching
//!
//! [`BatchFetcher`] partitions an ordered list of record identifiers into
//! fixed-size chunks and fetches each chunk with one call to a [`ChunkSource`].
//! Chunks run strictly one after another, in input order, with the
//! [`RateLimiter`] pause between them.
//!
//! A chunk source returns whatever sub-results it could decode, keyed by id.
//! Ids missing from that map (a malformed or failed sub-part) are skipped; the
//! chunk itself only fails when the source returns an error, and that error is
//! fatal for the run.

use crate::cancel::CancelHandle;
use crate::error::Result;
use crate::rate_limiter::RateLimiter;
use async_trait::async_trait;
use std::collections::HashMap;

/// Fetches full records for one chunk of identifiers
#[async_trait]
pub trait ChunkSource: Send + Sync {
    /// Normalized record type produced for each identifier
    type Item: Send;

    /// Fetch records for `ids` in a single request
    ///
    /// Returns the successfully decoded records keyed by identifier.
    async fn fetch_chunk(&self, ids: &[String]) -> Result<HashMap<String, Self::Item>>;
}

/// Progress of one completed chunk
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkProgress {
    /// 0-based index of the chunk
    pub index: usize,
    /// Number of chunks in this fetch
    pub chunks: usize,
    /// Identifiers requested in this chunk
    pub requested: usize,
    /// Records decoded from this chunk
    pub fetched: usize,
}

/// Sequential chunked fetcher
#[derive(Clone, Debug)]
pub struct BatchFetcher {
    chunk_size: usize,
    limiter: RateLimiter,
}

impl BatchFetcher {
    /// Create a fetcher; a chunk size of 0 is treated as 1
    pub fn new(chunk_size: usize, limiter: RateLimiter) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            limiter,
        }
    }

    /// Configured chunk size
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of requests needed for `len` identifiers
    pub fn chunk_count(&self, len: usize) -> usize {
        len.div_ceil(self.chunk_size)
    }

    /// Fetch records for every identifier, preserving input order
    ///
    /// `on_chunk` is called after each chunk, before the throttle pause. The
    /// cancel handle is checked before every chunk request and during every
    /// pause, so no request starts once the run is cancelled.
    pub async fn fetch_all<S, F>(
        &self,
        source: &S,
        ids: &[String],
        cancel: &CancelHandle,
        mut on_chunk: F,
    ) -> Result<Vec<S::Item>>
    where
        S: ChunkSource + ?Sized,
        F: FnMut(ChunkProgress) + Send,
    {
        let chunks = self.chunk_count(ids.len());
        let mut records = Vec::with_capacity(ids.len());

        for (index, chunk) in ids.chunks(self.chunk_size).enumerate() {
            cancel.check()?;

            tracing::debug!(
                chunk = index + 1,
                chunks,
                size = chunk.len(),
                "Fetching chunk"
            );

            let mut fetched = cancel.run(source.fetch_chunk(chunk)).await?;

            let before = records.len();
            for id in chunk {
                match fetched.remove(id) {
                    Some(record) => records.push(record),
                    None => tracing::debug!(id = %id, "No record returned for id, skipping"),
                }
            }

            on_chunk(ChunkProgress {
                index,
                chunks,
                requested: chunk.len(),
                fetched: records.len() - before,
            });

            self.limiter.pause_after(index, chunks, cancel).await?;
        }

        Ok(records)
    }
}

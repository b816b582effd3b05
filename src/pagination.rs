//! Cursor-based pagination as a lazy stream of pages
//!
//! [`paginate`] turns a "fetch one page for this cursor" function into a
//! [`Stream`] of [`PageBatch`]es. The stream is lazy (a page is requested only
//! when the consumer polls for it, never prefetched), finite, and not
//! restartable: once it ends, a new stream must be built.
//!
//! Iteration stops when a page carries no continuation cursor, or when a page
//! has no items. An empty page is treated exactly like "no more pages", not as
//! an error. Every page fetch goes through the run's [`CancelHandle`], so a
//! cancelled run never starts another page request.

use crate::cancel::CancelHandle;
use crate::error::Result;
use futures::Stream;
use std::future::Future;

/// One page as returned by a provider API, before pagination bookkeeping
#[derive(Clone, Debug, PartialEq)]
pub struct Page<T, C> {
    /// Items on this page
    pub items: Vec<T>,
    /// Cursor for the next page (None = last page)
    pub next: Option<C>,
    /// Provider's estimate of the overall item count (informational only)
    pub estimated_total: Option<u64>,
    /// Provider's exact overall item count; caps the number of items yielded
    pub exact_total: Option<u64>,
}

impl<T, C> Page<T, C> {
    /// A page with items and an optional continuation cursor
    pub fn new(items: Vec<T>, next: Option<C>) -> Self {
        Self {
            items,
            next,
            estimated_total: None,
            exact_total: None,
        }
    }

    /// Attach an estimated total
    pub fn with_estimate(mut self, estimate: Option<u64>) -> Self {
        self.estimated_total = estimate;
        self
    }

    /// Attach an exact total
    pub fn with_exact_total(mut self, total: Option<u64>) -> Self {
        self.exact_total = total;
        self
    }
}

/// A page yielded by the paginator
#[derive(Clone, Debug, PartialEq)]
pub struct PageBatch<T> {
    /// 1-based index of this page within the stream
    pub page: u64,
    /// Items on this page
    pub items: Vec<T>,
    /// Items yielded so far, including this page
    pub cumulative: u64,
    /// Provider's running estimate of the total, if it reports one
    pub estimated_total: Option<u64>,
}

struct State<C, F> {
    cursor: Option<C>,
    fetch: F,
    cancel: CancelHandle,
    pages: u64,
    yielded: u64,
}

/// Build a lazy page stream starting at `first`
///
/// `fetch` is called with each cursor in turn; the next call happens only after
/// the consumer has taken the previous page.
///
/// # Example
///
/// ```
/// use acquisition::cancel::CancelHandle;
/// use acquisition::pagination::{Page, paginate};
/// use futures::TryStreamExt;
///
/// # async fn example() -> acquisition::Result<()> {
/// let pages = paginate(0u32, CancelHandle::new(), |cursor| async move {
///     let next = if cursor < 2 { Some(cursor + 1) } else { None };
///     Ok(Page::new(vec![cursor], next))
/// });
/// let batches: Vec<_> = pages.try_collect().await?;
/// assert_eq!(batches.len(), 3);
/// # Ok(())
/// # }
/// ```
pub fn paginate<T, C, F, Fut>(
    first: C,
    cancel: CancelHandle,
    fetch: F,
) -> impl Stream<Item = Result<PageBatch<T>>>
where
    F: FnMut(C) -> Fut,
    Fut: Future<Output = Result<Page<T, C>>>,
{
    let state = State {
        cursor: Some(first),
        fetch,
        cancel,
        pages: 0,
        yielded: 0,
    };

    futures::stream::try_unfold(state, |mut state| async move {
        let Some(cursor) = state.cursor.take() else {
            return Ok(None);
        };

        let page = state.cancel.run((state.fetch)(cursor)).await?;
        let Page {
            mut items,
            mut next,
            estimated_total,
            exact_total,
        } = page;

        if items.is_empty() {
            tracing::debug!(pages = state.pages, "Empty page, pagination finished");
            return Ok(None);
        }

        if let Some(total) = exact_total {
            let room = total.saturating_sub(state.yielded) as usize;
            if items.len() >= room {
                if items.len() > room {
                    tracing::warn!(
                        reported_total = total,
                        dropped = items.len() - room,
                        "Provider returned more items than its reported total, truncating"
                    );
                    items.truncate(room);
                }
                next = None;
            }
            if items.is_empty() {
                return Ok(None);
            }
        }

        state.pages += 1;
        state.yielded += items.len() as u64;
        state.cursor = next;

        let batch = PageBatch {
            page: state.pages,
            cumulative: state.yielded,
            items,
            estimated_total,
        };
        Ok(Some((batch, state)))
    })
}

//! Page-at-a-time access to a remote calendar.
//!
//! [`PageFetcher::fetch_page`] issues exactly one logical `events.list` call
//! (retried under the [`RetryExecutor`]). [`PageStream`] drives the
//! pagination loop lazily and stops at the last page, on the first error, or
//! when the page cap is reached.

use std::sync::Arc;

use metrics::counter;
use tracing::{debug, warn};

use crate::provider::client::{CalendarApi, ListEventsQuery, RawEvent};
use crate::provider::error::RetryableError;
use crate::provider::retry::RetryExecutor;
use crate::sync::window::SyncWindow;

/// How the first page of a pass is selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchMode {
    /// Incremental: only changes since the stored sync token.
    Cursor(String),
    /// Full: everything inside the window.
    Window(SyncWindow),
}

impl FetchMode {
    pub fn is_incremental(&self) -> bool {
        matches!(self, FetchMode::Cursor(_))
    }

    fn query(&self, page_token: Option<&str>) -> ListEventsQuery {
        let mut query = ListEventsQuery {
            page_token: page_token.map(str::to_string),
            single_events: true,
            show_deleted: true,
            ..Default::default()
        };

        match self {
            // A sync token excludes every window parameter.
            FetchMode::Cursor(token) => {
                query.sync_token = Some(token.clone());
            }
            FetchMode::Window(window) => {
                query.time_min = Some(window.time_min_param());
                query.time_max = Some(window.time_max_param());
                query.time_zone = Some(window.time_zone.clone());
                query.updated_min = window.updated_min_param();
                query.order_by = Some("startTime".to_string());
            }
        }

        query
    }
}

/// One normalized page of remote items.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub items: Vec<RawEvent>,
    pub next_page_token: Option<String>,
    /// New resumption cursor; only present on the last page.
    pub next_cursor: Option<String>,
}

/// Fetches single pages through the retry executor.
pub struct PageFetcher {
    api: Arc<dyn CalendarApi>,
    retry: RetryExecutor,
    max_results: Option<u32>,
}

impl PageFetcher {
    pub fn new(api: Arc<dyn CalendarApi>, retry: RetryExecutor) -> Self {
        Self {
            api,
            retry,
            max_results: None,
        }
    }

    /// Request a fixed page size instead of the provider default.
    pub fn with_max_results(mut self, max_results: u32) -> Self {
        self.max_results = Some(max_results);
        self
    }

    pub async fn fetch_page(
        &self,
        calendar_id: &str,
        mode: &FetchMode,
        page_token: Option<&str>,
    ) -> Result<Page, RetryableError> {
        let mut query = mode.query(page_token);
        query.max_results = self.max_results;

        let label = format!("events.list {calendar_id}");
        let page = self
            .retry
            .execute(&label, || self.api.list_events(calendar_id, &query))
            .await?;

        counter!("calsync_pages_fetched_total").increment(1);
        debug!(
            calendar_id,
            items = page.items.len(),
            has_next_page = page.next_page_token.is_some(),
            has_sync_token = page.next_sync_token.is_some(),
            "Fetched events page"
        );

        Ok(Page {
            items: page.items,
            next_page_token: page.next_page_token,
            next_cursor: page.next_sync_token,
        })
    }

    /// Start a lazy pagination pass for one calendar.
    pub fn stream(&self, calendar_id: &str, mode: FetchMode, page_cap: usize) -> PageStream<'_> {
        PageStream {
            fetcher: self,
            calendar_id: calendar_id.to_string(),
            mode,
            next_page_token: None,
            page_cap: page_cap.max(1),
            pages_fetched: 0,
            cap_reached: false,
            finished: false,
        }
    }
}

/// Lazy, finite, non-restartable sequence of pages.
pub struct PageStream<'a> {
    fetcher: &'a PageFetcher,
    calendar_id: String,
    mode: FetchMode,
    next_page_token: Option<String>,
    page_cap: usize,
    pages_fetched: usize,
    cap_reached: bool,
    finished: bool,
}

impl PageStream<'_> {
    /// Fetch the next page, or `None` once the stream is exhausted.
    pub async fn next(&mut self) -> Option<Result<Page, RetryableError>> {
        if self.finished {
            return None;
        }

        if self.pages_fetched >= self.page_cap {
            self.finished = true;
            self.cap_reached = true;
            warn!(
                calendar_id = %self.calendar_id,
                page_cap = self.page_cap,
                "Page cap reached; ending pass with partial results"
            );
            return None;
        }

        match self
            .fetcher
            .fetch_page(&self.calendar_id, &self.mode, self.next_page_token.as_deref())
            .await
        {
            Ok(page) => {
                self.pages_fetched += 1;
                self.next_page_token = page.next_page_token.clone();
                if self.next_page_token.is_none() {
                    self.finished = true;
                }
                Some(Ok(page))
            }
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            }
        }
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    /// Whether the stream stopped because of the page cap.
    pub fn cap_reached(&self) -> bool {
        self.cap_reached
    }

    pub fn mode(&self) -> &FetchMode {
        &self.mode
    }
}

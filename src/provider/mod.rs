//! # Remote Provider
//!
//! Everything that talks to the remote calendar API: the HTTP client and its
//! token source, error classification, retry with backoff, and paginated
//! page fetching.

pub mod client;
pub mod error;
pub mod fetcher;
pub mod retry;

pub use client::{
    CalendarApi, EventsPage, FileTokenSource, HttpCalendarClient, ListEventsQuery, RawEvent,
    RawEventTime, StaticTokenSource, TokenSource,
};
pub use error::{ErrorBody, RetryableError, TransportError, classify, classify_at};
pub use fetcher::{FetchMode, Page, PageFetcher, PageStream};
pub use retry::{RetryExecutor, RetryPolicy, backoff_delay};

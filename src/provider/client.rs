//! HTTP client for the remote calendar `events.list` endpoint.
//!
//! [`CalendarApi`] is the seam the fetcher talks to; [`HttpCalendarClient`] is
//! the `reqwest` implementation. Bearer tokens come from a [`TokenSource`],
//! which is told to drop its cached token whenever the provider answers 401.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};
use url::Url;

use crate::provider::error::TransportError;

/// Query parameters of one `events.list` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListEventsQuery {
    pub sync_token: Option<String>,
    pub page_token: Option<String>,
    pub time_min: Option<String>,
    pub time_max: Option<String>,
    pub time_zone: Option<String>,
    pub updated_min: Option<String>,
    pub order_by: Option<String>,
    pub single_events: bool,
    pub show_deleted: bool,
    pub max_results: Option<u32>,
}

impl ListEventsQuery {
    /// Query pairs in wire form, omitting unset parameters.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        let optional = [
            ("syncToken", &self.sync_token),
            ("pageToken", &self.page_token),
            ("timeMin", &self.time_min),
            ("timeMax", &self.time_max),
            ("timeZone", &self.time_zone),
            ("updatedMin", &self.updated_min),
            ("orderBy", &self.order_by),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                pairs.push((key, value.clone()));
            }
        }
        if self.single_events {
            pairs.push(("singleEvents", "true".to_string()));
        }
        if self.show_deleted {
            pairs.push(("showDeleted", "true".to_string()));
        }
        if let Some(max) = self.max_results {
            pairs.push(("maxResults", max.to_string()));
        }
        pairs
    }
}

/// Start or end of a remote event as sent by the provider.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEventTime {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub date_time: Option<String>,
    #[serde(default)]
    pub time_zone: Option<String>,
}

/// One item of an `events.list` page. All fields are optional; unusable
/// items are filtered later by the event classifier.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub visibility: Option<String>,
    #[serde(default)]
    pub html_link: Option<String>,
    #[serde(default)]
    pub recurring_event_id: Option<String>,
    #[serde(default)]
    pub start: Option<RawEventTime>,
    #[serde(default)]
    pub end: Option<RawEventTime>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub updated: Option<String>,
}

/// A decoded `events.list` response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventsPage {
    pub items: Vec<RawEvent>,
    pub next_page_token: Option<String>,
    pub next_sync_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEventsPage {
    #[serde(default)]
    items: Vec<JsonValue>,
    #[serde(default)]
    next_page_token: Option<String>,
    #[serde(default)]
    next_sync_token: Option<String>,
}

impl EventsPage {
    /// Decode a response body. Items that do not match the event shape are
    /// kept as empty events so the classifier drops them; a body that is not
    /// a page at all is a malformed response.
    pub fn from_body(body: &str) -> Result<Self, TransportError> {
        let wire: WireEventsPage =
            serde_json::from_str(body).map_err(|e| TransportError::MalformedResponse {
                details: e.to_string(),
            })?;

        let items = wire
            .items
            .into_iter()
            .map(|item| {
                serde_json::from_value::<RawEvent>(item).unwrap_or_else(|err| {
                    warn!(error = %err, "Skipping undecodable event item");
                    RawEvent::default()
                })
            })
            .collect();

        Ok(Self {
            items,
            next_page_token: wire.next_page_token.filter(|t| !t.is_empty()),
            next_sync_token: wire.next_sync_token.filter(|t| !t.is_empty()),
        })
    }
}

/// Remote calendar provider.
#[async_trait]
pub trait CalendarApi: Send + Sync {
    async fn list_events(
        &self,
        calendar_id: &str,
        query: &ListEventsQuery,
    ) -> Result<EventsPage, TransportError>;
}

/// Supplies bearer tokens for the remote API.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String, TransportError>;

    /// Drop any cached token after the provider rejected it.
    async fn invalidate(&self);
}

/// Token handed in through configuration.
///
/// There is nothing to refresh, so a rejected token is offered again on the
/// next request. Rotating it requires a restart or a [`FileTokenSource`].
#[derive(Debug)]
pub struct StaticTokenSource {
    token: String,
}

impl StaticTokenSource {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn access_token(&self) -> Result<String, TransportError> {
        Ok(self.token.clone())
    }

    async fn invalidate(&self) {
        warn!("Configured access token was rejected; it will be retried on the next request");
    }
}

/// Token read from a file, cached until invalidated. An external process
/// (for example an OAuth helper) keeps the file fresh.
#[derive(Debug)]
pub struct FileTokenSource {
    path: PathBuf,
    cached: tokio::sync::Mutex<Option<String>>,
}

impl FileTokenSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cached: tokio::sync::Mutex::new(None),
        }
    }
}

#[async_trait]
impl TokenSource for FileTokenSource {
    async fn access_token(&self) -> Result<String, TransportError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }

        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| TransportError::Application {
                details: format!("failed to read token file {}: {e}", self.path.display()),
            })?;
        let token = raw.trim().to_string();
        if token.is_empty() {
            return Err(TransportError::Application {
                details: format!("token file {} is empty", self.path.display()),
            });
        }

        *cached = Some(token.clone());
        Ok(token)
    }

    async fn invalidate(&self) {
        self.cached.lock().await.take();
    }
}

/// `reqwest` implementation of [`CalendarApi`].
pub struct HttpCalendarClient {
    http: Client,
    base_url: Url,
    tokens: Arc<dyn TokenSource>,
}

impl HttpCalendarClient {
    /// `base_url` must end with `/` (e.g. `https://www.googleapis.com/calendar/v3/`).
    pub fn new(
        base_url: Url,
        tokens: Arc<dyn TokenSource>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("calsync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Application {
                details: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            base_url,
            tokens,
        })
    }

    fn events_url(&self, calendar_id: &str, query: &ListEventsQuery) -> Result<Url, TransportError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| TransportError::Application {
                details: format!("base url {} cannot carry a path", self.base_url),
            })?
            .pop_if_empty()
            .extend(["calendars", calendar_id, "events"]);

        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query.to_pairs() {
                pairs.append_pair(key, &value);
            }
        }

        Ok(url)
    }
}

#[async_trait]
impl CalendarApi for HttpCalendarClient {
    async fn list_events(
        &self,
        calendar_id: &str,
        query: &ListEventsQuery,
    ) -> Result<EventsPage, TransportError> {
        let url = self.events_url(calendar_id, query)?;
        let token = self.tokens.access_token().await?;

        debug!(calendar_id, url = %url, "Requesting events page");

        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let headers = response
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|v| (name.as_str().to_string(), v.to_string()))
                })
                .collect();
            let body = response.text().await.unwrap_or_default();

            if status == StatusCode::UNAUTHORIZED {
                warn!(calendar_id, "Access token rejected; invalidating cached token");
                self.tokens.invalidate().await;
            }

            return Err(TransportError::Http {
                status: status.as_u16(),
                headers,
                body,
            });
        }

        let body = response.text().await?;
        EventsPage::from_body(&body)
    }
}

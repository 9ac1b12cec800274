//! Google Calendar API v3: recent events on the primary calendar.

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{ensure_success, TokenProvider};

/// Read-only projection of a calendar entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub title: String,
    pub start: Option<DateTime<FixedOffset>>,
    pub end: Option<DateTime<FixedOffset>>,
    pub attendees: Vec<String>,
    pub description: String,
}

#[async_trait::async_trait]
pub trait CalendarService: Send + Sync {
    /// Single-occurrence events between `since` and `until`, ordered by start time.
    async fn list_events(&self, since: DateTime<Utc>, until: DateTime<Utc>) -> Result<Vec<Event>>;
}

// ============================================================================
// API response types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventListResponse {
    #[serde(default)]
    items: Vec<EventRaw>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventRaw {
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    start: Option<EventDateTime>,
    #[serde(default)]
    end: Option<EventDateTime>,
    #[serde(default)]
    attendees: Vec<Attendee>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventDateTime {
    #[serde(default)]
    date_time: Option<String>,
    /// All-day events carry only a date
    #[serde(default)]
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Attendee {
    #[serde(default)]
    email: String,
}

impl EventDateTime {
    fn parse(&self) -> Option<DateTime<FixedOffset>> {
        if let Some(dt) = self.date_time.as_deref() {
            return DateTime::parse_from_rfc3339(dt).ok();
        }
        let date = NaiveDate::parse_from_str(self.date.as_deref()?, "%Y-%m-%d").ok()?;
        Some(date.and_hms_opt(0, 0, 0)?.and_utc().fixed_offset())
    }
}

impl From<EventRaw> for Event {
    fn from(item: EventRaw) -> Self {
        let title = item.summary.unwrap_or_default();
        let attendees: Vec<String> = item
            .attendees
            .into_iter()
            .map(|a| a.email)
            .filter(|e| !e.is_empty())
            .collect();
        for attendee in &attendees {
            debug!("event '{}' includes attendee: {}", title, attendee);
        }

        Event {
            start: item.start.as_ref().and_then(EventDateTime::parse),
            end: item.end.as_ref().and_then(EventDateTime::parse),
            title,
            attendees,
            description: item.description.unwrap_or_default(),
        }
    }
}

// ============================================================================
// Client
// ============================================================================

/// Upper bound on result pages fetched by a single `list_events` call.
const MAX_PAGES: usize = 50;

pub struct CalendarClient {
    base_url: String,
    http: reqwest::Client,
    auth: Arc<dyn TokenProvider>,
}

impl CalendarClient {
    /// `base_url` is the API root, e.g. `https://www.googleapis.com/calendar/v3`.
    pub fn new(base_url: impl Into<String>, http: reqwest::Client, auth: Arc<dyn TokenProvider>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            auth,
        }
    }
}

#[async_trait::async_trait]
impl CalendarService for CalendarClient {
    async fn list_events(&self, since: DateTime<Utc>, until: DateTime<Utc>) -> Result<Vec<Event>> {
        let token = self.auth.token().await?.access_token;
        let time_min = since.to_rfc3339_opts(SecondsFormat::Secs, true);
        let time_max = until.to_rfc3339_opts(SecondsFormat::Secs, true);

        let mut events = Vec::new();
        let mut page_token: Option<String> = None;
        let mut seen_tokens = HashSet::new();

        for page in 1..=MAX_PAGES {
            let mut request = self
                .http
                .get(format!("{}/calendars/primary/events", self.base_url))
                .bearer_auth(&token)
                .query(&[
                    ("timeMin", time_min.as_str()),
                    ("timeMax", time_max.as_str()),
                    ("singleEvents", "true"),
                    ("orderBy", "startTime"),
                ]);
            if let Some(ref page) = page_token {
                request = request.query(&[("pageToken", page.as_str())]);
            }

            let response = request
                .send()
                .await
                .context("failed to retrieve events")?;
            let response = ensure_success(response, "Calendar list events").await?;
            let body: EventListResponse = response
                .json()
                .await
                .context("failed to parse calendar events")?;

            events.extend(body.items.into_iter().map(Event::from));

            match body.next_page_token {
                None => break,
                Some(next) if !seen_tokens.insert(next.clone()) => {
                    warn!(token = %next, "calendar returned a repeated page token, stopping");
                    break;
                }
                Some(_) if page == MAX_PAGES => {
                    warn!("calendar listing stopped after {} pages", MAX_PAGES);
                }
                next => page_token = next,
            }
        }

        info!(
            "found {} calendar events since {}",
            events.len(),
            since.format("%Y-%m-%d")
        );
        Ok(events)
    }
}

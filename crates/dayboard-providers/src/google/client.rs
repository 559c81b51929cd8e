//! Google Calendar API client.
//!
//! Low-level HTTP access to the calendar list and events endpoints. Request
//! building and status mapping live here; pagination of the calendar list is
//! left to the lister, event pages are followed internally.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use dayboard_core::{CalendarEntry, DayWindow, EventRecord, EventTime};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{ProviderError, ProviderResult};
use crate::provider::{BoxFuture, CalendarApi, CalendarPage};
use crate::session::AuthorizedSession;

use super::config::GoogleConfig;

/// Page size requested from the events endpoint.
const EVENTS_PAGE_SIZE: u32 = 250;

/// Google Calendar API client.
#[derive(Debug, Clone)]
pub struct GoogleCalendarClient {
    http_client: reqwest::Client,
    api_base: String,
}

impl GoogleCalendarClient {
    /// Creates a client from the provider configuration.
    pub fn new(config: &GoogleConfig) -> ProviderResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| ProviderError::internal("failed to create HTTP client").with_source(e))?;

        Ok(Self {
            http_client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    /// Fetches one page of the calendar list, hidden calendars included.
    pub async fn calendar_list_page(
        &self,
        session: &AuthorizedSession,
        page_token: Option<&str>,
    ) -> ProviderResult<CalendarPage> {
        let url = format!("{}/users/me/calendarList", self.api_base);

        let mut request = self
            .http_client
            .get(&url)
            .bearer_auth(&session.access_token)
            .query(&[("showHidden", "true")]);

        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }

        let list: CalendarListResponse = send_json(request).await?;
        let items = list.items.into_iter().map(CalendarListEntry::into_entry).collect();
        Ok(CalendarPage::new(items, list.next_page_token))
    }

    /// Lists every event instance of a calendar within the window.
    pub async fn events(
        &self,
        session: &AuthorizedSession,
        calendar_id: &str,
        window: &DayWindow,
    ) -> ProviderResult<Vec<EventRecord>> {
        let mut all_events = Vec::new();
        let mut page_token: Option<String> = None;
        let mut seen_tokens = HashSet::new();

        loop {
            let page = self
                .events_page(session, calendar_id, window, page_token.as_deref())
                .await?;

            all_events.extend(
                page.items
                    .into_iter()
                    .filter_map(|event| convert_event(event, calendar_id)),
            );

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) if !seen_tokens.insert(next.clone()) => {
                    warn!("events of {} repeated page token, stopping", calendar_id);
                    break;
                }
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        debug!("fetched {} events from calendar {}", all_events.len(), calendar_id);
        Ok(all_events)
    }

    async fn events_page(
        &self,
        session: &AuthorizedSession,
        calendar_id: &str,
        window: &DayWindow,
        page_token: Option<&str>,
    ) -> ProviderResult<EventListResponse> {
        let url = format!(
            "{}/calendars/{}/events",
            self.api_base,
            urlencoding::encode(calendar_id)
        );

        let mut request = self
            .http_client
            .get(&url)
            .bearer_auth(&session.access_token)
            .query(&[
                ("timeMin", window.start.to_rfc3339()),
                ("timeMax", window.end.to_rfc3339()),
                ("showDeleted", "false".to_string()),
                ("singleEvents", "true".to_string()),
                ("orderBy", "startTime".to_string()),
                ("maxResults", EVENTS_PAGE_SIZE.to_string()),
            ]);

        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }

        send_json(request).await
    }
}

impl CalendarApi for GoogleCalendarClient {
    fn list_calendars_page<'a>(
        &'a self,
        session: &'a AuthorizedSession,
        page_token: Option<&'a str>,
    ) -> BoxFuture<'a, ProviderResult<CalendarPage>> {
        Box::pin(self.calendar_list_page(session, page_token))
    }

    fn list_events<'a>(
        &'a self,
        session: &'a AuthorizedSession,
        calendar_id: &'a str,
        window: &'a DayWindow,
    ) -> BoxFuture<'a, ProviderResult<Vec<EventRecord>>> {
        Box::pin(self.events(session, calendar_id, window))
    }
}

/// Sends a request and decodes a successful JSON body.
pub(crate) async fn send_json<T>(request: reqwest::RequestBuilder) -> ProviderResult<T>
where
    T: serde::de::DeserializeOwned,
{
    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            ProviderError::network("request timeout").with_source(e)
        } else if e.is_connect() {
            ProviderError::network("connection failed").with_source(e)
        } else {
            ProviderError::network("request failed").with_source(e)
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::from_status(status.as_u16(), &body, retry_after)
            .with_provider("google"));
    }

    let body = response
        .text()
        .await
        .map_err(|e| ProviderError::network("failed to read response").with_source(e))?;

    serde_json::from_str(&body)
        .map_err(|e| ProviderError::invalid_response("failed to parse response").with_source(e))
}

/// Converts an API event, dropping cancelled or malformed ones.
fn convert_event(event: ApiEvent, calendar_id: &str) -> Option<EventRecord> {
    if event.status.as_deref() == Some("cancelled") {
        return None;
    }

    let id = event.id?;
    let start = parse_event_time(&event.start)
        .or_else(|| {
            warn!("event {} has no valid start time", id);
            None
        })?;
    let end = parse_event_time(&event.end)
        .or_else(|| {
            warn!("event {} has no valid end time", id);
            None
        })?;

    let mut record = EventRecord::new(
        id,
        calendar_id,
        event.summary.unwrap_or_default(),
        start,
        end,
    );
    record.status = event.status;
    record.location = event.location;
    record.html_link = event.html_link;
    Some(record)
}

fn parse_event_time(time: &ApiEventTime) -> Option<EventTime> {
    match (&time.date_time, &time.date) {
        (Some(dt), _) => DateTime::parse_from_rfc3339(dt)
            .map_err(|e| warn!("failed to parse event time {:?}: {}", dt, e))
            .ok()
            .map(|parsed| EventTime::DateTime(parsed.with_timezone(&Utc))),
        (None, Some(date)) => NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map_err(|e| warn!("failed to parse event date {:?}: {}", date, e))
            .ok()
            .map(EventTime::AllDay),
        (None, None) => None,
    }
}

/// Response from the events.list endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventListResponse {
    #[serde(default)]
    items: Vec<ApiEvent>,
    next_page_token: Option<String>,
}

/// A single event from the Google Calendar API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEvent {
    id: Option<String>,
    summary: Option<String>,
    location: Option<String>,
    #[serde(default)]
    start: ApiEventTime,
    #[serde(default)]
    end: ApiEventTime,
    html_link: Option<String>,
    status: Option<String>,
}

/// Event time from the API.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEventTime {
    date: Option<String>,
    date_time: Option<String>,
}

/// Response from the calendarList endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalendarListResponse {
    #[serde(default)]
    items: Vec<CalendarListEntry>,
    next_page_token: Option<String>,
}

/// A calendar from the calendar list.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalendarListEntry {
    id: String,
    #[serde(default)]
    summary: Option<String>,
    /// The name the user gave the calendar, if they renamed it.
    #[serde(default)]
    summary_override: Option<String>,
    #[serde(default)]
    hidden: bool,
    #[serde(default)]
    primary: bool,
    access_role: Option<String>,
    time_zone: Option<String>,
    background_color: Option<String>,
}

impl CalendarListEntry {
    fn into_entry(self) -> CalendarEntry {
        let name = self
            .summary_override
            .or(self.summary)
            .unwrap_or_else(|| self.id.clone());
        let mut entry = CalendarEntry::new(self.id, name)
            .with_hidden(self.hidden)
            .with_primary(self.primary);
        entry.access_role = self.access_role;
        entry.timezone = self.time_zone;
        entry.background_color = self.background_color;
        entry
    }
}

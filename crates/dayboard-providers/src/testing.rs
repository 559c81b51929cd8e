//! In-memory fakes for the provider traits, shared by unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{TimeZone, Utc};
use dayboard_core::{CalendarEntry, DayWindow, EventRecord, EventTime};

use crate::error::{ProviderError, ProviderErrorCode, ProviderResult};
use crate::provider::{
    Authorizer, BoxFuture, CalendarApi, CalendarPage, IdTokenClaims, IdentityApi, TokenStore,
    UserInfo,
};
use crate::session::AuthorizedSession;

/// A reply that can be replayed any number of times.
type Reply<T> = Result<T, (ProviderErrorCode, String)>;

fn keep<T>(result: ProviderResult<T>) -> Reply<T> {
    result.map_err(|e| (e.code(), e.message().to_string()))
}

fn replay<T: Clone>(reply: &Reply<T>) -> ProviderResult<T> {
    reply
        .clone()
        .map_err(|(code, message)| ProviderError::new(code, message))
}

pub fn session() -> AuthorizedSession {
    session_with_token("access-token")
}

pub fn session_with_token(token: &str) -> AuthorizedSession {
    AuthorizedSession::new(
        token,
        Some("refresh-token".to_string()),
        Some(3600),
        vec!["openid".to_string(), "email".to_string()],
    )
}

pub fn event(id: &str, calendar_id: &str, hour: u32) -> EventRecord {
    let start = Utc.with_ymd_and_hms(2025, 2, 5, hour, 0, 0).unwrap();
    EventRecord::new(
        id,
        calendar_id,
        format!("Event {id}"),
        EventTime::DateTime(start),
        EventTime::DateTime(start + chrono::Duration::minutes(30)),
    )
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

pub struct FakeIdentityApi {
    verify: Reply<Option<String>>,
    /// Replies in call order; the last one repeats.
    user_info: Vec<Reply<Option<String>>>,
    verify_calls: AtomicUsize,
    user_info_calls: AtomicUsize,
}

impl FakeIdentityApi {
    pub fn new(
        verify: ProviderResult<Option<&str>>,
        user_info: ProviderResult<Option<&str>>,
    ) -> Self {
        Self::scripted(verify, vec![user_info])
    }

    pub fn scripted(
        verify: ProviderResult<Option<&str>>,
        user_info: Vec<ProviderResult<Option<&str>>>,
    ) -> Self {
        assert!(!user_info.is_empty(), "at least one user info reply");
        Self {
            verify: keep(verify.map(|e| e.map(String::from))),
            user_info: user_info
                .into_iter()
                .map(|r| keep(r.map(|e| e.map(String::from))))
                .collect(),
            verify_calls: AtomicUsize::new(0),
            user_info_calls: AtomicUsize::new(0),
        }
    }

    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }

    pub fn user_info_calls(&self) -> usize {
        self.user_info_calls.load(Ordering::SeqCst)
    }
}

impl IdentityApi for FakeIdentityApi {
    fn verify_id_token<'a>(
        &'a self,
        _id_token: &'a str,
    ) -> BoxFuture<'a, ProviderResult<IdTokenClaims>> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        let result = replay(&self.verify).map(|email| IdTokenClaims {
            sub: Some("subject".to_string()),
            email,
        });
        Box::pin(async move { result })
    }

    fn user_info<'a>(&'a self, _access_token: &'a str) -> BoxFuture<'a, ProviderResult<UserInfo>> {
        let n = self.user_info_calls.fetch_add(1, Ordering::SeqCst);
        let reply = &self.user_info[n.min(self.user_info.len() - 1)];
        let result = replay(reply).map(|email| UserInfo { email, name: None });
        Box::pin(async move { result })
    }
}

// ---------------------------------------------------------------------------
// Token store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeStore {
    cached: Mutex<Option<AuthorizedSession>>,
    pub saves: AtomicUsize,
    pub clears: AtomicUsize,
    pub deletes: AtomicUsize,
}

impl FakeStore {
    pub fn with_session(session: AuthorizedSession) -> Self {
        let store = Self::default();
        *store.cached.lock().unwrap() = Some(session);
        store
    }

    pub fn cached(&self) -> Option<AuthorizedSession> {
        self.cached.lock().unwrap().clone()
    }

    /// Number of completed resets (a reset always ends with a delete).
    pub fn resets(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }
}

impl TokenStore for FakeStore {
    fn describe(&self) -> String {
        "fake store".to_string()
    }

    fn load(&self) -> ProviderResult<Option<AuthorizedSession>> {
        Ok(self.cached())
    }

    fn save(&self, session: &AuthorizedSession) -> ProviderResult<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        *self.cached.lock().unwrap() = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> ProviderResult<()> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        *self.cached.lock().unwrap() = None;
        Ok(())
    }

    fn delete(&self) -> ProviderResult<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Authorizer
// ---------------------------------------------------------------------------

/// Replays scripted authorization results; the last one repeats.
pub struct FakeAuthorizer {
    replies: Vec<Reply<AuthorizedSession>>,
    calls: AtomicUsize,
    cached_seen: Mutex<Vec<bool>>,
}

impl FakeAuthorizer {
    pub fn new(replies: Vec<ProviderResult<AuthorizedSession>>) -> Self {
        assert!(!replies.is_empty(), "at least one authorization reply");
        Self {
            replies: replies.into_iter().map(keep).collect(),
            calls: AtomicUsize::new(0),
            cached_seen: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Whether the store held a session when each call started.
    pub fn cached_before_each_call(&self) -> Vec<bool> {
        self.cached_seen.lock().unwrap().clone()
    }
}

impl Authorizer for FakeAuthorizer {
    fn authorize<'a>(
        &'a self,
        store: &'a dyn TokenStore,
    ) -> BoxFuture<'a, ProviderResult<AuthorizedSession>> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let cached = matches!(store.load(), Ok(Some(_)));
        self.cached_seen.lock().unwrap().push(cached);
        let result = replay(&self.replies[n.min(self.replies.len() - 1)]);
        Box::pin(async move {
            let session = result?;
            store.save(&session)?;
            Ok(session)
        })
    }
}

// ---------------------------------------------------------------------------
// Calendar API
// ---------------------------------------------------------------------------

/// Serves calendar pages linked as `""` -> `"page-1"` -> `"page-2"` ...
#[derive(Default)]
pub struct FakeCalendarApi {
    pages: Vec<CalendarPage>,
    events: HashMap<String, Reply<Vec<EventRecord>>>,
    delays: HashMap<String, Duration>,
    page_error_at: Option<usize>,
    pub page_calls: AtomicUsize,
    pub event_calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub windows: Mutex<Vec<DayWindow>>,
}

impl FakeCalendarApi {
    /// Builds pages with the given sizes; calendar ids are `cal-N`.
    pub fn with_page_sizes(sizes: &[usize]) -> Self {
        let mut next_id = 1;
        let count = sizes.len();
        let pages = sizes
            .iter()
            .enumerate()
            .map(|(i, size)| {
                let items = (0..*size)
                    .map(|_| {
                        let id = format!("cal-{next_id}");
                        next_id += 1;
                        CalendarEntry::new(&id, format!("Calendar {id}"))
                    })
                    .collect();
                let token = (i + 1 < count).then(|| format!("page-{}", i + 1));
                CalendarPage::new(items, token)
            })
            .collect();
        Self {
            pages,
            ..Self::default()
        }
    }

    pub fn with_raw_pages(pages: Vec<CalendarPage>) -> Self {
        Self {
            pages,
            ..Self::default()
        }
    }

    pub fn with_events(mut self, calendar_id: &str, events: ProviderResult<Vec<EventRecord>>) -> Self {
        self.events.insert(calendar_id.to_string(), keep(events));
        self
    }

    pub fn with_delay(mut self, calendar_id: &str, delay: Duration) -> Self {
        self.delays.insert(calendar_id.to_string(), delay);
        self
    }

    pub fn failing_page(mut self, index: usize) -> Self {
        self.page_error_at = Some(index);
        self
    }
}

impl CalendarApi for FakeCalendarApi {
    fn list_calendars_page<'a>(
        &'a self,
        _session: &'a AuthorizedSession,
        page_token: Option<&'a str>,
    ) -> BoxFuture<'a, ProviderResult<CalendarPage>> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);
        let index = match page_token {
            None => 0,
            Some(token) => token
                .strip_prefix("page-")
                .and_then(|n| n.parse::<usize>().ok())
                .unwrap_or(usize::MAX),
        };
        let result = if self.page_error_at == Some(index) {
            Err(ProviderError::server("calendar list unavailable"))
        } else {
            self.pages
                .get(index)
                .cloned()
                .ok_or_else(|| ProviderError::bad_request("unknown page token"))
        };
        Box::pin(async move { result })
    }

    fn list_events<'a>(
        &'a self,
        _session: &'a AuthorizedSession,
        calendar_id: &'a str,
        window: &'a DayWindow,
    ) -> BoxFuture<'a, ProviderResult<Vec<EventRecord>>> {
        self.event_calls.fetch_add(1, Ordering::SeqCst);
        self.windows.lock().unwrap().push(window.clone());
        Box::pin(async move {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if let Some(delay) = self.delays.get(calendar_id) {
                tokio::time::sleep(*delay).await;
            }
            let result = match self.events.get(calendar_id) {
                Some(reply) => replay(reply),
                None => Ok(Vec::new()),
            };

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        })
    }
}

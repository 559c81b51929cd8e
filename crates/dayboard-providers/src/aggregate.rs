//! Per-day event aggregation across every accessible calendar.
//!
//! Each calendar is fetched independently. A calendar whose fetch fails
//! (network, permission, parse or cancellation) still appears in the result
//! with no events, so the output always has exactly one entry per calendar
//! returned by the lister, in enumeration order.

use std::sync::Arc;

use chrono::{NaiveDate, TimeZone};
use dayboard_core::{Agenda, CalendarEntry, CalendarEvents, DayWindow};
use futures_util::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::lister::CalendarLister;
use crate::provider::{CalendarApi, cancellable};
use crate::session::AuthorizedSession;

/// Default number of calendars fetched at the same time.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Fetches one day of events from every calendar.
pub struct EventAggregator {
    lister: CalendarLister,
    api: Arc<dyn CalendarApi>,
    concurrency: usize,
}

impl EventAggregator {
    /// Creates an aggregator with the default fan-out.
    pub fn new(lister: CalendarLister, api: Arc<dyn CalendarApi>) -> Self {
        Self {
            lister,
            api,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Builder method to set how many calendars are fetched concurrently.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Returns the configured fan-out.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Returns the lister used to enumerate calendars.
    pub fn lister(&self) -> &CalendarLister {
        &self.lister
    }

    /// Aggregates today's events in the system's local timezone.
    pub async fn todays_events(
        &self,
        session: Option<&AuthorizedSession>,
        cancel: &CancellationToken,
    ) -> Agenda {
        match DayWindow::today() {
            Some(window) => self.events_in(session, window, cancel).await,
            None => {
                warn!("today has no representable day window");
                Agenda::empty()
            }
        }
    }

    /// Aggregates the events of `date` as observed in `tz`.
    pub async fn events_on<Tz: TimeZone>(
        &self,
        session: Option<&AuthorizedSession>,
        date: NaiveDate,
        tz: &Tz,
        cancel: &CancellationToken,
    ) -> Agenda {
        match DayWindow::for_date(date, tz) {
            Some(window) => self.events_in(session, window, cancel).await,
            None => {
                warn!("{} has no representable day window", date);
                Agenda::empty()
            }
        }
    }

    /// Aggregates the events inside `window`.
    pub async fn events_in(
        &self,
        session: Option<&AuthorizedSession>,
        window: DayWindow,
        cancel: &CancellationToken,
    ) -> Agenda {
        let Some(session) = session else {
            debug!("no session, returning empty agenda");
            return Agenda::empty();
        };

        let calendars = self.lister.list_all(Some(session), cancel).await;
        debug!(
            calendars = calendars.len(),
            concurrency = self.concurrency,
            "fetching events for {} to {}",
            window.start,
            window.end
        );

        let entries: Vec<CalendarEvents> = stream::iter(calendars)
            .map(|calendar| self.fetch_calendar(session, calendar, &window, cancel))
            .buffered(self.concurrency)
            .collect()
            .await;

        Agenda {
            window: Some(window),
            calendars: entries,
        }
    }

    async fn fetch_calendar(
        &self,
        session: &AuthorizedSession,
        calendar: CalendarEntry,
        window: &DayWindow,
        cancel: &CancellationToken,
    ) -> CalendarEvents {
        let result = cancellable(
            cancel,
            "event fetch",
            self.api.list_events(session, &calendar.id, window),
        )
        .await;

        let events = match result {
            Ok(events) => {
                debug!(calendar = %calendar.id, count = events.len(), "fetched events");
                events
            }
            Err(e) => {
                warn!(calendar = %calendar.id, "failed to fetch events: {}", e);
                Vec::new()
            }
        };

        CalendarEvents { calendar, events }
    }
}

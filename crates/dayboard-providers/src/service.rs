//! The facade handed to the display layer.
//!
//! An [`AgendaService`] owns the outcome of one credential acquisition. When
//! no session could be obtained, or no backend was configured at all, every
//! listing is empty; callers never see a provider error.

use chrono::{NaiveDate, TimeZone};
use dayboard_core::{Agenda, CalendarEntry, DayWindow};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::acquire::{Authorization, CredentialAcquirer};
use crate::aggregate::EventAggregator;
use crate::session::AuthorizedSession;

/// Calendar access for one signed-in user.
pub struct AgendaService {
    authorization: Option<Authorization>,
    aggregator: Option<EventAggregator>,
}

impl AgendaService {
    /// Creates a service from an acquisition outcome.
    pub fn new(authorization: Option<Authorization>, aggregator: EventAggregator) -> Self {
        Self {
            authorization,
            aggregator: Some(aggregator),
        }
    }

    /// Creates a service with no backend; every query is empty.
    pub fn unavailable() -> Self {
        Self {
            authorization: None,
            aggregator: None,
        }
    }

    /// Runs the acquirer and wraps its outcome.
    pub async fn acquire(
        acquirer: &CredentialAcquirer,
        aggregator: EventAggregator,
        cancel: &CancellationToken,
    ) -> Self {
        let authorization = acquirer.acquire(cancel).await;
        Self::new(authorization, aggregator)
    }

    /// Returns true if a session was obtained.
    pub fn is_authorized(&self) -> bool {
        self.session().is_some()
    }

    /// Returns the authorized session, if any.
    pub fn session(&self) -> Option<&AuthorizedSession> {
        self.authorization.as_ref().map(|a| &a.session)
    }

    /// Returns the signed-in user's email, if it could be resolved.
    pub fn user_email(&self) -> Option<&str> {
        self.authorization.as_ref().and_then(|a| a.email.as_deref())
    }

    /// Lists every accessible calendar, hidden ones included.
    pub async fn accessible_calendars(&self, cancel: &CancellationToken) -> Vec<CalendarEntry> {
        match &self.aggregator {
            Some(aggregator) => aggregator.lister().list_all(self.session(), cancel).await,
            None => Vec::new(),
        }
    }

    /// Aggregates today's events in the local timezone.
    pub async fn todays_events(&self, cancel: &CancellationToken) -> Agenda {
        self.events_in(DayWindow::today(), cancel).await
    }

    /// Aggregates the events of `date` as observed in `tz`.
    pub async fn events_on<Tz: TimeZone>(
        &self,
        date: NaiveDate,
        tz: &Tz,
        cancel: &CancellationToken,
    ) -> Agenda {
        self.events_in(DayWindow::for_date(date, tz), cancel).await
    }

    async fn events_in(&self, window: Option<DayWindow>, cancel: &CancellationToken) -> Agenda {
        let Some(aggregator) = &self.aggregator else {
            debug!("no calendar backend configured");
            return Agenda::empty();
        };
        let Some(window) = window else {
            warn!("requested day has no representable window");
            return Agenda::empty();
        };
        aggregator.events_in(self.session(), window, cancel).await
    }
}

//! Calendar and event types shared between the engine and the display layer.
//!
//! - [`CalendarEntry`]: a calendar visible to the signed-in user
//! - [`EventRecord`]: a single concrete event instance
//! - [`CalendarEvents`]: one calendar paired with its events
//! - [`Agenda`]: the ordered result of aggregating a day across calendars

use serde::{Deserialize, Serialize};

use crate::time::{DayWindow, EventTime};

/// A calendar from the user's calendar list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEntry {
    /// Provider-assigned calendar identifier.
    pub id: String,
    /// Display name of the calendar.
    pub name: String,
    /// Whether the user has hidden this calendar from their list.
    pub hidden: bool,
    /// Whether this is the user's primary calendar.
    pub primary: bool,
    /// The user's access role on this calendar (e.g. `owner`, `reader`).
    pub access_role: Option<String>,
    /// The calendar's IANA timezone, if reported.
    pub timezone: Option<String>,
    /// Background color for UI display.
    pub background_color: Option<String>,
}

impl CalendarEntry {
    /// Creates a visible, non-primary calendar entry.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            hidden: false,
            primary: false,
            access_role: None,
            timezone: None,
            background_color: None,
        }
    }

    /// Builder method to set the hidden flag.
    pub fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    /// Builder method to mark as primary.
    pub fn with_primary(mut self, primary: bool) -> Self {
        self.primary = primary;
        self
    }
}

/// A single event instance.
///
/// Recurring events are expanded server-side, so each record is one concrete
/// occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Provider-assigned event identifier.
    pub id: String,
    /// ID of the calendar this event was fetched from.
    pub calendar_id: String,
    /// Event title; empty when the event has none or it is private.
    pub title: String,
    /// Start of the event.
    pub start: EventTime,
    /// End of the event.
    pub end: EventTime,
    /// Event status as reported by the provider (`confirmed`, `tentative`).
    pub status: Option<String>,
    /// Free-form location.
    pub location: Option<String>,
    /// Link to the event in the provider's web UI.
    pub html_link: Option<String>,
}

impl EventRecord {
    /// Creates a new event record.
    pub fn new(
        id: impl Into<String>,
        calendar_id: impl Into<String>,
        title: impl Into<String>,
        start: EventTime,
        end: EventTime,
    ) -> Self {
        Self {
            id: id.into(),
            calendar_id: calendar_id.into(),
            title: title.into(),
            start,
            end,
            status: None,
            location: None,
            html_link: None,
        }
    }

    /// Returns true if this is an all-day event.
    pub fn is_all_day(&self) -> bool {
        self.start.is_all_day()
    }
}

/// One calendar paired with the events fetched from it.
///
/// A calendar whose fetch failed is still present with no events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvents {
    pub calendar: CalendarEntry,
    pub events: Vec<EventRecord>,
}

/// The aggregated events of one day across every accessible calendar.
///
/// Entries follow the order in which calendars were enumerated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agenda {
    /// The day that was queried, absent when nothing was queried.
    pub window: Option<DayWindow>,
    /// One entry per enumerated calendar.
    pub calendars: Vec<CalendarEvents>,
}

impl Agenda {
    /// Creates an empty agenda, the uniform "nothing to show" value.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns true if no calendars were enumerated.
    pub fn is_empty(&self) -> bool {
        self.calendars.is_empty()
    }

    /// Returns the number of calendars in the agenda.
    pub fn len(&self) -> usize {
        self.calendars.len()
    }

    /// Returns the total number of events across all calendars.
    pub fn event_count(&self) -> usize {
        self.calendars.iter().map(|c| c.events.len()).sum()
    }

    /// Returns every event across all calendars, ordered by start time.
    pub fn merged_events(&self) -> Vec<&EventRecord> {
        let mut events: Vec<&EventRecord> = self
            .calendars
            .iter()
            .flat_map(|c| c.events.iter())
            .collect();
        events.sort_by(|a, b| a.start.cmp(&b.start));
        events
    }
}

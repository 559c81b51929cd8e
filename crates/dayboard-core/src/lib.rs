//! Core types: day windows, calendars, events, tracing

pub mod agenda;
pub mod time;
pub mod tracing;

pub use agenda::{Agenda, CalendarEntry, CalendarEvents, EventRecord};
pub use time::{DayWindow, EventTime};
pub use self::tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};

//! Output rendering.
//!
//! Every renderer returns a `String` so commands stay free of formatting
//! and the output can be tested without capturing stdout.

use std::fmt::Write as _;

use chrono::TimeZone;
use dayboard_core::{Agenda, CalendarEntry, EventRecord};
use serde::Serialize;

use crate::config::DisplaySettings;
use crate::error::ClientResult;

/// Placeholder printed when the signed-in account could not be identified.
pub const UNKNOWN_USER: &str = "unknown";

/// Serializes any output value as pretty JSON.
pub fn json<T: Serialize + ?Sized>(value: &T) -> ClientResult<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Renders an agenda grouped by calendar, times shown in `tz`.
pub fn agenda<Tz>(agenda: &Agenda, tz: &Tz, display: &DisplaySettings) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let mut out = String::new();

    if let Some(window) = &agenda.window {
        let _ = writeln!(out, "{}", window.date.format("%A %-d %B %Y"));
    }

    let mut shown = 0;
    for entry in &agenda.calendars {
        if entry.events.is_empty() && !display.show_empty_calendars {
            continue;
        }
        shown += 1;

        let _ = writeln!(out);
        let _ = writeln!(out, "{}", calendar_heading(&entry.calendar));
        if entry.events.is_empty() {
            let _ = writeln!(out, "  {}", display.no_events_text);
        }
        for event in &entry.events {
            let _ = writeln!(out, "  {:<13} {}", event_span(event, tz), event_title(event));
        }
    }

    if shown == 0 {
        if agenda.window.is_some() {
            out.push('\n');
        }
        out.push_str(&display.no_events_text);
        out.push('\n');
    }

    out
}

/// Renders the calendar list, one calendar per line.
pub fn calendars(calendars: &[CalendarEntry]) -> String {
    if calendars.is_empty() {
        return "No calendars\n".to_string();
    }

    let mut out = String::new();
    for calendar in calendars {
        let mut flags = Vec::new();
        if calendar.primary {
            flags.push("primary");
        }
        if calendar.hidden {
            flags.push("hidden");
        }
        if let Some(role) = &calendar.access_role {
            flags.push(role.as_str());
        }

        let _ = write!(out, "{}  {}", calendar.name, calendar.id);
        if !flags.is_empty() {
            let _ = write!(out, "  [{}]", flags.join(", "));
        }
        out.push('\n');
    }
    out
}

/// Renders the signed-in account.
pub fn whoami(email: Option<&str>) -> String {
    format!("{}\n", email.unwrap_or(UNKNOWN_USER))
}

/// Renders a weather forecast.
pub fn weather(forecast: &dayboard_providers::weather::WeatherForecast) -> String {
    let mut out = String::new();

    if let Some(tz) = &forecast.timezone {
        let _ = writeln!(out, "Timezone: {}", tz);
    }

    if let Some(current) = &forecast.current {
        let _ = writeln!(
            out,
            "Now: {}, wind {}, precipitation {}",
            measure(current.temperature, "°C"),
            measure(current.wind_speed, " km/h"),
            measure(current.precipitation, " mm"),
        );
    }

    for day in &forecast.daily {
        let _ = write!(out, "{}  {}", day.date.format("%a %Y-%m-%d"), day.description());
        if let Some(sum) = day.precipitation_sum.filter(|v| *v > 0.0) {
            let _ = write!(out, ", {:.1} mm", sum);
        }
        if let Some(snow) = day.snowfall_sum.filter(|v| *v > 0.0) {
            let _ = write!(out, ", {:.1} cm snow", snow);
        }
        out.push('\n');
    }

    if out.is_empty() {
        out.push_str("No forecast data\n");
    }
    out
}

fn measure(value: Option<f64>, unit: &str) -> String {
    match value {
        Some(v) => format!("{:.1}{}", v, unit),
        None => "n/a".to_string(),
    }
}

fn calendar_heading(calendar: &CalendarEntry) -> String {
    if calendar.hidden {
        format!("{} (hidden)", calendar.name)
    } else {
        calendar.name.clone()
    }
}

fn event_span<Tz>(event: &EventRecord, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    if event.is_all_day() {
        return event.start.display_in(tz);
    }
    format!("{}-{}", event.start.display_in(tz), event.end.display_in(tz))
}

fn event_title(event: &EventRecord) -> &str {
    if event.title.is_empty() {
        "(no title)"
    } else {
        &event.title
    }
}

//! Date and time helpers.
//!
//! The engine never reads the wall clock. "Now" always comes from the
//! environment's [`Clock`](boxoffice_core::environment::Clock), and every
//! helper here takes it as a parameter. Calendar inputs are interpreted in UTC.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::error::TicketingError;

/// Display format for instants (`2025-03-14 19:30`)
pub const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Parse a `YYYY-MM-DD` calendar date (leap years honored).
///
/// # Errors
///
/// Returns [`TicketingError::InvalidInput`] for anything else.
pub fn parse_date(input: &str) -> Result<NaiveDate, TicketingError> {
    let input = input.trim();
    if input.len() != 10 {
        return Err(TicketingError::InvalidInput(format!(
            "invalid date {input:?}, expected YYYY-MM-DD"
        )));
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d").map_err(|_| {
        TicketingError::InvalidInput(format!("invalid date {input:?}, expected YYYY-MM-DD"))
    })
}

/// Parse a 24-hour `HH:MM` time and place it on `date`.
///
/// # Errors
///
/// Returns [`TicketingError::InvalidInput`] if the time is malformed.
pub fn parse_time_on(date: NaiveDate, input: &str) -> Result<DateTime<Utc>, TicketingError> {
    let input = input.trim();
    let invalid = || TicketingError::InvalidInput(format!("invalid time {input:?}, expected HH:MM"));
    if input.len() != 5 {
        return Err(invalid());
    }
    let time = NaiveTime::parse_from_str(input, "%H:%M").map_err(|_| invalid())?;
    Ok(Utc.from_utc_datetime(&date.and_time(time)))
}

/// Midnight at the start of `date`.
#[must_use]
pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

/// Format an instant for display.
#[must_use]
pub fn format_instant(instant: DateTime<Utc>) -> String {
    instant.format(DISPLAY_FORMAT).to_string()
}

/// Parse an instant in [`DISPLAY_FORMAT`] or RFC 3339.
///
/// # Errors
///
/// Returns [`TicketingError::InvalidInput`] if neither format matches.
pub fn parse_instant(input: &str) -> Result<DateTime<Utc>, TicketingError> {
    let input = input.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(input) {
        return Ok(instant.with_timezone(&Utc));
    }
    chrono::NaiveDateTime::parse_from_str(input, DISPLAY_FORMAT)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|_| {
            TicketingError::InvalidInput(format!(
                "invalid instant {input:?}, expected YYYY-MM-DD HH:MM"
            ))
        })
}

/// A closed time window `[start, end]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeWindow {
    /// First instant inside the window
    pub start: DateTime<Utc>,
    /// Last instant inside the window
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Build a window, requiring `start < end`.
    ///
    /// # Errors
    ///
    /// Returns [`TicketingError::InvalidInput`] if the window is empty or reversed.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, TicketingError> {
        if start < end {
            Ok(Self { start, end })
        } else {
            Err(TicketingError::InvalidInput(format!(
                "end time {} must be after start time {}",
                format_instant(end),
                format_instant(start)
            )))
        }
    }

    /// Check whether `instant` lies inside the closed window
    #[must_use]
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }

    /// Check whether `other` lies entirely inside this window
    #[must_use]
    pub fn encloses(&self, other: &Self) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Length of the window
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

//! Timezone handling utilities
//!
//! Provides functions for parsing and converting timezones safely.

use chrono::{DateTime, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::{BookingError, BookingResult};

/// Parse an IANA timezone string (e.g., "America/Sao_Paulo", "Europe/London")
///
/// # Examples
///
/// ```
/// use slotbook_core::timezone::parse_timezone;
///
/// let tz = parse_timezone("America/Sao_Paulo").unwrap();
/// assert_eq!(tz.name(), "America/Sao_Paulo");
/// ```
pub fn parse_timezone(tz_str: &str) -> BookingResult<Tz> {
    tz_str
        .parse::<Tz>()
        .map_err(|_| BookingError::InvalidTimezone(tz_str.to_string()))
}

/// Convert UTC time to a specific timezone
pub fn to_timezone<Tz2: TimeZone>(utc_time: &DateTime<Utc>, tz: &Tz2) -> DateTime<Tz2> {
    utc_time.with_timezone(tz)
}

/// Convert a timezone-aware time to UTC
pub fn to_utc<Tz2: TimeZone>(time: &DateTime<Tz2>) -> DateTime<Utc> {
    time.with_timezone(&Utc)
}

/// Current wall-clock time in the given zone
pub fn now_in(tz: Tz) -> DateTime<Tz> {
    Utc::now().with_timezone(&tz)
}

/// Resolve a local (date, time-of-day) pair to a zone-aware instant.
///
/// Returns `None` when the wall-clock time does not exist in the zone
/// (spring-forward gap). Ambiguous times (fall-back overlap) resolve to the
/// earlier instant, matching the pre-transition offset.
pub fn resolve_local(date: NaiveDate, time: NaiveTime, tz: Tz) -> Option<DateTime<Tz>> {
    match tz.from_local_datetime(&date.and_time(time)) {
        LocalResult::Single(dt) => Some(dt),
        LocalResult::Ambiguous(earlier, _later) => Some(earlier),
        LocalResult::None => None,
    }
}

//! Slot-grid arithmetic
//!
//! A slot is a fixed-size half-open interval `[t, t + slot_duration)` on the
//! provider's grid. Candidate generation works on the local wall clock and
//! resolves each candidate to a zone-aware instant afterwards, so a grid stays
//! aligned to work hours even on days with a DST transition.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::collections::BTreeSet;

use crate::timezone::{resolve_local, to_utc};

/// Weekday under the storage convention 0=Sunday .. 6=Saturday
pub fn weekday_index(date: NaiveDate) -> i16 {
    date.weekday().num_days_from_sunday() as i16
}

/// Whether a slot starting at `starts_local` fits inside a work-hour block.
///
/// The slot must start inside the block and end no later than the block end.
/// It does not have to be aligned to the block start.
pub fn within_block(
    starts_local: NaiveDateTime,
    start_time: NaiveTime,
    end_time: NaiveTime,
    slot: Duration,
) -> bool {
    let date = starts_local.date();
    let block_start = date.and_time(start_time);
    let block_end = date.and_time(end_time);
    starts_local >= block_start && starts_local < block_end && starts_local + slot <= block_end
}

/// Generate the candidate slot starts for a local date over a set of
/// work-hour blocks, stepping by `slot` from each block start.
///
/// Overlapping blocks are merged by de-duplicating on the exact local
/// instant. Wall-clock times swallowed by a spring-forward gap are dropped.
/// The result is sorted ascending by local time.
pub fn candidate_slots(
    date: NaiveDate,
    blocks: &[(NaiveTime, NaiveTime)],
    tz: Tz,
    slot: Duration,
) -> Vec<DateTime<Tz>> {
    let mut grid: BTreeSet<NaiveDateTime> = BTreeSet::new();

    for (start_time, end_time) in blocks {
        let block_end = date.and_time(*end_time);
        let mut cur = date.and_time(*start_time);
        while cur + slot <= block_end {
            grid.insert(cur);
            cur = cur + slot;
        }
    }

    grid.into_iter()
        .filter_map(|naive| resolve_local(naive.date(), naive.time(), tz))
        .collect()
}

/// UTC window that covers a local calendar day.
///
/// A local day maps to exactly 24 UTC hours only when the zone has no DST
/// transition that day, so the window is widened by two hours on each side.
/// Callers exclude taken slots by exact instant.
pub fn day_window_utc(date: NaiveDate, tz: Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    // Some zones (historically America/Sao_Paulo) transition at midnight, so
    // probe the first few hours for a wall-clock time that exists.
    let base = (0..3u32)
        .find_map(|h| {
            let t = NaiveTime::from_hms_opt(h, 0, 0)?;
            resolve_local(date, t, tz).map(|dt| to_utc(&dt) - Duration::hours(i64::from(h)))
        })
        .unwrap_or_else(|| Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)));

    (base - Duration::hours(2), base + Duration::hours(26))
}

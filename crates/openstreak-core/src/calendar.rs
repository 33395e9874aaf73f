//! Calendar arithmetic used by the streak engine.
//!
//! All functions operate on *local wall-clock* values ([`NaiveDateTime`] /
//! [`NaiveDate`]). Converting an instant to the reader-facing calendar is done
//! once, up front, by [`to_local`]; everything after that is pure.
//!
//! Day differences are deliberately *not* calendar-aware: [`days_between`]
//! divides the raw millisecond difference of two timestamps by one day and
//! truncates toward zero, so 23 hours spanning midnight counts as zero days.
//! Recorded streak histories depend on this exact rule.

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, Offset, Utc, Weekday,
};

/// Milliseconds in one day.
pub const MILLIS_PER_DAY: i64 = 86_400_000;

/// Whole days from `a` to `b`, computed from the full timestamps.
///
/// The millisecond difference is divided by [`MILLIS_PER_DAY`] and truncated
/// toward zero. The result is negative when `b` precedes `a` by at least a
/// full day.
#[must_use]
pub fn days_between(a: NaiveDateTime, b: NaiveDateTime) -> i64 {
    b.signed_duration_since(a).num_milliseconds() / MILLIS_PER_DAY
}

/// Day of week with Sunday = 0 through Saturday = 6.
#[must_use]
pub fn weekday_index<D: Datelike>(d: &D) -> u32 {
    d.weekday().num_days_from_sunday()
}

/// Returns true when `d` falls on a Sunday.
#[must_use]
pub fn is_sunday<D: Datelike>(d: &D) -> bool {
    d.weekday() == Weekday::Sun
}

/// Returns true when `d` falls on a Monday.
#[must_use]
pub fn is_monday<D: Datelike>(d: &D) -> bool {
    d.weekday() == Weekday::Mon
}

/// The calendar day that counts as "yesterday" for a streak.
///
/// This is `today - 1 day`, moved back one more day when that lands on a
/// Sunday. Sundays never qualify as the previous day, so a Saturday open
/// followed by a Monday open is still consecutive.
#[must_use]
pub fn previous_qualifying_day(today: NaiveDate) -> NaiveDate {
    let yesterday = today - Duration::days(1);
    if is_sunday(&yesterday) {
        yesterday - Duration::days(1)
    } else {
        yesterday
    }
}

/// Convert an instant to local wall-clock time at a fixed UTC offset.
#[must_use]
pub fn to_local(instant: DateTime<Utc>, offset: FixedOffset) -> NaiveDateTime {
    instant.with_timezone(&offset).naive_local()
}

/// Build a [`FixedOffset`] from minutes east of UTC.
///
/// Offsets outside ±23:59 fall back to UTC.
#[must_use]
pub fn offset_from_minutes(minutes: i32) -> FixedOffset {
    minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .unwrap_or_else(|| Utc.fix())
}

//! Streak update engine.
//!
//! [`apply_open`] is the whole state machine: given the ledger as it was
//! loaded (or `None` for a reader with no ledger yet) and the local
//! timestamp of a qualifying open, it returns the ledger to persist. It does
//! no I/O and is total over every valid timestamp.
//!
//! # Rules
//!
//! Let `today` be the calendar date of the open and `yesterday` be
//! [`previous_qualifying_day`] of it (Sundays are skipped).
//!
//! 1. No ledger: start one at `{current: 1, longest: 1, life: 1}`.
//! 2. Last open was `yesterday`: the streak continues (`current + 1`).
//! 3. Last open was neither `yesterday` nor `today`: measure the gap with
//!    [`days_between`] on the full timestamps. A gap larger than `life`
//!    resets the streak to 1 and empties `life`; otherwise the gap is paid
//!    out of `life` and the streak still grows by one.
//! 4. Last open was `today`: nothing changes.
//! 5. An open on a Monday whose previous open was a Sunday earns one `life`,
//!    on top of whichever branch above applied.
//!
//! `longest_streak` is raised whenever `current_streak` passes it and is
//! never lowered.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;

use crate::calendar::{days_between, is_monday, is_sunday, previous_qualifying_day};
use crate::ledger::StreakLedger;

/// Which branch of the update rule fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreakOutcome {
    /// First qualifying open for the reader; a new ledger was created.
    Started,
    /// The previous open was on the previous qualifying day.
    Continued,
    /// A gap was covered by the forgiveness budget.
    Forgiven,
    /// A gap exceeded the forgiveness budget and the streak restarted.
    Reset,
    /// Another open on a day that was already counted.
    SameDay,
}

impl StreakOutcome {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Continued => "continued",
            Self::Forgiven => "forgiven",
            Self::Reset => "reset",
            Self::SameDay => "same_day",
        }
    }
}

impl fmt::Display for StreakOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of applying one open to a ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// The ledger to persist.
    pub ledger: StreakLedger,
    /// Branch taken by the update rule.
    pub outcome: StreakOutcome,
    /// Gap in whole days, set for [`StreakOutcome::Forgiven`] and for
    /// [`StreakOutcome::Reset`] when a previous open was on record.
    pub gap_days: Option<i64>,
    /// Whether the Sunday-to-Monday bonus life was granted.
    pub weekend_bonus: bool,
}

/// Apply one qualifying open at local time `today` to `previous`.
#[must_use]
pub fn apply_open(previous: Option<&StreakLedger>, today: NaiveDateTime) -> Transition {
    let Some(previous) = previous else {
        return Transition {
            ledger: StreakLedger::started_at(today),
            outcome: StreakOutcome::Started,
            gap_days: None,
            weekend_bonus: false,
        };
    };

    let today_date = today.date();
    let yesterday = previous_qualifying_day(today_date);
    let last_opened = previous.last_opened_date;
    let mut ledger = *previous;

    let (outcome, gap_days) = match last_opened {
        Some(last) if last.date() == yesterday => {
            extend(&mut ledger);
            (StreakOutcome::Continued, None)
        }
        Some(last) if last.date() == today_date => (StreakOutcome::SameDay, None),
        Some(last) => {
            let gap = days_between(last, today);
            if gap > i64::from(ledger.life) {
                reset(&mut ledger);
                (StreakOutcome::Reset, Some(gap))
            } else {
                ledger.life = saturate_i32(i64::from(ledger.life) - gap);
                extend(&mut ledger);
                (StreakOutcome::Forgiven, Some(gap))
            }
        }
        // A ledger without a recorded open has no streak to protect.
        None => {
            reset(&mut ledger);
            (StreakOutcome::Reset, None)
        }
    };

    let weekend_bonus = is_monday(&today_date) && last_opened.is_some_and(|last| is_sunday(&last));
    if weekend_bonus {
        ledger.life = ledger.life.saturating_add(1);
    }

    ledger.last_opened_date = Some(today);

    Transition {
        ledger,
        outcome,
        gap_days,
        weekend_bonus,
    }
}

fn extend(ledger: &mut StreakLedger) {
    ledger.current_streak = ledger.current_streak.saturating_add(1);
    if ledger.current_streak > ledger.longest_streak {
        ledger.longest_streak = ledger.current_streak;
    }
}

fn reset(ledger: &mut StreakLedger) {
    ledger.life = 0;
    ledger.current_streak = 1;
    if ledger.longest_streak < 1 {
        ledger.longest_streak = 1;
    }
}

fn saturate_i32(value: i64) -> i32 {
    i32::try_from(value).unwrap_or(if value < 0 { i32::MIN } else { i32::MAX })
}

//! Per-reader streak ledger.
//!
//! The ledger is plain data. Every mutation goes through
//! [`crate::engine::apply_open`]; storage reads and writes it as a whole.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Forgiveness budget granted to a brand-new ledger.
pub const INITIAL_LIFE: i32 = 1;

/// Persisted streak state for one reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakLedger {
    /// Consecutive qualifying days, including the most recent one.
    pub current_streak: u32,
    /// Historical maximum of `current_streak`. Never decreases.
    pub longest_streak: u32,
    /// Local wall-clock time of the most recent qualifying open.
    ///
    /// The engine compares its calendar date, but the time-of-day is kept
    /// because gap lengths are measured between full timestamps.
    pub last_opened_date: Option<NaiveDateTime>,
    /// Remaining forgiveness budget for missed days.
    pub life: i32,
}

impl StreakLedger {
    /// Ledger for a reader's first qualifying open.
    #[must_use]
    pub const fn started_at(opened_at: NaiveDateTime) -> Self {
        Self {
            current_streak: 1,
            longest_streak: 1,
            last_opened_date: Some(opened_at),
            life: INITIAL_LIFE,
        }
    }

    /// Calendar date of the most recent qualifying open.
    #[must_use]
    pub fn last_opened_day(&self) -> Option<NaiveDate> {
        self.last_opened_date.map(|at| at.date())
    }
}

/// Read-side view of a reader's ledger, as returned to reporting callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerSnapshot {
    pub email: String,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_opened_date: Option<NaiveDate>,
    pub last_opened_at: Option<NaiveDateTime>,
    pub life: i32,
}

impl LedgerSnapshot {
    #[must_use]
    pub fn new(email: impl Into<String>, ledger: &StreakLedger) -> Self {
        Self {
            email: email.into(),
            current_streak: ledger.current_streak,
            longest_streak: ledger.longest_streak,
            last_opened_date: ledger.last_opened_day(),
            last_opened_at: ledger.last_opened_date,
            life: ledger.life,
        }
    }
}

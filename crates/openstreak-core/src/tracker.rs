//! Open-event processing: validate, deduplicate, update the ledger, persist.
//!
//! [`Tracker`] is the entry point the outer surfaces call. It owns the dedup
//! guard and the local calendar offset, and borrows a store connection per
//! call. Each novel event runs as one `BEGIN IMMEDIATE` transaction: reader
//! and newsletter rows, the ledger update, and the event row all commit
//! together or not at all.

use chrono::{FixedOffset, NaiveDateTime, Utc};
use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::calendar::to_local;
use crate::config::ProjectConfig;
use crate::db::store;
use crate::dedup::{DedupStore, InMemoryDedup};
use crate::engine::{StreakOutcome, apply_open};
use crate::error::TrackerError;
use crate::event::{Fingerprint, OpenEvent};
use crate::ledger::LedgerSnapshot;

/// What happened to one open event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProcessOutcome {
    /// The event was novel and the reader's ledger was updated.
    Processed {
        event_id: i64,
        outcome: StreakOutcome,
        gap_days: Option<i64>,
        weekend_bonus: bool,
        ledger: LedgerSnapshot,
    },
    /// The same event was already processed within the dedup window.
    DuplicateSuppressed { fingerprint: String },
    /// The event is older than the reader's last recorded open. Nothing was
    /// stored and the ledger is unchanged.
    OutOfOrder { last_opened_at: NaiveDateTime },
}

impl ProcessOutcome {
    #[must_use]
    pub const fn is_duplicate(&self) -> bool {
        matches!(self, Self::DuplicateSuppressed { .. })
    }

    /// Ledger after processing, when the event was not a duplicate.
    #[must_use]
    pub const fn ledger(&self) -> Option<&LedgerSnapshot> {
        match self {
            Self::Processed { ledger, .. } => Some(ledger),
            Self::DuplicateSuppressed { .. } | Self::OutOfOrder { .. } => None,
        }
    }
}

/// Streak tracker bound to one dedup guard and one local calendar.
pub struct Tracker {
    dedup: Box<dyn DedupStore>,
    offset: FixedOffset,
}

impl std::fmt::Debug for Tracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker")
            .field("offset", &self.offset)
            .finish_non_exhaustive()
    }
}

impl Tracker {
    #[must_use]
    pub fn new(offset: FixedOffset, dedup: Box<dyn DedupStore>) -> Self {
        Self { dedup, offset }
    }

    /// Tracker with the in-memory dedup guard, configured from the project.
    #[must_use]
    pub fn from_config(config: &ProjectConfig) -> Self {
        Self::new(
            config.tracking.offset(),
            Box::new(InMemoryDedup::new(config.dedup.window())),
        )
    }

    #[must_use]
    pub const fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Process one open event against the store.
    ///
    /// Returns [`ProcessOutcome::DuplicateSuppressed`] without touching the
    /// store when the same event was already accepted within the dedup
    /// window, and [`ProcessOutcome::OutOfOrder`] when the event's local time
    /// is earlier than the reader's last recorded open.
    ///
    /// # Errors
    ///
    /// - [`TrackerError::MissingField`] when `email` or the newsletter id is
    ///   blank. Nothing is recorded.
    /// - [`TrackerError::Storage`] when the transaction fails. Nothing is
    ///   persisted and the event's fingerprint is released, so retrying the
    ///   same event is not suppressed.
    pub fn process_open_event(
        &self,
        conn: &mut Connection,
        event: &OpenEvent,
    ) -> Result<ProcessOutcome, TrackerError> {
        event.validate()?;

        let fingerprint = event.fingerprint();
        if !self.dedup.check_and_record(&fingerprint) {
            debug!(
                reader = %event.email,
                newsletter = %event.newsletter_id,
                %fingerprint,
                "duplicate open suppressed"
            );
            return Ok(ProcessOutcome::DuplicateSuppressed {
                fingerprint: fingerprint.to_string(),
            });
        }

        match self.persist(conn, event, &fingerprint) {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                self.dedup.forget(&fingerprint);
                warn!(
                    reader = %event.email,
                    newsletter = %event.newsletter_id,
                    error = %err,
                    "open event not persisted"
                );
                Err(err.into())
            }
        }
    }

    fn persist(
        &self,
        conn: &mut Connection,
        event: &OpenEvent,
        fingerprint: &Fingerprint,
    ) -> rusqlite::Result<ProcessOutcome> {
        let now_us = Utc::now().timestamp_micros();
        let local = to_local(event.opened_at, self.offset);

        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let reader_id = store::find_or_create_reader(&tx, &event.email, now_us)?;
        let newsletter_id = store::find_or_create_newsletter(&tx, &event.newsletter_id, now_us)?;

        let previous = store::load_ledger(&tx, reader_id)?;
        if let Some(last) = previous.and_then(|ledger| ledger.last_opened_date) {
            if local < last {
                debug!(
                    reader = %event.email,
                    newsletter = %event.newsletter_id,
                    opened_at = %local,
                    last_opened_at = %last,
                    "open predates last recorded open, ignored"
                );
                return Ok(ProcessOutcome::OutOfOrder {
                    last_opened_at: last,
                });
            }
        }
        let transition = apply_open(previous.as_ref(), local);
        store::save_ledger(&tx, reader_id, &transition.ledger, now_us)?;
        let event_id =
            store::insert_open_event(&tx, reader_id, newsletter_id, event, local, fingerprint)?;
        tx.commit()?;

        info!(
            reader = %event.email,
            newsletter = %event.newsletter_id,
            outcome = %transition.outcome,
            current_streak = transition.ledger.current_streak,
            longest_streak = transition.ledger.longest_streak,
            life = transition.ledger.life,
            weekend_bonus = transition.weekend_bonus,
            "open processed"
        );

        Ok(ProcessOutcome::Processed {
            event_id,
            outcome: transition.outcome,
            gap_days: transition.gap_days,
            weekend_bonus: transition.weekend_bonus,
            ledger: LedgerSnapshot::new(event.email.clone(), &transition.ledger),
        })
    }
}

/// Read a reader's current ledger.
///
/// # Errors
///
/// - [`TrackerError::ReaderNotFound`] when no ledger exists for `email`.
/// - [`TrackerError::Storage`] when the lookup fails.
pub fn get_ledger(conn: &Connection, email: &str) -> Result<LedgerSnapshot, TrackerError> {
    let email = email.trim();
    store::ledger_by_email(conn, email)?
        .map(|ledger| LedgerSnapshot::new(email, &ledger))
        .ok_or_else(|| TrackerError::ReaderNotFound(email.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use crate::dedup::{DEFAULT_DEDUP_WINDOW, ManualClock};
    use crate::event::UtmFields;
    use chrono::{DateTime, NaiveDate, TimeZone};
    use std::sync::Arc;
    use std::time::Duration;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, day, hour, 0, 0)
            .single()
            .expect("valid instant")
    }

    fn tracker_with_clock() -> (Arc<ManualClock>, Tracker) {
        let clock = Arc::new(ManualClock::new());
        let dedup = InMemoryDedup::with_clock(DEFAULT_DEDUP_WINDOW, Arc::clone(&clock));
        let offset = FixedOffset::east_opt(0).expect("utc offset");
        (clock, Tracker::new(offset, Box::new(dedup)))
    }

    #[test]
    fn first_open_starts_a_ledger() {
        let mut conn = open_in_memory().expect("store");
        let (_clock, tracker) = tracker_with_clock();
        let event = OpenEvent::new("a@example.com", "post_1", at(12, 8));

        let outcome = tracker
            .process_open_event(&mut conn, &event)
            .expect("process");
        let ProcessOutcome::Processed {
            outcome: branch,
            ledger,
            ..
        } = outcome
        else {
            panic!("expected a processed outcome");
        };
        assert_eq!(branch, StreakOutcome::Started);
        assert_eq!(ledger.current_streak, 1);
        assert_eq!(ledger.longest_streak, 1);
        assert_eq!(ledger.life, 1);
        assert_eq!(ledger.last_opened_date, NaiveDate::from_ymd_opt(2025, 2, 12));

        assert_eq!(get_ledger(&conn, "a@example.com").expect("ledger"), ledger);
    }

    #[test]
    fn duplicate_within_window_is_suppressed_and_not_stored() {
        let mut conn = open_in_memory().expect("store");
        let (clock, tracker) = tracker_with_clock();
        let event = OpenEvent::new("a@example.com", "post_1", at(12, 8));

        assert!(
            !tracker
                .process_open_event(&mut conn, &event)
                .expect("first")
                .is_duplicate()
        );
        clock.advance(Duration::from_secs(2));
        let again = tracker
            .process_open_event(&mut conn, &event)
            .expect("second");
        assert!(again.is_duplicate());
        assert!(again.ledger().is_none());

        let events: i64 = conn
            .query_row("SELECT COUNT(*) FROM open_events", [], |row| row.get(0))
            .expect("count events");
        assert_eq!(events, 1);
    }

    #[test]
    fn same_event_after_window_is_processed_again() {
        let mut conn = open_in_memory().expect("store");
        let (clock, tracker) = tracker_with_clock();
        let event = OpenEvent::new("a@example.com", "post_1", at(12, 8));

        tracker
            .process_open_event(&mut conn, &event)
            .expect("first");
        clock.advance(Duration::from_secs(6));
        let again = tracker
            .process_open_event(&mut conn, &event)
            .expect("second");

        let ProcessOutcome::Processed { outcome, .. } = again else {
            panic!("expected a processed outcome");
        };
        assert_eq!(outcome, StreakOutcome::SameDay);
    }

    #[test]
    fn missing_fields_are_rejected_before_dedup() {
        let mut conn = open_in_memory().expect("store");
        let (_clock, tracker) = tracker_with_clock();

        let no_email = OpenEvent::new("", "post_1", at(12, 8));
        assert!(matches!(
            tracker.process_open_event(&mut conn, &no_email),
            Err(TrackerError::MissingField { field: "email" })
        ));

        let no_id = OpenEvent::new("a@example.com", " ", at(12, 8));
        assert!(matches!(
            tracker.process_open_event(&mut conn, &no_id),
            Err(TrackerError::MissingField { field: "id" })
        ));
    }

    #[test]
    fn storage_failure_releases_the_fingerprint() {
        let mut broken = Connection::open_in_memory().expect("bare connection");
        let (_clock, tracker) = tracker_with_clock();
        let event = OpenEvent::new("a@example.com", "post_1", at(12, 8));

        let err = tracker
            .process_open_event(&mut broken, &event)
            .expect_err("no schema");
        assert!(err.is_retryable());

        let mut conn = open_in_memory().expect("store");
        let retried = tracker
            .process_open_event(&mut conn, &event)
            .expect("retry");
        assert!(!retried.is_duplicate());
    }

    #[test]
    fn utm_variants_are_distinct_events() {
        let mut conn = open_in_memory().expect("store");
        let (_clock, tracker) = tracker_with_clock();
        let plain = OpenEvent::new("a@example.com", "post_1", at(12, 8));
        let tagged = plain.clone().with_utm(UtmFields {
            source: Some("tiktok".into()),
            ..UtmFields::default()
        });

        assert!(
            !tracker
                .process_open_event(&mut conn, &plain)
                .expect("plain")
                .is_duplicate()
        );
        assert!(
            !tracker
                .process_open_event(&mut conn, &tagged)
                .expect("tagged")
                .is_duplicate()
        );
    }

    #[test]
    fn local_offset_decides_the_calendar_day() {
        let mut conn = open_in_memory().expect("store");
        let offset = FixedOffset::west_opt(3 * 3600).expect("valid offset");
        let tracker = Tracker::new(offset, Box::new(InMemoryDedup::default()));

        // 01:00 UTC on the 13th is still the evening of the 12th locally.
        let event = OpenEvent::new("a@example.com", "post_1", at(13, 1));
        let outcome = tracker
            .process_open_event(&mut conn, &event)
            .expect("process");
        assert_eq!(
            outcome.ledger().and_then(|l| l.last_opened_date),
            NaiveDate::from_ymd_opt(2025, 2, 12)
        );
    }

    #[test]
    fn backdated_open_leaves_the_ledger_alone() {
        let mut conn = open_in_memory().expect("store");
        let (_clock, tracker) = tracker_with_clock();

        tracker
            .process_open_event(&mut conn, &OpenEvent::new("a@example.com", "post_1", at(12, 9)))
            .expect("first");
        let before = get_ledger(&conn, "a@example.com").expect("ledger");

        let outcome = tracker
            .process_open_event(&mut conn, &OpenEvent::new("a@example.com", "post_2", at(5, 9)))
            .expect("backdated");
        assert_eq!(
            outcome,
            ProcessOutcome::OutOfOrder {
                last_opened_at: at(12, 9).naive_utc(),
            }
        );
        assert!(outcome.ledger().is_none());

        let after = get_ledger(&conn, "a@example.com").expect("ledger");
        assert_eq!(after, before);
        assert_eq!(after.life, 1);

        let events: i64 = conn
            .query_row("SELECT COUNT(*) FROM open_events", [], |row| row.get(0))
            .expect("count events");
        assert_eq!(events, 1);
    }

    #[test]
    fn earlier_time_on_the_same_day_is_out_of_order() {
        let mut conn = open_in_memory().expect("store");
        let (_clock, tracker) = tracker_with_clock();

        tracker
            .process_open_event(&mut conn, &OpenEvent::new("a@example.com", "post_1", at(12, 20)))
            .expect("evening");
        let morning = tracker
            .process_open_event(&mut conn, &OpenEvent::new("a@example.com", "post_2", at(12, 8)))
            .expect("morning");
        assert!(matches!(morning, ProcessOutcome::OutOfOrder { .. }));
    }

    #[test]
    fn unknown_reader_is_not_found() {
        let conn = open_in_memory().expect("store");
        assert!(matches!(
            get_ledger(&conn, "nobody@example.com"),
            Err(TrackerError::ReaderNotFound(email)) if email == "nobody@example.com"
        ));
    }

    #[test]
    fn tracker_from_default_config_uses_utc() {
        let tracker = Tracker::from_config(&ProjectConfig::default());
        assert_eq!(tracker.offset().local_minus_utc(), 0);
    }
}

//! Write path: identity rows, ledger load/save and the open-event log.
//!
//! Every function here takes a plain `&Connection` and performs no
//! transaction management of its own; the tracker wraps one event's worth of
//! calls in a single `BEGIN IMMEDIATE` so they commit or roll back together.

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params, types::Type};

use crate::event::{Fingerprint, OpenEvent};
use crate::ledger::StreakLedger;

/// Return the id of the reader with `email`, creating the row on first sight.
///
/// # Errors
///
/// Returns an error if the insert or lookup fails.
pub fn find_or_create_reader(conn: &Connection, email: &str, now_us: i64) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO readers (email, created_at_us) VALUES (?1, ?2)
         ON CONFLICT(email) DO NOTHING",
        params![email, now_us],
    )?;
    conn.query_row(
        "SELECT reader_id FROM readers WHERE email = ?1",
        params![email],
        |row| row.get(0),
    )
}

/// Return the id of the newsletter with `resource_id`, creating it on first
/// sight.
///
/// # Errors
///
/// Returns an error if the insert or lookup fails.
pub fn find_or_create_newsletter(
    conn: &Connection,
    resource_id: &str,
    now_us: i64,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO newsletters (resource_id, created_at_us) VALUES (?1, ?2)
         ON CONFLICT(resource_id) DO NOTHING",
        params![resource_id, now_us],
    )?;
    conn.query_row(
        "SELECT newsletter_id FROM newsletters WHERE resource_id = ?1",
        params![resource_id],
        |row| row.get(0),
    )
}

/// Load the ledger for a reader id, if one exists.
///
/// # Errors
///
/// Returns an error if the query fails or a stored timestamp is out of range.
pub fn load_ledger(conn: &Connection, reader_id: i64) -> rusqlite::Result<Option<StreakLedger>> {
    conn.query_row(
        "SELECT current_streak, longest_streak, last_opened_local_us, life
         FROM streak_ledgers WHERE reader_id = ?1",
        params![reader_id],
        row_to_ledger,
    )
    .optional()
}

/// Load the ledger for a reader by email, if both exist.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn ledger_by_email(conn: &Connection, email: &str) -> rusqlite::Result<Option<StreakLedger>> {
    conn.query_row(
        "SELECT l.current_streak, l.longest_streak, l.last_opened_local_us, l.life
         FROM streak_ledgers l
         INNER JOIN readers r ON r.reader_id = l.reader_id
         WHERE r.email = ?1",
        params![email],
        row_to_ledger,
    )
    .optional()
}

/// Insert or replace the ledger for `reader_id`.
///
/// # Errors
///
/// Returns an error if the write fails or violates a table constraint.
pub fn save_ledger(
    conn: &Connection,
    reader_id: i64,
    ledger: &StreakLedger,
    now_us: i64,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO streak_ledgers (
            reader_id, current_streak, longest_streak, last_opened_local_us, life, updated_at_us
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(reader_id) DO UPDATE SET
            current_streak = excluded.current_streak,
            longest_streak = excluded.longest_streak,
            last_opened_local_us = excluded.last_opened_local_us,
            life = excluded.life,
            updated_at_us = excluded.updated_at_us",
        params![
            reader_id,
            ledger.current_streak,
            ledger.longest_streak,
            ledger.last_opened_date.map(local_to_micros),
            ledger.life,
            now_us
        ],
    )?;
    Ok(())
}

/// Append one processed open to the event log and advance `store_meta`.
///
/// Returns the new event id.
///
/// # Errors
///
/// Returns an error if the insert fails.
pub fn insert_open_event(
    conn: &Connection,
    reader_id: i64,
    newsletter_id: i64,
    event: &OpenEvent,
    opened_local: NaiveDateTime,
    fingerprint: &Fingerprint,
) -> rusqlite::Result<i64> {
    let opened_at_us = event.opened_at.timestamp_micros();
    conn.execute(
        "INSERT INTO open_events (
            reader_id, newsletter_id, opened_at_us, opened_on,
            utm_source, utm_medium, utm_campaign, utm_channel, fingerprint
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            reader_id,
            newsletter_id,
            opened_at_us,
            opened_local.date().format("%Y-%m-%d").to_string(),
            event.utm.source,
            event.utm.medium,
            event.utm.campaign,
            event.utm.channel,
            fingerprint.to_string()
        ],
    )?;
    let event_id = conn.last_insert_rowid();
    conn.execute(
        "UPDATE store_meta SET last_event_id = ?1, last_event_at_us = ?2 WHERE id = 1",
        params![event_id, opened_at_us],
    )?;
    Ok(event_id)
}

/// Read `(last_event_id, last_event_at_us)` from `store_meta`.
///
/// # Errors
///
/// Returns an error if the metadata row is missing or unreadable.
pub fn last_event(conn: &Connection) -> rusqlite::Result<(i64, i64)> {
    conn.query_row(
        "SELECT last_event_id, last_event_at_us FROM store_meta WHERE id = 1",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
}

/// Encode a local wall-clock time as microseconds on its own timeline.
#[must_use]
pub fn local_to_micros(at: NaiveDateTime) -> i64 {
    at.and_utc().timestamp_micros()
}

/// Inverse of [`local_to_micros`].
#[must_use]
pub fn micros_to_local(us: i64) -> Option<NaiveDateTime> {
    DateTime::<Utc>::from_timestamp_micros(us).map(|at| at.naive_utc())
}

/// Decode a UTC instant stored as microseconds.
#[must_use]
pub fn micros_to_utc(us: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_micros(us)
}

fn row_to_ledger(row: &rusqlite::Row<'_>) -> rusqlite::Result<StreakLedger> {
    let last_us: Option<i64> = row.get(2)?;
    let last_opened_date = match last_us {
        Some(us) => Some(micros_to_local(us).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                Type::Integer,
                format!("timestamp out of range: {us}").into(),
            )
        })?),
        None => None,
    };

    Ok(StreakLedger {
        current_streak: row.get(0)?,
        longest_streak: row.get(1)?,
        last_opened_date,
        life: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use crate::event::UtmFields;
    use chrono::{NaiveDate, TimeZone};

    fn local(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|date| date.and_hms_opt(h, 30, 0))
            .expect("valid timestamp")
    }

    #[test]
    fn readers_and_newsletters_are_created_once() {
        let conn = open_in_memory().expect("store");

        let a = find_or_create_reader(&conn, "a@example.com", 1).expect("create reader");
        let again = find_or_create_reader(&conn, "a@example.com", 2).expect("find reader");
        let b = find_or_create_reader(&conn, "b@example.com", 3).expect("create reader");
        assert_eq!(a, again);
        assert_ne!(a, b);

        let post = find_or_create_newsletter(&conn, "post_1", 1).expect("create newsletter");
        assert_eq!(
            find_or_create_newsletter(&conn, "post_1", 2).expect("find newsletter"),
            post
        );
    }

    #[test]
    fn ledger_round_trips_with_full_timestamp() {
        let conn = open_in_memory().expect("store");
        let reader = find_or_create_reader(&conn, "a@example.com", 0).expect("reader");
        assert_eq!(load_ledger(&conn, reader).expect("load"), None);

        let ledger = StreakLedger {
            current_streak: 3,
            longest_streak: 7,
            last_opened_date: Some(local(2025, 2, 12, 23)),
            life: -2,
        };
        save_ledger(&conn, reader, &ledger, 10).expect("save");
        assert_eq!(load_ledger(&conn, reader).expect("load"), Some(ledger));
        assert_eq!(
            ledger_by_email(&conn, "a@example.com").expect("load by email"),
            Some(ledger)
        );

        let updated = StreakLedger {
            current_streak: 4,
            ..ledger
        };
        save_ledger(&conn, reader, &updated, 11).expect("update");
        assert_eq!(load_ledger(&conn, reader).expect("load"), Some(updated));
    }

    #[test]
    fn null_last_open_loads_as_none() {
        let conn = open_in_memory().expect("store");
        let reader = find_or_create_reader(&conn, "a@example.com", 0).expect("reader");
        let ledger = StreakLedger {
            current_streak: 0,
            longest_streak: 2,
            last_opened_date: None,
            life: 1,
        };
        save_ledger(&conn, reader, &ledger, 0).expect("save");
        let loaded = load_ledger(&conn, reader).expect("load").expect("row");
        assert_eq!(loaded.last_opened_date, None);
    }

    #[test]
    fn unknown_email_has_no_ledger() {
        let conn = open_in_memory().expect("store");
        assert_eq!(ledger_by_email(&conn, "nobody@example.com").expect("query"), None);
    }

    #[test]
    fn open_event_insert_advances_meta() {
        let conn = open_in_memory().expect("store");
        let reader = find_or_create_reader(&conn, "a@example.com", 0).expect("reader");
        let post = find_or_create_newsletter(&conn, "post_1", 0).expect("newsletter");
        let at = Utc
            .with_ymd_and_hms(2025, 2, 12, 8, 0, 0)
            .single()
            .expect("valid instant");
        let event = OpenEvent::new("a@example.com", "post_1", at).with_utm(UtmFields {
            source: Some("tiktok".into()),
            medium: Some(String::new()),
            ..UtmFields::default()
        });

        let id = insert_open_event(
            &conn,
            reader,
            post,
            &event,
            at.naive_utc(),
            &event.fingerprint(),
        )
        .expect("insert event");
        assert_eq!(last_event(&conn).expect("meta"), (id, at.timestamp_micros()));

        let (day, source, medium): (String, Option<String>, Option<String>) = conn
            .query_row(
                "SELECT opened_on, utm_source, utm_medium FROM open_events WHERE event_id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .expect("read back");
        assert_eq!(day, "2025-02-12");
        assert_eq!(source.as_deref(), Some("tiktok"));
        assert_eq!(medium, None);
    }

    #[test]
    fn micros_conversions_are_inverse() {
        let at = local(2025, 2, 9, 21);
        assert_eq!(micros_to_local(local_to_micros(at)), Some(at));
        assert_eq!(micros_to_local(i64::MAX), None);
    }
}

//! Reporting queries over the store.
//!
//! Typed result structs and read-only query functions for the admin and
//! reader views: engagement metrics, streak rankings, open history, and the
//! newsletter catalogue.
//!
//! All functions take a shared `&Connection` reference and return
//! `anyhow::Result<T>` with typed structs (never raw rows).

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use serde::Serialize;

use super::store::{last_event, micros_to_local, micros_to_utc};
use crate::event::UtmFields;
use crate::ledger::LedgerSnapshot;

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Aggregate engagement numbers for the admin dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EngagementMetrics {
    /// Readers whose current streak passes the streak filter.
    pub total_readers: u64,
    /// Opens by those readers that pass every other filter.
    pub total_openings: u64,
    /// Mean current streak of the counted readers.
    pub average_streak: f64,
}

/// Filter criteria for [`engagement_metrics`].
///
/// All fields are optional and combine with AND semantics.
#[derive(Debug, Clone, Default)]
pub struct MetricsFilter {
    /// Newsletter resource id (the external post id).
    pub newsletter: Option<String>,
    /// First local calendar day to count opens on (inclusive).
    pub start_date: Option<NaiveDate>,
    /// Last local calendar day to count opens on (inclusive).
    pub end_date: Option<NaiveDate>,
    /// Only readers whose current streak is at least this value.
    pub min_streak: Option<u32>,
    /// Exact-match UTM filters.
    pub utm: UtmFields,
}

/// One entry in a reader's open history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReaderOpening {
    pub newsletter_id: i64,
    pub resource_id: String,
    pub opened_at: DateTime<Utc>,
    pub utm_source: String,
    pub utm_medium: String,
    pub utm_campaign: String,
    pub utm_channel: String,
}

/// A newsletter row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewsletterRow {
    pub id: i64,
    pub resource_id: String,
}

// ---------------------------------------------------------------------------
// Query functions
// ---------------------------------------------------------------------------

/// Compute engagement metrics under `filter`.
///
/// An unknown newsletter, or a streak filter nobody passes, yields all
/// zeros.
///
/// # Errors
///
/// Returns an error if a database query fails.
pub fn engagement_metrics(conn: &Connection, filter: &MetricsFilter) -> Result<EngagementMetrics> {
    let min_streak = filter.min_streak.unwrap_or(0);

    let (reader_count, average): (i64, Option<f64>) = conn
        .query_row(
            "SELECT COUNT(*), AVG(current_streak)
             FROM streak_ledgers
             WHERE current_streak >= ?1",
            params![min_streak],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .context("count readers passing streak filter")?;

    if reader_count == 0 {
        return Ok(EngagementMetrics::default());
    }

    let newsletter_id = match filter.newsletter.as_deref() {
        Some(resource_id) => match newsletter_id_for(conn, resource_id)? {
            Some(id) => Some(id),
            None => return Ok(EngagementMetrics::default()),
        },
        None => None,
    };

    let mut conditions: Vec<String> = vec![
        "e.reader_id IN (SELECT reader_id FROM streak_ledgers WHERE current_streak >= ?1)"
            .to_string(),
    ];
    let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = vec![Box::new(min_streak)];

    if let Some(id) = newsletter_id {
        param_values.push(Box::new(id));
        conditions.push(format!("e.newsletter_id = ?{}", param_values.len()));
    }

    if let Some(start) = filter.start_date {
        param_values.push(Box::new(start.format("%Y-%m-%d").to_string()));
        conditions.push(format!("e.opened_on >= ?{}", param_values.len()));
    }

    if let Some(end) = filter.end_date {
        param_values.push(Box::new(end.format("%Y-%m-%d").to_string()));
        conditions.push(format!("e.opened_on <= ?{}", param_values.len()));
    }

    for (column, value) in [
        ("utm_source", &filter.utm.source),
        ("utm_medium", &filter.utm.medium),
        ("utm_campaign", &filter.utm.campaign),
        ("utm_channel", &filter.utm.channel),
    ] {
        if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
            param_values.push(Box::new(value.to_string()));
            conditions.push(format!("e.{column} = ?{}", param_values.len()));
        }
    }

    let sql = format!(
        "SELECT COUNT(*) FROM open_events e WHERE {}",
        conditions.join(" AND ")
    );

    let params_ref: Vec<&dyn rusqlite::types::ToSql> =
        param_values.iter().map(AsRef::as_ref).collect();

    let openings: i64 = conn
        .query_row(&sql, params_from_iter(params_ref), |row| row.get(0))
        .with_context(|| format!("execute engagement openings query: {sql}"))?;

    Ok(EngagementMetrics {
        total_readers: u64::try_from(reader_count).unwrap_or_default(),
        total_openings: u64::try_from(openings).unwrap_or_default(),
        average_streak: average.unwrap_or(0.0),
    })
}

/// Readers ranked by longest streak, best first.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn top_readers(conn: &Connection, limit: u32) -> Result<Vec<LedgerSnapshot>> {
    let sql = "SELECT r.email, l.current_streak, l.longest_streak, l.last_opened_local_us, l.life \
               FROM streak_ledgers l \
               INNER JOIN readers r ON r.reader_id = l.reader_id \
               ORDER BY l.longest_streak DESC, r.reader_id \
               LIMIT ?1";

    let mut stmt = conn.prepare(sql).context("prepare top_readers query")?;
    let rows = stmt
        .query_map(params![limit], |row| {
            let last_opened_at = row.get::<_, Option<i64>>(3)?.and_then(micros_to_local);
            Ok(LedgerSnapshot {
                email: row.get(0)?,
                current_streak: row.get(1)?,
                longest_streak: row.get(2)?,
                last_opened_date: last_opened_at.map(|at| at.date()),
                last_opened_at,
                life: row.get(4)?,
            })
        })
        .context("execute top_readers query")?;

    let mut readers = Vec::new();
    for row in rows {
        readers.push(row.context("read top_readers row")?);
    }
    Ok(readers)
}

/// Open history for one reader, oldest first.
///
/// Missing UTM values come back as empty strings. An unknown email yields
/// an empty list.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn reader_openings(conn: &Connection, email: &str) -> Result<Vec<ReaderOpening>> {
    let sql = "SELECT e.newsletter_id, n.resource_id, e.opened_at_us, \
               COALESCE(e.utm_source, ''), COALESCE(e.utm_medium, ''), \
               COALESCE(e.utm_campaign, ''), COALESCE(e.utm_channel, '') \
               FROM open_events e \
               INNER JOIN readers r ON r.reader_id = e.reader_id \
               INNER JOIN newsletters n ON n.newsletter_id = e.newsletter_id \
               WHERE r.email = ?1 \
               ORDER BY e.opened_at_us, e.event_id";

    let mut stmt = conn.prepare(sql).context("prepare reader_openings query")?;
    let rows = stmt
        .query_map(params![email], |row| {
            let us: i64 = row.get(2)?;
            let opened_at = micros_to_utc(us).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    2,
                    rusqlite::types::Type::Integer,
                    format!("timestamp out of range: {us}").into(),
                )
            })?;
            Ok(ReaderOpening {
                newsletter_id: row.get(0)?,
                resource_id: row.get(1)?,
                opened_at,
                utm_source: row.get(3)?,
                utm_medium: row.get(4)?,
                utm_campaign: row.get(5)?,
                utm_channel: row.get(6)?,
            })
        })
        .with_context(|| format!("execute reader_openings for '{email}'"))?;

    let mut openings = Vec::new();
    for row in rows {
        openings.push(row.context("read reader_openings row")?);
    }
    Ok(openings)
}

/// Every known newsletter, in creation order.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn list_newsletters(conn: &Connection) -> Result<Vec<NewsletterRow>> {
    let mut stmt = conn
        .prepare("SELECT newsletter_id, resource_id FROM newsletters ORDER BY newsletter_id")
        .context("prepare list_newsletters query")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(NewsletterRow {
                id: row.get(0)?,
                resource_id: row.get(1)?,
            })
        })
        .context("execute list_newsletters query")?;

    let mut newsletters = Vec::new();
    for row in rows {
        newsletters.push(row.context("read newsletter row")?);
    }
    Ok(newsletters)
}

/// Resource id of the newsletter with internal id `id`.
///
/// Returns `None` if no such newsletter exists.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn newsletter_resource(conn: &Connection, id: i64) -> Result<Option<String>> {
    conn.query_row(
        "SELECT resource_id FROM newsletters WHERE newsletter_id = ?1",
        params![id],
        |row| row.get(0),
    )
    .optional()
    .with_context(|| format!("newsletter_resource for {id}"))
}

fn newsletter_id_for(conn: &Connection, resource_id: &str) -> Result<Option<i64>> {
    conn.query_row(
        "SELECT newsletter_id FROM newsletters WHERE resource_id = ?1",
        params![resource_id],
        |row| row.get(0),
    )
    .optional()
    .with_context(|| format!("look up newsletter '{resource_id}'"))
}

/// Attempt to open the store database with graceful recovery.
///
/// If the database file is missing or corrupt, returns `Ok(None)` instead
/// of an error so the caller can ask the operator to re-initialize.
///
/// # Errors
///
/// Returns an error only for unexpected I/O failures (not missing/corrupt DB).
pub fn try_open_store(path: &std::path::Path) -> Result<Option<Connection>> {
    if !path.exists() {
        return Ok(None);
    }

    match super::open_store(path) {
        Ok(conn) => {
            if last_event(&conn).is_ok() {
                Ok(Some(conn))
            } else {
                tracing::warn!(
                    path = %path.display(),
                    "store database corrupt, needs re-init"
                );
                Ok(None)
            }
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to open store database, needs re-init"
            );
            Ok(None)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

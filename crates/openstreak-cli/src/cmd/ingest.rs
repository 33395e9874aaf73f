//! `openstreak ingest`: process webhook payloads, one JSON object per line.
//!
//! All lines share one tracker, so a retried delivery later in the stream is
//! suppressed exactly as it would be by a long-running receiver.
//!
//! The dedup window is wall-clock time and the fingerprint leaves out the
//! open timestamp. Replaying history quickly therefore drops opens of the
//! same newsletter by the same reader with the same UTM fields as duplicates
//! even when they fall on different days. Opens older than the reader's last
//! recorded open are counted as `out_of_order` and leave the ledger alone.

use crate::cmd::open_existing_store;
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};
use anyhow::{Context as _, Result};
use chrono::Utc;
use clap::Args;
use openstreak_core::config::EffectiveConfig;
use openstreak_core::error::TrackerError;
use openstreak_core::event::WebhookPayload;
use openstreak_core::tracker::{ProcessOutcome, Tracker};
use rusqlite::Connection;
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Args, Debug)]
pub struct IngestArgs {
    /// Read payloads from this file instead of stdin.
    #[arg(long, short)]
    pub file: Option<PathBuf>,
}

/// Counts for one ingest run.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub processed: u64,
    pub duplicates: u64,
    /// Lines that were not valid JSON or lacked `email`/`id`.
    pub rejected: u64,
    /// Lines that failed in the store.
    pub failed: u64,
    /// Opens older than the reader's last recorded open.
    pub out_of_order: u64,
}

impl IngestSummary {
    const fn total(&self) -> u64 {
        self.processed + self.duplicates + self.rejected + self.failed + self.out_of_order
    }
}

/// How one line fared.
enum LineResult {
    Done(ProcessOutcome),
    Rejected(String),
    Failed(String),
}

fn process_line(tracker: &Tracker, conn: &mut Connection, line: &str) -> LineResult {
    let payload: WebhookPayload = match serde_json::from_str(line) {
        Ok(payload) => payload,
        Err(err) => return LineResult::Rejected(format!("invalid JSON: {err}")),
    };

    let event = match payload.into_event(Utc::now()) {
        Ok(event) => event,
        Err(err) => return LineResult::Rejected(err.to_string()),
    };

    match tracker.process_open_event(conn, &event) {
        Ok(outcome) => LineResult::Done(outcome),
        Err(err @ TrackerError::MissingField { .. }) => LineResult::Rejected(err.to_string()),
        Err(err) => LineResult::Failed(err.to_string()),
    }
}

/// Feed every non-blank line through the tracker.
///
/// `progress` receives one line per event in human modes.
fn ingest_lines(
    tracker: &Tracker,
    conn: &mut Connection,
    input: impl BufRead,
    mut progress: Option<&mut dyn Write>,
) -> Result<IngestSummary> {
    let mut summary = IngestSummary::default();

    for (index, line) in input.lines().enumerate() {
        let line = line.context("Failed to read input")?;
        let line_no = index + 1;
        if line.trim().is_empty() {
            continue;
        }

        let status = match process_line(tracker, conn, &line) {
            LineResult::Done(outcome) => match &outcome {
                ProcessOutcome::Processed {
                    outcome, ledger, ..
                } => {
                    summary.processed += 1;
                    format!("{outcome}\t{}\t{}", ledger.email, ledger.current_streak)
                }
                ProcessOutcome::DuplicateSuppressed { .. } => {
                    summary.duplicates += 1;
                    "duplicate".to_string()
                }
                ProcessOutcome::OutOfOrder { .. } => {
                    summary.out_of_order += 1;
                    "out_of_order".to_string()
                }
            },
            LineResult::Rejected(reason) => {
                summary.rejected += 1;
                warn!(line = line_no, %reason, "payload rejected");
                format!("rejected\t{reason}")
            }
            LineResult::Failed(reason) => {
                summary.failed += 1;
                warn!(line = line_no, %reason, "payload failed");
                format!("failed\t{reason}")
            }
        };

        if let Some(w) = progress.as_deref_mut() {
            writeln!(w, "{line_no}\t{status}")?;
        }
    }

    Ok(summary)
}

pub fn run_ingest(
    args: &IngestArgs,
    output: OutputMode,
    quiet: bool,
    project_root: &Path,
    config: &EffectiveConfig,
) -> Result<()> {
    let mut conn = open_existing_store(project_root)?;
    let tracker = Tracker::from_config(&config.project);

    let input: Box<dyn BufRead> = match &args.file {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?,
        )),
        None => Box::new(io::stdin().lock()),
    };

    let summary = if output.is_json() || quiet {
        ingest_lines(&tracker, &mut conn, input, None)?
    } else {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        ingest_lines(&tracker, &mut conn, input, Some(&mut out))?
    };

    tracing::info!(
        processed = summary.processed,
        duplicates = summary.duplicates,
        rejected = summary.rejected,
        failed = summary.failed,
        out_of_order = summary.out_of_order,
        "ingest finished"
    );

    render_mode(
        output,
        &summary,
        |s, w| {
            writeln!(
                w,
                "processed={} duplicates={} rejected={} failed={} out_of_order={}",
                s.processed, s.duplicates, s.rejected, s.failed, s.out_of_order
            )
        },
        |s, w| {
            writeln!(w)?;
            pretty_section(w, &format!("Ingested {} payload(s)", s.total()))?;
            pretty_kv(w, "Processed", s.processed.to_string())?;
            pretty_kv(w, "Duplicates", s.duplicates.to_string())?;
            pretty_kv(w, "Rejected", s.rejected.to_string())?;
            pretty_kv(w, "Failed", s.failed.to_string())?;
            pretty_kv(w, "Out of order", s.out_of_order.to_string())
        },
    )
}

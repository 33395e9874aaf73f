//! `openstreak open`: record a single newsletter open.

use crate::cmd::open_existing_store;
use crate::cmd::show::{write_ledger_pretty, write_ledger_text};
use crate::output::{OutputMode, pretty_kv, render_mode};
use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Args;
use openstreak_core::config::EffectiveConfig;
use openstreak_core::event::{OpenEvent, UtmFields};
use openstreak_core::tracker::{ProcessOutcome, Tracker};
use std::io::{self, Write};
use std::path::Path;

#[derive(Args, Debug)]
pub struct OpenArgs {
    /// Reader email address.
    #[arg(long)]
    pub email: String,

    /// Newsletter resource id (e.g. `post_123`).
    #[arg(long = "newsletter", visible_alias = "id")]
    pub newsletter: String,

    /// Time of the open, RFC 3339. Defaults to now.
    #[arg(long)]
    pub at: Option<DateTime<Utc>>,

    #[arg(long)]
    pub utm_source: Option<String>,

    #[arg(long)]
    pub utm_medium: Option<String>,

    #[arg(long)]
    pub utm_campaign: Option<String>,

    #[arg(long)]
    pub utm_channel: Option<String>,
}

impl OpenArgs {
    fn to_event(&self, now: DateTime<Utc>) -> OpenEvent {
        OpenEvent::new(&self.email, &self.newsletter, self.at.unwrap_or(now)).with_utm(
            UtmFields {
                source: self.utm_source.clone(),
                medium: self.utm_medium.clone(),
                campaign: self.utm_campaign.clone(),
                channel: self.utm_channel.clone(),
            },
        )
    }
}

fn write_outcome_text(outcome: &ProcessOutcome, w: &mut dyn Write) -> io::Result<()> {
    match outcome {
        ProcessOutcome::Processed {
            outcome, ledger, ..
        } => {
            write!(w, "{outcome}\t")?;
            write_ledger_text(ledger, w)
        }
        ProcessOutcome::DuplicateSuppressed { fingerprint } => {
            writeln!(w, "duplicate\t{fingerprint}")
        }
        ProcessOutcome::OutOfOrder { last_opened_at } => {
            writeln!(w, "out_of_order\t{}", last_opened_at.format("%Y-%m-%dT%H:%M:%S"))
        }
    }
}

fn write_outcome_pretty(outcome: &ProcessOutcome, w: &mut dyn Write) -> io::Result<()> {
    match outcome {
        ProcessOutcome::Processed {
            event_id,
            outcome,
            gap_days,
            weekend_bonus,
            ledger,
        } => {
            writeln!(w, "✓ Recorded open #{event_id} ({outcome})")?;
            if let Some(gap) = gap_days {
                writeln!(w, "  gap of {gap} day(s)")?;
            }
            if *weekend_bonus {
                writeln!(w, "  weekend bonus: +1 life")?;
            }
            writeln!(w)?;
            write_ledger_pretty(ledger, w)
        }
        ProcessOutcome::DuplicateSuppressed { fingerprint } => {
            writeln!(w, "Duplicate open suppressed.")?;
            pretty_kv(w, "Fingerprint", fingerprint)
        }
        ProcessOutcome::OutOfOrder { last_opened_at } => {
            writeln!(w, "Open predates the reader's last recorded open; ignored.")?;
            pretty_kv(
                w,
                "Last opened",
                last_opened_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            )
        }
    }
}

pub fn run_open(
    args: &OpenArgs,
    output: OutputMode,
    project_root: &Path,
    config: &EffectiveConfig,
) -> Result<()> {
    let mut conn = open_existing_store(project_root)?;
    let tracker = Tracker::from_config(&config.project);
    let outcome = tracker.process_open_event(&mut conn, &args.to_event(Utc::now()))?;

    render_mode(
        output,
        &outcome,
        write_outcome_text,
        write_outcome_pretty,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use openstreak_core::engine::StreakOutcome;
    use openstreak_core::{LedgerSnapshot, StreakLedger};

    fn args() -> OpenArgs {
        OpenArgs {
            email: " ana@example.com ".into(),
            newsletter: "post_1".into(),
            at: None,
            utm_source: Some("tiktok".into()),
            utm_medium: Some(String::new()),
            utm_campaign: None,
            utm_channel: None,
        }
    }

    #[test]
    fn event_defaults_to_now_and_normalizes_utm() {
        let now = Utc
            .with_ymd_and_hms(2025, 2, 12, 8, 0, 0)
            .single()
            .expect("valid instant");
        let event = args().to_event(now);
        assert_eq!(event.email, "ana@example.com");
        assert_eq!(event.opened_at, now);
        assert_eq!(event.utm.source.as_deref(), Some("tiktok"));
        assert_eq!(event.utm.medium, None);
    }

    #[test]
    fn explicit_time_wins() {
        let at = Utc
            .with_ymd_and_hms(2025, 1, 1, 0, 0, 0)
            .single()
            .expect("valid instant");
        let event = OpenArgs {
            at: Some(at),
            ..args()
        }
        .to_event(Utc::now());
        assert_eq!(event.opened_at, at);
    }

    #[test]
    fn text_outcome_leads_with_the_branch() {
        let at = chrono::NaiveDate::from_ymd_opt(2025, 2, 12)
            .and_then(|d| d.and_hms_opt(8, 0, 0))
            .expect("valid timestamp");
        let outcome = ProcessOutcome::Processed {
            event_id: 7,
            outcome: StreakOutcome::Started,
            gap_days: None,
            weekend_bonus: false,
            ledger: LedgerSnapshot::new("ana@example.com", &StreakLedger::started_at(at)),
        };
        let mut buf = Vec::new();
        write_outcome_text(&outcome, &mut buf).expect("render");
        let out = String::from_utf8(buf).expect("utf8");
        assert!(out.starts_with("started\tana@example.com\t1\t1\t1\t"));

        let mut buf = Vec::new();
        write_outcome_text(
            &ProcessOutcome::DuplicateSuppressed {
                fingerprint: "abc".into(),
            },
            &mut buf,
        )
        .expect("render");
        assert_eq!(String::from_utf8(buf).expect("utf8"), "duplicate\tabc\n");

        let mut buf = Vec::new();
        write_outcome_text(
            &ProcessOutcome::OutOfOrder { last_opened_at: at },
            &mut buf,
        )
        .expect("render");
        assert_eq!(
            String::from_utf8(buf).expect("utf8"),
            "out_of_order\t2025-02-12T08:00:00\n"
        );
    }
}

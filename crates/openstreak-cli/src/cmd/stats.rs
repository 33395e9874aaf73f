//! `openstreak stats`: engagement dashboard numbers.

use crate::cmd::open_existing_store;
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};
use anyhow::Result;
use chrono::NaiveDate;
use clap::Args;
use openstreak_core::db::query::{self, MetricsFilter};
use openstreak_core::event::UtmFields;
use std::io::Write;
use std::path::Path;

/// Arguments for `openstreak stats`. Filters combine with AND.
#[derive(Args, Debug, Default)]
pub struct StatsArgs {
    /// Only opens of this newsletter resource id.
    #[arg(long)]
    pub newsletter: Option<String>,

    /// First local day to count opens on (YYYY-MM-DD, inclusive).
    #[arg(long = "from", visible_alias = "start-date")]
    pub from: Option<NaiveDate>,

    /// Last local day to count opens on (YYYY-MM-DD, inclusive).
    #[arg(long = "to", visible_alias = "end-date")]
    pub to: Option<NaiveDate>,

    /// Only readers whose current streak is at least this.
    #[arg(long)]
    pub min_streak: Option<u32>,

    #[arg(long)]
    pub utm_source: Option<String>,

    #[arg(long)]
    pub utm_medium: Option<String>,

    #[arg(long)]
    pub utm_campaign: Option<String>,

    #[arg(long)]
    pub utm_channel: Option<String>,
}

impl StatsArgs {
    fn filter(&self) -> MetricsFilter {
        MetricsFilter {
            newsletter: self
                .newsletter
                .as_deref()
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string),
            start_date: self.from,
            end_date: self.to,
            min_streak: self.min_streak,
            utm: UtmFields {
                source: self.utm_source.clone(),
                medium: self.utm_medium.clone(),
                campaign: self.utm_campaign.clone(),
                channel: self.utm_channel.clone(),
            }
            .normalized(),
        }
    }
}

/// Execute `openstreak stats`.
pub fn run_stats(args: &StatsArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    if let (Some(from), Some(to)) = (args.from, args.to) {
        if from > to {
            anyhow::bail!("--from {from} is after --to {to}");
        }
    }

    let conn = open_existing_store(project_root)?;
    let metrics = query::engagement_metrics(&conn, &args.filter())?;

    render_mode(
        output,
        &metrics,
        |m, w| {
            writeln!(
                w,
                "{}\t{}\t{:.2}",
                m.total_readers, m.total_openings, m.average_streak
            )
        },
        |m, w| {
            pretty_section(w, "Engagement")?;
            pretty_kv(w, "Readers", m.total_readers.to_string())?;
            pretty_kv(w, "Opens", m.total_openings.to_string())?;
            pretty_kv(w, "Average streak", format!("{:.2}", m.average_streak))
        },
    )
}

use crate::cmd::{open_existing_store, or_dash};
use crate::output::{OutputMode, Renderable, render_list};
use anyhow::Result;
use clap::Args;
use openstreak_core::LedgerSnapshot;
use openstreak_core::config::EffectiveConfig;
use openstreak_core::db::query;
use std::io::{self, Write};
use std::path::Path;

#[derive(Args, Debug, Default)]
pub struct TopArgs {
    /// How many readers to list. Defaults to `reporting.top_readers_limit`.
    #[arg(long, short = 'n')]
    pub limit: Option<u32>,
}

impl Renderable for LedgerSnapshot {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(
            w,
            "{:<32} longest {:>4}  current {:>4}  life {:>3}  last {}",
            self.email,
            self.longest_streak,
            self.current_streak,
            self.life,
            or_dash(self.last_opened_date)
        )
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(
            w,
            "{}\t{}\t{}\t{}\t{}",
            self.email,
            self.longest_streak,
            self.current_streak,
            self.life,
            or_dash(self.last_opened_date)
        )
    }

    fn table_headers() -> &'static [&'static str] {
        &["EMAIL", "LONGEST", "CURRENT", "LIFE", "LAST_OPENED"]
    }
}

pub fn run_top(
    args: &TopArgs,
    output: OutputMode,
    project_root: &Path,
    config: &EffectiveConfig,
) -> Result<()> {
    let limit = args
        .limit
        .unwrap_or(config.project.reporting.top_readers_limit);
    let conn = open_existing_store(project_root)?;
    let readers = query::top_readers(&conn, limit)?;

    render_list(&readers, output, &format!("Top {limit} readers"))
}

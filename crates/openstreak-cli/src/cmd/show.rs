//! `openstreak show`: display one reader's streak ledger.

use crate::cmd::{open_existing_store, or_dash};
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};
use anyhow::Result;
use clap::Args;
use openstreak_core::LedgerSnapshot;
use openstreak_core::tracker::get_ledger;
use std::io::{self, Write};
use std::path::Path;

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Reader email address.
    pub email: String,
}

/// One tab-separated ledger row.
pub fn write_ledger_text(ledger: &LedgerSnapshot, w: &mut dyn Write) -> io::Result<()> {
    writeln!(
        w,
        "{}\t{}\t{}\t{}\t{}",
        ledger.email,
        ledger.current_streak,
        ledger.longest_streak,
        ledger.life,
        or_dash(ledger.last_opened_date)
    )
}

/// Aligned key/value block for one ledger.
pub fn write_ledger_pretty(ledger: &LedgerSnapshot, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(w, &format!("Reader {}", ledger.email))?;
    pretty_kv(w, "Current streak", ledger.current_streak.to_string())?;
    pretty_kv(w, "Longest streak", ledger.longest_streak.to_string())?;
    pretty_kv(w, "Life", ledger.life.to_string())?;
    pretty_kv(
        w,
        "Last opened",
        or_dash(
            ledger
                .last_opened_at
                .map(|at| at.format("%Y-%m-%d %H:%M:%S")),
        ),
    )
}

pub fn run_show(args: &ShowArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let conn = open_existing_store(project_root)?;
    let ledger = get_ledger(&conn, &args.email)?;

    render_mode(
        output,
        &ledger,
        write_ledger_text,
        write_ledger_pretty,
    )
}

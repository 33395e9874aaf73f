use crate::cmd::open_existing_store;
use crate::output::{OutputMode, Renderable, render_list};
use anyhow::Result;
use clap::Args;
use openstreak_core::db::query::{self, ReaderOpening};
use std::io::{self, Write};
use std::path::Path;

#[derive(Args, Debug)]
pub struct OpeningsArgs {
    /// Reader email address.
    pub email: String,
}

fn dash(value: &str) -> &str {
    if value.is_empty() { "-" } else { value }
}

impl Renderable for ReaderOpening {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        write!(
            w,
            "{}  {:<20}",
            self.opened_at.format("%Y-%m-%d %H:%M:%S"),
            self.resource_id
        )?;
        if !self.utm_source.is_empty() {
            write!(w, " source={}", self.utm_source)?;
        }
        if !self.utm_medium.is_empty() {
            write!(w, " medium={}", self.utm_medium)?;
        }
        if !self.utm_campaign.is_empty() {
            write!(w, " campaign={}", self.utm_campaign)?;
        }
        if !self.utm_channel.is_empty() {
            write!(w, " channel={}", self.utm_channel)?;
        }
        writeln!(w)
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(
            w,
            "{}\t{}\t{}\t{}\t{}\t{}",
            self.opened_at.to_rfc3339(),
            self.resource_id,
            dash(&self.utm_source),
            dash(&self.utm_medium),
            dash(&self.utm_campaign),
            dash(&self.utm_channel)
        )
    }

    fn table_headers() -> &'static [&'static str] {
        &["OPENED_AT", "NEWSLETTER", "SOURCE", "MEDIUM", "CAMPAIGN", "CHANNEL"]
    }
}

pub fn run_openings(args: &OpeningsArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let conn = open_existing_store(project_root)?;
    let email = args.email.trim();
    let openings = query::reader_openings(&conn, email)?;

    render_list(&openings, output, &format!("Opens by {email}"))
}

use crate::cmd::open_existing_store;
use crate::output::{OutputMode, Renderable, render, render_list};
use anyhow::Result;
use clap::Args;
use openstreak_core::db::query::{self, NewsletterRow};
use openstreak_core::error::TrackerError;
use std::io::{self, Write};
use std::path::Path;

#[derive(Args, Debug, Default)]
pub struct NewslettersArgs {
    /// Look up one newsletter by internal id.
    #[arg(long)]
    pub id: Option<i64>,
}

impl Renderable for NewsletterRow {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(w, "{:>6}  {}", self.id, self.resource_id)
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(w, "{}\t{}", self.id, self.resource_id)
    }

    fn table_headers() -> &'static [&'static str] {
        &["ID", "RESOURCE_ID"]
    }
}

pub fn run_newsletters(
    args: &NewslettersArgs,
    output: OutputMode,
    project_root: &Path,
) -> Result<()> {
    let conn = open_existing_store(project_root)?;

    let Some(id) = args.id else {
        let newsletters = query::list_newsletters(&conn)?;
        return render_list(&newsletters, output, "Newsletters");
    };

    let resource_id = query::newsletter_resource(&conn, id)?
        .ok_or_else(|| TrackerError::NewsletterNotFound(id.to_string()))?;
    let row = NewsletterRow { id, resource_id };
    render(output, &row, |r, w| r.render_table(w))
}

use crate::output::{OutputMode, pretty_kv, render_mode};
use anyhow::{Context as _, Result};
use clap::Args;
use openstreak_core::config::{self, CONFIG_FILE, STORE_DIR};
use openstreak_core::db;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Reinitialize even if `.openstreak/` already exists. Discards the store.
    #[arg(long)]
    pub force: bool,
}

const GITIGNORE: &str = "openstreak.db\nopenstreak.db-wal\nopenstreak.db-shm\n";

#[derive(Debug, Serialize)]
struct InitReport {
    config: PathBuf,
    database: PathBuf,
    reinitialized: bool,
}

/// Remove a database and its WAL side files, ignoring ones that are absent.
fn remove_store_files(db_path: &Path) -> Result<()> {
    for suffix in ["", "-wal", "-shm"] {
        let mut name = db_path.as_os_str().to_owned();
        name.push(suffix);
        let path = PathBuf::from(name);
        if path.exists() {
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to remove {}", path.display()))?;
        }
    }
    Ok(())
}

/// Execute `openstreak init`. Creates the project skeleton:
///
/// ```text
/// .openstreak/
///   config.toml     (default project config)
///   openstreak.db   (empty, migrated store)
///   .gitignore      (the database and its WAL files)
/// ```
///
/// # Errors
///
/// Returns an error if `.openstreak/` already exists and `--force` is not
/// set, or if any filesystem or database operation fails.
pub fn run_init(args: &InitArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let store_dir = project_root.join(STORE_DIR);
    let existed = store_dir.exists();

    if existed && !args.force {
        anyhow::bail!("{STORE_DIR}/ already exists. Use `openstreak init --force` to reinitialize.");
    }

    std::fs::create_dir_all(&store_dir)
        .with_context(|| format!("Failed to create {}", store_dir.display()))?;

    let config_path = store_dir.join(CONFIG_FILE);
    std::fs::write(&config_path, config::default_config_toml())
        .with_context(|| format!("Failed to write config: {}", config_path.display()))?;

    let gitignore_path = store_dir.join(".gitignore");
    std::fs::write(&gitignore_path, GITIGNORE)
        .with_context(|| format!("Failed to write .gitignore: {}", gitignore_path.display()))?;

    let db_path = config::database_path(project_root);
    if args.force {
        remove_store_files(&db_path)?;
    }
    drop(db::open_store(&db_path)?);
    tracing::info!(path = %db_path.display(), "store initialized");

    let report = InitReport {
        config: config_path,
        database: db_path,
        reinitialized: existed,
    };

    render_mode(
        output,
        &report,
        |r, w| {
            writeln!(w, "config\t{}", r.config.display())?;
            writeln!(w, "database\t{}", r.database.display())
        },
        |r, w| {
            writeln!(w, "✓ Initialized {STORE_DIR}/ project structure.")?;
            writeln!(w)?;
            pretty_kv(w, "Config", r.config.display().to_string())?;
            pretty_kv(w, "Database", r.database.display().to_string())?;
            writeln!(w)?;
            writeln!(w, "Next steps:")?;
            writeln!(w, "  Record an open:")?;
            writeln!(
                w,
                "    openstreak open --email reader@example.com --newsletter post_1"
            )?;
            writeln!(w)?;
            writeln!(w, "  Or stream webhook bodies in, one JSON object per line:")?;
            writeln!(w, "    openstreak ingest --file hooks.jsonl")
        },
    )
}

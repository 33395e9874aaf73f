#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{Parser, Subcommand};
use openstreak_core::config::{self, EffectiveConfig};
use openstreak_core::error::ErrorCode;
use output::{CliError, OutputMode, render_error};
use std::env;
use std::path::Path;
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Exit status for events rejected as malformed.
const EXIT_REJECTED: u8 = 2;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "openstreak: newsletter reading streaks",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Setup",
        about = "Initialize an openstreak project",
        long_about = "Create .openstreak/ with a default config and an empty store.",
        after_help = "EXAMPLES:\n    # Initialize in the current directory\n    openstreak init\n\n    # Start over with an empty store\n    openstreak init --force"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        next_help_heading = "Tracking",
        about = "Record one newsletter open",
        long_about = "Process a single open event: dedup, streak update, persist.",
        after_help = "EXAMPLES:\n    # Record an open now\n    openstreak open --email ana@example.com --newsletter post_123\n\n    # Record an open at a given time with attribution\n    openstreak open --email ana@example.com --newsletter post_123 \\\n        --at 2025-02-12T08:00:00Z --utm-source tiktok"
    )]
    Open(cmd::open::OpenArgs),

    #[command(
        next_help_heading = "Tracking",
        about = "Process a stream of webhook payloads",
        long_about = "Read one JSON webhook payload per line and process each as an open event.\nDuplicates within the dedup window are suppressed across lines.",
        after_help = "EXAMPLES:\n    # Pipe webhook bodies in\n    tail -f hooks.jsonl | openstreak ingest\n\n    # Read from a file\n    openstreak ingest --file hooks.jsonl --json"
    )]
    Ingest(cmd::ingest::IngestArgs),

    #[command(
        next_help_heading = "Readers",
        about = "Show a reader's streak",
        long_about = "Show the current streak ledger for one reader.",
        after_help = "EXAMPLES:\n    openstreak show ana@example.com\n    openstreak show ana@example.com --json"
    )]
    Show(cmd::show::ShowArgs),

    #[command(
        next_help_heading = "Readers",
        about = "List a reader's opens",
        long_about = "List every recorded open for one reader, oldest first.",
        after_help = "EXAMPLES:\n    openstreak openings ana@example.com"
    )]
    Openings(cmd::openings::OpeningsArgs),

    #[command(
        next_help_heading = "Reporting",
        about = "Engagement metrics",
        long_about = "Total readers, total opens and average streak, with optional filters.",
        after_help = "EXAMPLES:\n    # Everything\n    openstreak stats\n\n    # One newsletter in February, readers on a 3+ day streak\n    openstreak stats --newsletter post_123 --from 2025-02-01 --to 2025-02-28 --min-streak 3"
    )]
    Stats(cmd::stats::StatsArgs),

    #[command(
        next_help_heading = "Reporting",
        about = "Top readers by longest streak",
        after_help = "EXAMPLES:\n    openstreak top\n    openstreak top --limit 25 --json"
    )]
    Top(cmd::top::TopArgs),

    #[command(
        next_help_heading = "Reporting",
        about = "List known newsletters",
        after_help = "EXAMPLES:\n    openstreak newsletters\n    openstreak newsletters --id 3"
    )]
    Newsletters(cmd::newsletters::NewslettersArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("OPENSTREAK_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "openstreak=debug,openstreak_core=debug,info"
        } else {
            "openstreak=info,openstreak_core=info,warn"
        })
    });

    let format = env::var("OPENSTREAK_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn run(
    command: Commands,
    config: &EffectiveConfig,
    output: OutputMode,
    quiet: bool,
    project_root: &Path,
) -> anyhow::Result<()> {
    match command {
        Commands::Init(args) => cmd::init::run_init(&args, output, project_root),
        Commands::Open(args) => cmd::open::run_open(&args, output, project_root, config),
        Commands::Ingest(args) => {
            cmd::ingest::run_ingest(&args, output, quiet, project_root, config)
        }
        Commands::Show(args) => cmd::show::run_show(&args, output, project_root),
        Commands::Openings(args) => cmd::openings::run_openings(&args, output, project_root),
        Commands::Stats(args) => cmd::stats::run_stats(&args, output, project_root),
        Commands::Top(args) => cmd::top::run_top(&args, output, project_root, config),
        Commands::Newsletters(args) => {
            cmd::newsletters::run_newsletters(&args, output, project_root)
        }
    }
}

/// Exit status for a failed command.
fn exit_code_for(error: &CliError) -> ExitCode {
    if error.error_code.as_deref() == Some(ErrorCode::MissingField.as_str()) {
        ExitCode::from(EXIT_REJECTED)
    } else {
        ExitCode::FAILURE
    }
}

fn report(output: OutputMode, error: &CliError) -> ExitCode {
    if render_error(output, error).is_err() {
        eprintln!("error: {}", error.message);
    }
    exit_code_for(error)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let project_root = match env::current_dir() {
        Ok(dir) => dir,
        Err(err) => {
            return report(
                OutputMode::fallback(cli.json),
                &CliError::new(format!("cannot read current directory: {err}")),
            );
        }
    };

    let config = match config::resolve_config(&project_root, cli.json) {
        Ok(config) => config,
        Err(err) => {
            let code = ErrorCode::ConfigParseError;
            let error = CliError {
                message: format!("{err:#}"),
                suggestion: code.hint().map(str::to_string),
                error_code: Some(code.as_str().to_string()),
                code: Some(code.code().to_string()),
            };
            return report(OutputMode::fallback(cli.json), &error);
        }
    };
    let output = OutputMode::from_resolved(&config.resolved_output);
    debug!(output = %config.resolved_output, "resolved output mode");

    match run(cli.command, &config, output, cli.quiet, &project_root) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            debug!(error = ?err, "command failed");
            report(output, &CliError::from_anyhow(&err))
        }
    }
}

//! Job-Harvester main entry point
//!
//! This is the command-line interface for the job-advertisement harvester.

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use job_harvester::config::{load_config_with_hash, Config};
use job_harvester::maintenance::{
    backfill, reanalyze, refresh_keywords, AnalysisOptions, BackfillOptions, RefreshMode,
};
use job_harvester::output::{
    load_statistics, no_source_progressed, print_analysis_summary, print_backfill_summary,
    print_run_summary, print_statistics,
};
use job_harvester::storage::IdRange;
use job_harvester::{EngineRegistry, MatchScope, SourcePool, SqliteStorage};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Job-Harvester: a polite job-advertisement harvester
///
/// Job-Harvester walks the sitemaps of job portals while respecting
/// robots.txt and per-source rate limits, extracts structured fields from
/// every advertisement and tags them with configured keyword rules.
#[derive(Parser, Debug)]
#[command(name = "job-harvester")]
#[command(version = "1.0.0")]
#[command(about = "A polite job-advertisement harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, value_name = "CONFIG", default_value = "harvest.toml")]
    config: PathBuf,

    /// Database file overriding `database-path` from the configuration
    #[arg(short, long, value_name = "DB")]
    database: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Harvest every configured source concurrently
    Harvest,

    /// Re-tag stored advertisements with the configured keywords
    Analyze(AnalyzeArgs),

    /// Re-extract fields from stored advertisements without re-fetching
    Update(UpdateArgs),

    /// Show statistics from the database and exit
    Stats,
}

#[derive(Args, Debug)]
struct RangeArgs {
    /// Lowest advertisement id to include
    #[arg(long)]
    min_id: Option<i64>,

    /// Highest advertisement id to include
    #[arg(long)]
    max_id: Option<i64>,

    /// Advertisements per commit
    #[arg(short, long, default_value_t = 100)]
    batch_size: usize,
}

impl RangeArgs {
    fn range(&self) -> IdRange {
        IdRange::new(self.min_id, self.max_id)
    }
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// Fields searched for keywords
    #[arg(long, value_parser = parse_scope)]
    scope: MatchScope,

    /// Keep stored keywords and tags instead of replacing them
    #[arg(long)]
    no_reset: bool,

    #[command(flatten)]
    range: RangeArgs,
}

#[derive(Args, Debug)]
struct UpdateArgs {
    /// Overwrite fields that are already set
    #[arg(long)]
    force: bool,

    #[command(flatten)]
    range: RangeArgs,
}

fn parse_scope(value: &str) -> Result<MatchScope, String> {
    value.parse()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if let Some(database) = &cli.database {
        config.harvest.database_path = database.display().to_string();
    }

    match cli.command {
        Command::Harvest => handle_harvest(config).await,
        Command::Analyze(args) => handle_analyze(&config, &args),
        Command::Update(args) => handle_update(&config, &args),
        Command::Stats => handle_stats(&config),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("job_harvester=info,warn"),
            1 => EnvFilter::new("job_harvester=debug,info"),
            2 => EnvFilter::new("job_harvester=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn open_storage(config: &Config) -> anyhow::Result<SqliteStorage> {
    let path = Path::new(&config.harvest.database_path);
    SqliteStorage::open(path, config.harvest.busy_timeout())
        .with_context(|| format!("failed to open database {}", path.display()))
}

/// Handles the `harvest` command: one worker per source
async fn handle_harvest(config: Config) -> anyhow::Result<()> {
    let registry = EngineRegistry::with_defaults();
    let pool = SourcePool::new(&config, &registry)?;

    {
        let mut storage = open_storage(&config)?;
        refresh_keywords(&mut storage, &config.keywords, RefreshMode::Incremental)?;
    }

    tracing::info!(
        "Harvesting {} sources into {} (match scope: {})",
        pool.len(),
        config.harvest.database_path,
        config.harvest.match_scope
    );

    let reports = pool.run().await;
    print_run_summary(&reports);

    if no_source_progressed(&reports) {
        bail!("every source failed");
    }
    Ok(())
}

/// Handles the `analyze` command: keyword refresh followed by re-tagging
fn handle_analyze(config: &Config, args: &AnalyzeArgs) -> anyhow::Result<()> {
    let mut storage = open_storage(config)?;

    let mode = if args.no_reset {
        RefreshMode::Incremental
    } else {
        RefreshMode::Full
    };
    refresh_keywords(&mut storage, &config.keywords, mode)?;

    let summary = reanalyze(
        &mut storage,
        AnalysisOptions {
            range: args.range.range(),
            scope: args.scope,
            batch_size: args.range.batch_size,
        },
    )?;
    print_analysis_summary(&summary);
    Ok(())
}

/// Handles the `update` command: field back-fill from stored bodies
fn handle_update(config: &Config, args: &UpdateArgs) -> anyhow::Result<()> {
    let mut storage = open_storage(config)?;
    let summary = backfill(
        &mut storage,
        &EngineRegistry::with_defaults(),
        BackfillOptions {
            range: args.range.range(),
            force: args.force,
            batch_size: args.range.batch_size,
        },
    )?;
    print_backfill_summary(&summary);
    Ok(())
}

/// Handles the `stats` command
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.harvest.database_path);

    let storage = open_storage(config)?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

//! Crawl Engine main entry point
//!
//! This is the command-line interface for creating and running crawl jobs.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use crawl_engine::config::{load_config_with_hash, CrawlJobConfig, EngineConfig};
use crawl_engine::job::NewJob;
use crawl_engine::output::{load_statistics, print_job_list, print_run_summary, print_statistics};
use crawl_engine::storage::{open_storage, SqliteStorage, Storage};
use crawl_engine::{Engine, JobId, StartOutcome};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Crawl Engine: polite, bounded, resumable crawl jobs
///
/// Jobs are stored in the SQLite database named in the config file. Each run
/// walks the job's site breadth-first and records what changed since the
/// previous completed run.
#[derive(Parser, Debug)]
#[command(name = "crawl-engine")]
#[command(version)]
#[command(about = "Runs declarative crawl jobs", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

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
    /// Create a job from a JSON job file
    Add {
        /// File holding `{ "name", "config", "schedule"? }`
        #[arg(value_name = "JOB_FILE")]
        job_file: PathBuf,
    },

    /// Run a job to completion (Ctrl-C cancels)
    Run {
        job_id: JobId,

        /// Resolve and print the job config without crawling
        #[arg(long)]
        dry_run: bool,
    },

    /// Show a job's status, counters and run history
    Status { job_id: JobId },

    /// List all jobs
    List,

    /// Print the next scheduled run time of a job
    NextRun { job_id: JobId },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::debug!("Configuration hash: {}", hash);

    let storage = open_storage(Path::new(&config.output.database_path))
        .with_context(|| format!("Failed to open database {}", config.output.database_path))?;

    match cli.command {
        Command::Add { job_file } => handle_add(storage, config, &job_file),
        Command::Run { job_id, dry_run } if dry_run => handle_dry_run(&storage, job_id),
        Command::Run { job_id, .. } => handle_run(storage, config, job_id).await,
        Command::Status { job_id } => {
            print_statistics(&load_statistics(&storage, job_id)?);
            Ok(())
        }
        Command::List => {
            print_job_list(&storage.list_jobs()?);
            Ok(())
        }
        Command::NextRun { job_id } => handle_next_run(&storage, job_id),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("crawl_engine=info,warn"),
            1 => EnvFilter::new("crawl_engine=debug,info"),
            2 => EnvFilter::new("crawl_engine=trace,debug"),
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

fn handle_add(storage: SqliteStorage, config: EngineConfig, job_file: &Path) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(job_file)
        .with_context(|| format!("Failed to read job file {}", job_file.display()))?;
    let job: NewJob = serde_json::from_str(&content)
        .with_context(|| format!("Invalid job file {}", job_file.display()))?;

    // Reject configs that could never start
    CrawlJobConfig::resolve(&job.config)?;

    let engine = Engine::new(storage, config)?;
    let job_id = engine.create_job(&job)?;
    println!("Created job {} ({})", job_id, job.name);
    Ok(())
}

/// Handles `run --dry-run`: shows the resolved config
fn handle_dry_run(storage: &SqliteStorage, job_id: JobId) -> anyhow::Result<()> {
    let Some(job) = storage.get_job(job_id)? else {
        bail!("Job {} not found", job_id);
    };
    let config = CrawlJobConfig::resolve(&job.config)?;

    println!("=== Dry Run: job {} ({}) ===\n", job.id, job.name);
    println!("Start URL: {}", config.start_url);
    println!("Domain restriction: {:?}", config.domain_restriction);
    println!("Max pages: {}", config.max_pages);
    println!("Max depth: {}", config.max_depth);
    println!("Request delay: {}ms", config.request_delay.as_millis());
    println!("Workers: {}", config.max_concurrent);
    println!("Content types: {}", config.content_types.join(", "));
    println!("Auth: {:?}", config.auth);

    println!("\nInclude patterns ({}):", config.include_patterns.len());
    for pattern in &config.include_patterns {
        println!("  - {}", pattern.as_str());
    }
    println!("\nExclude patterns ({}):", config.exclude_patterns.len());
    for pattern in &config.exclude_patterns {
        println!("  - {}", pattern.as_str());
    }

    println!("\n✓ Job configuration is valid (current status: {})", job.status);
    Ok(())
}

/// Handles the main crawl operation
async fn handle_run(storage: SqliteStorage, config: EngineConfig, job_id: JobId) -> anyhow::Result<()> {
    let engine = Engine::new(storage, config)?;

    let recovered = engine.recover_interrupted_runs()?;
    if !recovered.is_empty() {
        tracing::warn!("Marked {} interrupted run(s) as failed", recovered.len());
    }

    if engine.start(job_id)? == StartOutcome::AlreadyRunning {
        bail!("Job {} is already running", job_id);
    }

    let job = tokio::select! {
        job = engine.wait(job_id) => job?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, cancelling job {}", job_id);
            engine.cancel(job_id)?;
            engine.wait(job_id).await?
        }
    };

    let history = engine
        .storage()
        .lock()
        .map_err(|e| anyhow::anyhow!("storage lock poisoned: {}", e))?
        .run_history(job_id)?;
    match history.last() {
        Some(record) => print_run_summary(record),
        None => println!("Job {} finished with status {}", job.id, job.status),
    }

    Ok(())
}

fn handle_next_run(storage: &SqliteStorage, job_id: JobId) -> anyhow::Result<()> {
    let Some(job) = storage.get_job(job_id)? else {
        bail!("Job {} not found", job_id);
    };

    match job
        .schedule
        .as_ref()
        .and_then(|schedule| schedule.next_run_after(chrono::Utc::now()))
    {
        Some(next) => println!("Next run of job {}: {}", job.id, next.to_rfc3339()),
        None => println!("Job {} has no enabled schedule", job.id),
    }
    Ok(())
}

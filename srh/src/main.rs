//! Service Restart Harness - state inspector.
//!
//! A wedged scenario can leave phase and guard records (and a service home)
//! behind in the temp directory, which then confuses the next run: a stale
//! phase resumes mid-scenario, a lingering guard trips the loop bound. This
//! tool shows what is on disk and clears it.

use anyhow::Result;
use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand};
use srh_common::{GuardCounter, HarnessConfig, ServiceHome, StatusStore};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "srh")]
#[command(author, version, about = "Service restart harness - durable state inspector")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the stored phase record
    Status,

    /// Show the restart guard count
    Guard,

    /// Show the paths the harness uses
    Paths,

    /// Delete the phase record, guard record, and service home
    Reset {
        /// Keep the service home directory
        #[arg(long)]
        keep_home: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("srh={default_level},srh_common={default_level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .init();

    let config = HarnessConfig::from_env();
    tracing::debug!(base_dir = %config.base_dir.display(), "resolved harness configuration");

    match cli.command {
        Commands::Status => show_status(&config),
        Commands::Guard => show_guard(&config),
        Commands::Paths => {
            println!("status: {}", config.status_path().display());
            println!("guard:  {}", config.guard_path().display());
            println!("home:   {}", config.home_path().display());
            Ok(())
        }
        Commands::Reset { keep_home } => reset(&config, keep_home),
    }
}

fn show_status(config: &HarnessConfig) -> Result<()> {
    let store = StatusStore::new(config.status_path(), config.staleness_threshold);
    match store.peek()? {
        None => println!("no phase record at {}", config.status_path().display()),
        Some(snapshot) => {
            println!("phase:   {}", snapshot.phase);
            println!(
                "written: {} ({} ago)",
                format_timestamp(snapshot.timestamp_ms),
                humantime::format_duration(truncate_to_seconds(snapshot.age)),
            );
            println!("stale:   {}", if snapshot.stale { "yes" } else { "no" });
        }
    }
    Ok(())
}

fn show_guard(config: &HarnessConfig) -> Result<()> {
    let guard = GuardCounter::new(config.guard_path());
    let count = guard.read()?;
    println!("restarts: {count} (bound: {})", config.max_restarts);
    Ok(())
}

fn reset(config: &HarnessConfig, keep_home: bool) -> Result<()> {
    StatusStore::new(config.status_path(), config.staleness_threshold).clear()?;
    GuardCounter::new(config.guard_path()).clear()?;
    println!("cleared phase and guard records");

    if !keep_home {
        ServiceHome::new(config.home_path()).remove()?;
        println!("removed service home {}", config.home_path().display());
    }
    Ok(())
}

fn format_timestamp(timestamp_ms: i64) -> String {
    match Utc.timestamp_millis_opt(timestamp_ms).single() {
        Some(instant) => instant.to_rfc3339(),
        None => format!("epoch-millis {timestamp_ms}"),
    }
}

fn truncate_to_seconds(duration: std::time::Duration) -> std::time::Duration {
    std::time::Duration::from_secs(duration.as_secs())
}

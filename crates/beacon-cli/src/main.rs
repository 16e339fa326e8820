//! Beacon binary entry point.
//!
//! Usage: beacon [--config <file>] [--app-key <key>] <track|inspect|drain>

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

/// Beacon: client-side telemetry pipeline.
#[derive(Parser, Debug)]
#[command(name = "beacon")]
#[command(about = "Track, inspect and drain Beacon telemetry events")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON config file. Defaults to `<cache dir>/beacon/config.json` when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// App key, `{prefix}-{region}-{id}`.
    #[arg(long, env = "BEACON_APP_KEY", global = true)]
    app_key: Option<String>,

    /// Collector URL for self-hosted (SH) app keys.
    #[arg(long, env = "BEACON_HOST", global = true)]
    host: Option<String>,

    /// Directory holding the durable event log.
    #[arg(long, env = "BEACON_CACHE_DIR", global = true)]
    cache_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Track one event and wait for delivery
    Track {
        /// Event name
        name: String,

        /// Property as key=value (repeatable). JSON scalars are kept typed.
        #[arg(short, long = "prop", value_parser = commands::parse_prop)]
        props: Vec<(String, serde_json::Value)>,

        /// Queue through the on-disk log
        #[arg(long)]
        persist: bool,

        /// Seconds to wait for delivery before leaving the event queued
        #[arg(long, default_value = "10")]
        timeout_secs: u64,
    },
    /// List the unconsumed entries of the durable log
    Inspect,
    /// Deliver the durable backlog, then exit
    Drain {
        /// Seconds to wait for the backlog to empty
        #[arg(long, default_value = "30")]
        timeout_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    observability::init_with_config(observability::LogConfig {
        service_name: "beacon".into(),
        default_level: cli.log_level.clone(),
        also_stderr: true,
        ..Default::default()
    });

    let mut config = commands::build_config(
        cli.config.as_deref(),
        cli.app_key,
        cli.host,
        cli.cache_dir,
    )?;

    info!(
        app_key = %config.app_key,
        persistence = config.enable_persistence,
        crash_reporting = config.enable_crash_reporting,
        "Configuration loaded"
    );

    match cli.command {
        Commands::Track {
            name,
            props,
            persist,
            timeout_secs,
        } => {
            config.enable_persistence |= persist;
            commands::track(&config, &name, props, timeout_secs).await
        }
        Commands::Inspect => commands::inspect(&config),
        Commands::Drain { timeout_secs } => commands::drain(&config, timeout_secs).await,
    }
}

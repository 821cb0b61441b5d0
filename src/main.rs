//! Command line interface for the calendar bot. Fetches "on this day" events
//! from the calendar API and publishes them to the configured Nostr relays as
//! text notes and picture posts.

mod api;
mod calendar;
mod config;
mod event;
mod media;
mod metrics;
mod notes;
mod publish;
mod run;

use std::{fs, path::Path};

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use config::Settings;
use metrics::RunMetrics;
use publish::Publisher;
use run::Pacing;

/// Command line interface entry point.
#[derive(Parser)]
#[command(
    name = "chronostr",
    author,
    version,
    about = "Publishes on-this-day calendar events to Nostr relays"
)]
struct Cli {
    /// Path to the `.env` configuration file.
    #[arg(long, default_value = ".env")]
    env: String,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Write a default `.env` file if none exists.
    Init,
    /// Fetch today's events and publish them to the configured relays.
    Run {
        /// Name of the environment variable holding the signing key (hex).
        #[arg(long, default_value = "NOSTR_PRIVATE_KEY")]
        key_env: String,
    },
}

/// Execute the selected CLI subcommand.
async fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init => {
            ensure_env_file(&cli.env)?;
            info!(path = %cli.env, "configuration file ready");
        }
        Commands::Run { key_env } => {
            ensure_env_file(&cli.env)?;
            let cfg = Settings::from_env(&cli.env, &key_env)?;
            run_once(&cfg).await?;
        }
    }
    Ok(())
}

/// Drive one full run and export metrics regardless of the outcome.
async fn run_once(cfg: &Settings) -> Result<()> {
    let client = api::Client::new(&cfg.api_endpoint, &cfg.api_key)?;
    let publisher = Publisher::new(
        cfg.relays.clone(),
        cfg.private_key.clone(),
        cfg.tor_socks.clone(),
    );
    let pacing = Pacing {
        delay: cfg.event_pause,
    };
    let mut metrics = RunMetrics::default();
    let today = Utc::now().date_naive();
    info!(date = %today, language = %cfg.language, relays = cfg.relays.len(), "starting run");

    let result = run::run_day(
        &client,
        &publisher,
        &pacing,
        &mut metrics,
        today,
        &cfg.language,
    )
    .await;

    metrics.log_summary();
    let stamp = Utc::now().format("%Y-%m-%d_%H-%M-%S");
    let name = if result.is_ok() {
        format!("metrics_run_{stamp}.json")
    } else {
        format!("metrics_error_{stamp}.json")
    };
    let path = cfg.metrics_dir.join(name);
    match metrics.export(&path) {
        Ok(()) => info!(path = %path.display(), "metrics exported"),
        Err(e) => warn!(error = %e, "failed to export metrics"),
    }
    result
}

/// Create a default `.env` file if one is not already present at `path`.
fn ensure_env_file(path: &str) -> Result<()> {
    let env_path = Path::new(path);
    if env_path.exists() {
        return Ok(());
    }
    if let Some(parent) = env_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut content = String::new();
    content.push_str("API_ENDPOINT=http://127.0.0.1:8080/api\n");
    content.push_str("API_KEY=\n");
    content.push_str("LANGUAGE=en\n");
    content.push_str("RELAYS=wss://relay.damus.io,wss://nos.lol\n");
    content.push_str("TOR_SOCKS=\n");
    content.push_str("METRICS_DIR=metrics-logs\n");
    content.push_str("EVENT_PAUSE_SECS=1800\n");
    fs::write(env_path, content)?;
    Ok(())
}

#[cfg(not(test))]
#[tokio::main]
async fn main() -> Result<()> {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();
    execute(cli).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn env_file_is_created_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("conf/.env");
        let path_str = path.to_str().unwrap();

        ensure_env_file(path_str).unwrap();
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("API_ENDPOINT="));
        assert!(written.contains("RELAYS="));

        fs::write(&path, "API_ENDPOINT=custom\n").unwrap();
        ensure_env_file(path_str).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "API_ENDPOINT=custom\n");
    }
}

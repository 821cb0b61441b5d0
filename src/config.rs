//! Configuration loading from `.env` files.

use std::{env, path::PathBuf, time::Duration};

use anyhow::{bail, Context, Result};

/// Runtime settings derived from environment variables.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base URL of the calendar API, e.g. `https://api.example.com/api`.
    pub api_endpoint: String,
    /// API key sent with every calendar request.
    pub api_key: String,
    /// Language of the events to process.
    pub language: String,
    /// Relays to publish to.
    pub relays: Vec<String>,
    /// Optional Tor SOCKS proxy (host:port) for relay connections.
    pub tor_socks: Option<String>,
    /// Directory for end-of-run metrics exports.
    pub metrics_dir: PathBuf,
    /// Pause after an event whose text note was published.
    pub event_pause: Duration,
    /// Hex-encoded signing key, read from the process environment rather than
    /// the `.env` file.
    pub private_key: String,
}

impl Settings {
    /// Load settings from the specified `.env` file. The signing key is read
    /// from the environment variable named by `key_env` so the secret never
    /// has to live in the file.
    pub fn from_env(path: &str, key_env: &str) -> Result<Self> {
        dotenvy::from_filename(path).context("reading env file")?;
        let api_endpoint = env::var("API_ENDPOINT").context("API_ENDPOINT")?;
        let api_key = env::var("API_KEY").context("API_KEY")?;
        let language = env::var("LANGUAGE").unwrap_or_else(|_| "en".into());
        let relays = csv_strings(env::var("RELAYS").unwrap_or_default());
        if relays.is_empty() {
            bail!("RELAYS must list at least one relay");
        }
        let tor_socks = env::var("TOR_SOCKS").ok().filter(|s| !s.is_empty());
        let metrics_dir =
            PathBuf::from(env::var("METRICS_DIR").unwrap_or_else(|_| "metrics-logs".into()));
        let event_pause = Duration::from_secs(
            env::var("EVENT_PAUSE_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1800),
        );
        let private_key = env::var(key_env)
            .with_context(|| format!("private key environment variable {key_env}"))?;
        if private_key.trim().is_empty() {
            bail!("private key environment variable {key_env} is empty");
        }
        Ok(Self {
            api_endpoint,
            api_key,
            language,
            relays,
            tor_socks,
            metrics_dir,
            event_pause,
            private_key,
        })
    }
}

/// Split a comma-separated string into trimmed string values.
pub fn csv_strings(input: impl AsRef<str>) -> Vec<String> {
    let s = input.as_ref();
    s.split(',')
        .filter_map(|s| {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        })
        .collect()
}

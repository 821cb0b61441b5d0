//! Run-level metrics aggregation and export.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

/// Outcome of a single relay publish attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayOutcome {
    /// Relay endpoint address.
    pub relay: String,
    /// Whether the relay acknowledged acceptance.
    pub accepted: bool,
    /// Wall time from connect to acknowledgment, for accepted publishes.
    pub latency: Option<Duration>,
}

/// Counters aggregated over one bot run and exported as JSON at the end.
///
/// The run is single-writer: the orchestrator and publisher mutate this
/// through `&mut`, so no locking is involved.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMetrics {
    /// Fetched events whose month-day did not match today's.
    pub events_skipped: u64,
    pub text_notes_posted: u64,
    pub text_notes_failed: u64,
    pub picture_notes_posted: u64,
    pub picture_notes_failed: u64,
    /// Events with no qualifying image for a picture note.
    pub picture_notes_skipped: u64,
    pub relay_successes: BTreeMap<String, u64>,
    pub relay_failures: BTreeMap<String, u64>,
    /// Publish latencies in milliseconds for accepted publishes, per relay.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub relay_publish_millis: BTreeMap<String, Vec<u64>>,
}

impl RunMetrics {
    /// Fold one relay attempt into the per-relay tallies.
    pub fn record_relay(&mut self, outcome: &RelayOutcome) {
        if outcome.accepted {
            *self.relay_successes.entry(outcome.relay.clone()).or_default() += 1;
            if let Some(latency) = outcome.latency {
                self.relay_publish_millis
                    .entry(outcome.relay.clone())
                    .or_default()
                    .push(latency.as_millis() as u64);
            }
        } else {
            *self.relay_failures.entry(outcome.relay.clone()).or_default() += 1;
        }
    }

    /// Log the aggregated counts at the end of a run.
    pub fn log_summary(&self) {
        info!(
            events_skipped = self.events_skipped,
            text_notes_posted = self.text_notes_posted,
            text_notes_failed = self.text_notes_failed,
            picture_notes_posted = self.picture_notes_posted,
            picture_notes_failed = self.picture_notes_failed,
            picture_notes_skipped = self.picture_notes_skipped,
            relay_successes = ?self.relay_successes,
            relay_failures = ?self.relay_failures,
            "run metrics summary"
        );
    }

    /// Write the metrics as pretty JSON, creating the parent directory if
    /// needed.
    pub fn export(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("creating metrics directory")?;
        }
        let data = serde_json::to_string_pretty(self).context("serializing metrics")?;
        fs::write(path, data).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn outcome(relay: &str, accepted: bool) -> RelayOutcome {
        RelayOutcome {
            relay: relay.into(),
            accepted,
            latency: accepted.then(|| Duration::from_millis(42)),
        }
    }

    #[test]
    fn relay_tallies_accumulate() {
        let mut metrics = RunMetrics::default();
        metrics.record_relay(&outcome("ws://a", true));
        metrics.record_relay(&outcome("ws://a", true));
        metrics.record_relay(&outcome("ws://a", false));
        metrics.record_relay(&outcome("ws://b", false));
        assert_eq!(metrics.relay_successes["ws://a"], 2);
        assert_eq!(metrics.relay_failures["ws://a"], 1);
        assert_eq!(metrics.relay_failures["ws://b"], 1);
        assert!(!metrics.relay_successes.contains_key("ws://b"));
        assert_eq!(metrics.relay_publish_millis["ws://a"], vec![42, 42]);
    }

    #[test]
    fn export_writes_json_and_creates_directory() {
        let dir = TempDir::new().unwrap();
        let mut metrics = RunMetrics::default();
        metrics.text_notes_posted = 3;
        metrics.record_relay(&outcome("ws://a", true));

        let path = dir.path().join("nested/metrics.json");
        metrics.export(&path).unwrap();

        let parsed: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed["textNotesPosted"], 3);
        assert_eq!(parsed["relaySuccesses"]["ws://a"], 1);
    }
}

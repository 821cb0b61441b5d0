//! One bot run: fetch today's events and drive the build/publish pipeline.

use std::time::Duration;

use anyhow::Result;
use chrono::{Datelike, NaiveDate};
use tracing::{debug, info, warn};

use crate::api::Client;
use crate::calendar::SourceEvent;
use crate::media::select_picture;
use crate::metrics::RunMetrics;
use crate::notes;
use crate::publish::Publisher;

/// Inter-event pacing policy: how long to pause between events and which
/// publish result triggers it. Pacing keeps the bot from flooding relays and
/// followers when many events share a date.
pub struct Pacing {
    pub delay: Duration,
}

impl Pacing {
    /// Pause only when the text note reached at least one relay. A
    /// picture-only success does not pace the run.
    pub fn after_event(&self, text_posted: bool) -> Option<Duration> {
        text_posted.then_some(self.delay)
    }
}

/// Process every fetched event whose month and day match `today`,
/// sequentially.
///
/// The only error is a failed fetch; everything downstream is absorbed into
/// the metrics.
pub async fn run_day(
    client: &Client,
    publisher: &Publisher,
    pacing: &Pacing,
    metrics: &mut RunMetrics,
    today: NaiveDate,
    language: &str,
) -> Result<()> {
    let events = client
        .fetch_events(today.month(), today.day(), language)
        .await?;
    info!(count = events.len(), date = %today, "fetched calendar events");

    let mut matched = 0;
    for event in &events {
        // Historical events recur yearly, so only the month and day count.
        if (event.date.month(), event.date.day()) != (today.month(), today.day()) {
            metrics.events_skipped += 1;
            debug!(id = event.id, date = %event.date, "skipping event not on today's month-day");
            continue;
        }
        matched += 1;
        let text_posted = process_event(event, publisher, metrics).await;
        if let Some(delay) = pacing.after_event(text_posted) {
            info!(seconds = delay.as_secs(), "pausing before the next event");
            tokio::time::sleep(delay).await;
        }
    }
    if matched == 0 {
        info!("no events matched today's month-day");
    }
    Ok(())
}

/// Build and publish both note kinds for one event. Both attempts always run;
/// neither outcome gates the other. Returns whether the text note reached at
/// least one relay.
async fn process_event(
    event: &SourceEvent,
    publisher: &Publisher,
    metrics: &mut RunMetrics,
) -> bool {
    info!(id = event.id, title = %event.title, olas = event.olas, "processing event");
    let tags = event.tags.normalize();
    let media = event.media.normalize();
    let references = event.references.normalize();

    let draft = notes::text_note(event, &tags, &media, &references);
    let text_posted = match publisher.publish(&draft, metrics).await {
        Ok(n) if n > 0 => {
            metrics.text_notes_posted += 1;
            true
        }
        Ok(_) => {
            warn!(id = event.id, "text note reached no relay");
            metrics.text_notes_failed += 1;
            false
        }
        Err(e) => {
            warn!(id = event.id, error = %e, "text note signing failed");
            metrics.text_notes_failed += 1;
            false
        }
    };

    match select_picture(&media) {
        Some(picture) => {
            let draft = notes::picture_note(event, &tags, &references, &picture);
            match publisher.publish(&draft, metrics).await {
                Ok(n) if n > 0 => metrics.picture_notes_posted += 1,
                Ok(_) => {
                    warn!(id = event.id, "picture note reached no relay");
                    metrics.picture_notes_failed += 1;
                }
                Err(e) => {
                    warn!(id = event.id, error = %e, "picture note signing failed");
                    metrics.picture_notes_failed += 1;
                }
            }
        }
        None => {
            debug!(id = event.id, "no qualifying image, skipping picture note");
            metrics.picture_notes_skipped += 1;
        }
    }

    text_posted
}

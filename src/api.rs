//! Calendar REST API client.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tracing::{debug, warn};

use crate::calendar::{EventsResponse, SourceEvent};

const RETRY_ATTEMPTS: usize = 3;
const RETRY_DELAY: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the "on this day" events endpoint, with a fixed retry policy
/// for transient failures.
pub struct Client {
    base_url: String,
    api_key: String,
    http: reqwest::Client,
    retries: usize,
    retry_delay: Duration,
}

impl Client {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("building http client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            http,
            retries: RETRY_ATTEMPTS,
            retry_delay: RETRY_DELAY,
        })
    }

    /// Override the retry policy. Used by tests.
    pub fn with_retries(mut self, retries: usize, delay: Duration) -> Self {
        self.retries = retries;
        self.retry_delay = delay;
        self
    }

    /// Fetch all events for a month/day/language combination.
    ///
    /// Any attempt-level failure is retried up to the configured limit; an
    /// error here means the whole fetch failed and the run cannot proceed.
    pub async fn fetch_events(
        &self,
        month: u32,
        day: u32,
        language: &str,
    ) -> Result<Vec<SourceEvent>> {
        let url = format!(
            "{}/events?month={month:02}&day={day:02}&lang={language}",
            self.base_url
        );
        debug!(url = %url, "fetching calendar events");

        let mut last_err = anyhow!("no request attempted");
        for attempt in 1..=self.retries {
            match self.try_fetch(&url).await {
                Ok(events) => return Ok(events),
                Err(e) => {
                    warn!(attempt, retries = self.retries, error = %e, "calendar API request failed");
                    last_err = e;
                    if attempt < self.retries {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }
        Err(last_err.context("fetching calendar events"))
    }

    async fn try_fetch(&self, url: &str) -> Result<Vec<SourceEvent>> {
        let resp = self
            .http
            .get(url)
            .header("X-API-Key", &self.api_key)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("calendar API returned {status}: {body}"));
        }
        let wrapper: EventsResponse = resp.json().await.context("decoding calendar API response")?;
        Ok(wrapper.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Query;
    use axum::http::HeaderMap;
    use axum::routing::get;
    use axum::{Json, Router};
    use std::collections::HashMap;
    use std::net::SocketAddr;

    async fn serve(app: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn fetches_and_decodes_events() {
        let app = Router::new().route(
            "/events",
            get(
                |headers: HeaderMap, Query(params): Query<HashMap<String, String>>| async move {
                    assert_eq!(headers.get("X-API-Key").unwrap(), "sekrit");
                    assert_eq!(params["month"], "01");
                    assert_eq!(params["day"], "03");
                    assert_eq!(params["lang"], "en");
                    Json(serde_json::json!({
                        "events": [{
                            "ID": 1,
                            "Date": "2009-01-03",
                            "Title": "Genesis Block",
                            "Description": "Bitcoin launched",
                            "Tags": "[\"btc\"]",
                            "Media": "https://x/a.jpg",
                            "References": "[]"
                        }],
                        "pagination": {"page": 1}
                    }))
                },
            ),
        );
        let addr = serve(app).await;

        let client = Client::new(&format!("http://{addr}"), "sekrit").unwrap();
        let events = client.fetch_events(1, 3, "en").await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Genesis Block");
    }

    #[tokio::test]
    async fn server_errors_are_retried_then_surfaced() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let app = Router::new().route(
            "/events",
            get(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { (axum::http::StatusCode::INTERNAL_SERVER_ERROR, "boom") }
            }),
        );
        let addr = serve(app).await;

        let client = Client::new(&format!("http://{addr}"), "k")
            .unwrap()
            .with_retries(2, Duration::from_millis(10));
        let err = client.fetch_events(6, 9, "en").await.unwrap_err();
        assert!(err.to_string().contains("fetching calendar events"));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }
}

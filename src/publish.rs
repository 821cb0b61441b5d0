//! Signing and relay fan-out for outgoing events.
//!
//! Each publish signs the draft once, then walks the configured relays
//! independently: a bounded connect, one `["EVENT", …]` frame, and a bounded
//! wait for the matching `["OK", …]` acknowledgment. One relay failing or
//! timing out never blocks the attempts on the others.

use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_socks::tcp::Socks5Stream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{client_async_tls, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

use crate::event::{verify_event, Event, EventDraft};
use crate::metrics::{RelayOutcome, RunMetrics};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(20);
const PUBLISH_TIMEOUT: Duration = Duration::from_secs(25);

/// Publishes signed events to every configured relay with per-relay failure
/// isolation.
pub struct Publisher {
    relays: Vec<String>,
    secret_key: String,
    tor_socks: Option<String>,
    connect_timeout: Duration,
    publish_timeout: Duration,
}

impl Publisher {
    /// Create a publisher for the given relay set and hex-encoded secret key,
    /// optionally routing connections through a SOCKS5 proxy.
    pub fn new(relays: Vec<String>, secret_key: String, tor_socks: Option<String>) -> Self {
        Self {
            relays,
            secret_key,
            tor_socks,
            connect_timeout: CONNECT_TIMEOUT,
            publish_timeout: PUBLISH_TIMEOUT,
        }
    }

    /// Override the per-relay timeouts. Used by tests.
    pub fn with_timeouts(mut self, connect: Duration, publish: Duration) -> Self {
        self.connect_timeout = connect;
        self.publish_timeout = publish;
        self
    }

    /// Sign `draft` and attempt delivery to every relay independently.
    ///
    /// Returns the number of relays that acknowledged the event. A signing
    /// failure is the only error and aborts before any relay is contacted;
    /// per-relay failures are folded into `metrics` and the loop continues.
    pub async fn publish(&self, draft: &EventDraft, metrics: &mut RunMetrics) -> Result<usize> {
        let event = draft.sign(&self.secret_key).context("signing event")?;
        debug_assert!(verify_event(&event).is_ok(), "signed event must verify");
        debug!(id = %event.id, kind = event.kind, "event signed");

        let mut accepted = 0;
        for relay in &self.relays {
            let outcome = self.publish_to_relay(relay, &event).await;
            if outcome.accepted {
                accepted += 1;
                info!(relay = %relay, id = %event.id, "event accepted by relay");
            }
            metrics.record_relay(&outcome);
        }
        if accepted == 0 {
            warn!(id = %event.id, relays = self.relays.len(), "no relay accepted the event");
        }
        Ok(accepted)
    }

    /// One bounded connect-publish-close cycle against a single relay.
    async fn publish_to_relay(&self, relay: &str, event: &Event) -> RelayOutcome {
        let started = Instant::now();
        let failed = RelayOutcome {
            relay: relay.to_string(),
            accepted: false,
            latency: None,
        };

        let mut ws = match timeout(
            self.connect_timeout,
            connect_ws(relay, self.tor_socks.as_deref()),
        )
        .await
        {
            Ok(Ok(ws)) => ws,
            Ok(Err(e)) => {
                warn!(relay = %relay, error = %e, "relay connection failed");
                return failed;
            }
            Err(_) => {
                warn!(relay = %relay, "relay connection timed out");
                return failed;
            }
        };

        let result = timeout(self.publish_timeout, send_event(&mut ws, event)).await;
        let _ = ws.close(None).await;
        match result {
            Ok(Ok(true)) => RelayOutcome {
                relay: relay.to_string(),
                accepted: true,
                latency: Some(started.elapsed()),
            },
            Ok(Ok(false)) => {
                warn!(relay = %relay, id = %event.id, "relay rejected event");
                failed
            }
            Ok(Err(e)) => {
                warn!(relay = %relay, error = %e, "relay publish failed");
                failed
            }
            Err(_) => {
                warn!(relay = %relay, "relay publish timed out");
                failed
            }
        }
    }
}

type RelaySocket = WebSocketStream<MaybeTlsStream<Box<dyn AsyncReadWrite + Unpin + Send>>>;

/// Send the `EVENT` frame and wait for the relay's `OK` acknowledgment for
/// this event id. Returns whether the relay accepted it.
async fn send_event(ws: &mut RelaySocket, event: &Event) -> Result<bool> {
    let frame = serde_json::json!(["EVENT", event]);
    ws.send(Message::Text(frame.to_string())).await?;

    while let Some(msg) = ws.next().await {
        match msg? {
            Message::Text(txt) => {
                let Ok(val) = serde_json::from_str::<Value>(&txt) else {
                    continue;
                };
                let Some(arr) = val.as_array() else { continue };
                match arr.first().and_then(|v| v.as_str()) {
                    Some("OK") if arr.len() >= 3 => {
                        if arr.get(1).and_then(|v| v.as_str()) != Some(event.id.as_str()) {
                            continue;
                        }
                        let ok = arr.get(2).and_then(|v| v.as_bool()).unwrap_or(false);
                        if !ok {
                            if let Some(reason) = arr.get(3).and_then(|v| v.as_str()) {
                                debug!(reason = %reason, "relay refusal reason");
                            }
                        }
                        return Ok(ok);
                    }
                    Some("NOTICE") => {
                        if let Some(notice) = arr.get(1).and_then(|v| v.as_str()) {
                            debug!(notice = %notice, "relay notice");
                        }
                    }
                    _ => {}
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
    Err(anyhow!("relay closed connection before acknowledging"))
}

/// Establish a WebSocket connection, optionally via a SOCKS5 proxy. TLS is
/// negotiated for `wss` addresses.
async fn connect_ws(relay: &str, tor_socks: Option<&str>) -> Result<RelaySocket> {
    let url = Url::parse(relay)?;
    let host = url.host_str().ok_or_else(|| anyhow!("missing host"))?;
    let port = url
        .port_or_known_default()
        .ok_or_else(|| anyhow!("missing port"))?;
    let req = relay.into_client_request()?;
    let stream: Box<dyn AsyncReadWrite + Unpin + Send> = if let Some(proxy) = tor_socks {
        Box::new(Socks5Stream::connect(proxy, (host, port)).await?)
    } else {
        Box::new(TcpStream::connect((host, port)).await?)
    };
    let (ws, _) = client_async_tls(req, stream).await?;
    Ok(ws)
}

/// Blanket trait for boxed async read/write streams.
trait AsyncReadWrite: AsyncRead + AsyncWrite {}
impl<T: AsyncRead + AsyncWrite> AsyncReadWrite for T {}

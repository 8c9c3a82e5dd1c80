//! Realtime change feed over the hosted backend's websocket channel.
//!
//! One phoenix-style topic is joined per table. The subscription's status
//! watch flips to `Subscribed` on the join ack; row-change frames are
//! forwarded as [`ChangeEvent`]s. Channels that fail flip to `Errored` and
//! stay covered by the listener's polling fallback.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use log::{debug, warn};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use saldo_core::store::{ChangeEvent, ChangeFeed, ChangeSubscription, FeedStatus};

use crate::error::{RemoteError, Result};

/// Heartbeat cadence keeping the socket alive.
const HEARTBEAT_INTERVAL_SECS: u64 = 30;
const EVENT_BUFFER: usize = 64;
const JOIN_REF: &str = "1";

/// Websocket change feed for the hosted backend.
#[derive(Debug, Clone)]
pub struct RealtimeFeed {
    socket_url: String,
}

impl RealtimeFeed {
    /// `base_url` is the same HTTP origin the REST client uses.
    pub fn new(base_url: &str, api_key: &str) -> Self {
        let origin = base_url
            .trim_end_matches('/')
            .replacen("https://", "wss://", 1)
            .replacen("http://", "ws://", 1);
        Self {
            socket_url: format!(
                "{}/realtime/v1/websocket?apikey={}&vsn=1.0.0",
                origin, api_key
            ),
        }
    }

    #[cfg(test)]
    fn socket_url(&self) -> &str {
        &self.socket_url
    }
}

impl ChangeFeed for RealtimeFeed {
    fn subscribe(&self, table: &str) -> saldo_core::Result<ChangeSubscription> {
        let (event_tx, events) = mpsc::channel(EVENT_BUFFER);
        let (status_tx, status) = watch::channel(FeedStatus::Pending);
        let url = self.socket_url.clone();
        let table = table.to_string();

        tokio::spawn(async move {
            if let Err(err) = run_channel(&url, &table, event_tx, &status_tx).await {
                warn!("{}: realtime channel closed: {}", table, err);
                let _ = status_tx.send(FeedStatus::Errored);
            }
        });

        Ok(ChangeSubscription { events, status })
    }
}

#[derive(Debug, Deserialize)]
struct SocketMessage {
    topic: String,
    event: String,
    #[serde(default)]
    payload: serde_json::Value,
    #[serde(default, rename = "ref")]
    reference: Option<String>,
}

async fn run_channel(
    url: &str,
    table: &str,
    events: mpsc::Sender<ChangeEvent>,
    status: &watch::Sender<FeedStatus>,
) -> Result<()> {
    let topic = format!("realtime:public:{}", table);
    let (stream, _) = connect_async(url)
        .await
        .map_err(|err| RemoteError::socket(err.to_string()))?;
    let (mut sink, mut source) = stream.split();

    let join = json!({
        "topic": topic,
        "event": "phx_join",
        "payload": {},
        "ref": JOIN_REF,
    });
    sink.send(Message::Text(join.to_string()))
        .await
        .map_err(|err| RemoteError::socket(err.to_string()))?;

    let mut heartbeat = tokio::time::interval(Duration::from_secs(HEARTBEAT_INTERVAL_SECS));
    heartbeat.tick().await;
    let mut heartbeat_ref: u64 = 1;

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                heartbeat_ref += 1;
                let ping = json!({
                    "topic": "phoenix",
                    "event": "heartbeat",
                    "payload": {},
                    "ref": heartbeat_ref.to_string(),
                });
                sink.send(Message::Text(ping.to_string()))
                    .await
                    .map_err(|err| RemoteError::socket(err.to_string()))?;
            }
            maybe_frame = source.next() => {
                let Some(frame) = maybe_frame else {
                    return Err(RemoteError::socket("stream ended"));
                };
                let frame = frame.map_err(|err| RemoteError::socket(err.to_string()))?;
                let Message::Text(raw) = frame else {
                    continue;
                };
                let Ok(message) = serde_json::from_str::<SocketMessage>(&raw) else {
                    debug!("{}: unparseable realtime frame", table);
                    continue;
                };
                if message.topic != topic {
                    continue;
                }
                match message.event.as_str() {
                    "phx_reply" => {
                        let ok = message.payload.get("status").and_then(|s| s.as_str())
                            == Some("ok");
                        if ok && message.reference.as_deref() == Some(JOIN_REF) {
                            debug!("{}: realtime subscription confirmed", table);
                            let _ = status.send(FeedStatus::Subscribed);
                        }
                    }
                    "INSERT" | "UPDATE" | "DELETE" => {
                        let event = ChangeEvent {
                            table: table.to_string(),
                        };
                        if events.send(event).await.is_err() {
                            // Receiver gone: the app dropped the listener.
                            return Ok(());
                        }
                    }
                    "phx_error" | "phx_close" => {
                        return Err(RemoteError::socket("channel errored"));
                    }
                    _ => {}
                }
            }
        }
    }
}

//! Upstream WebSocket feed.
//!
//! Connects to the configured `ws(s)://` upstream, decodes every text or
//! binary frame as one event or an array of events, and hands the stream to
//! a [`FeedConsumer`]. A dropped connection is retried after the configured
//! delay until shutdown.

use std::time::Duration;

use fanpulse_core::PipelineHandle;
use fanpulse_core::ingest::FeedConsumer;
use fanpulse_core::metrics::PipelineMetrics;
use fanpulse_sdk::objects::{RawEvent, decode_events};
use futures_util::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};
use url::Url;

pub fn spawn_upstream_feed(
    url: Url,
    reconnect_delay: Duration,
    pipeline: PipelineHandle,
    shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(run_upstream_feed(url, reconnect_delay, pipeline, shutdown_rx))
}

async fn run_upstream_feed(
    url: Url,
    reconnect_delay: Duration,
    pipeline: PipelineHandle,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let consumer = FeedConsumer::new(pipeline.clone());

    while !*shutdown_rx.borrow() {
        let connected = tokio::select! {
            biased;
            _ = shutdown_rx.changed() => break,
            result = connect_async(url.as_str()) => result,
        };

        match connected {
            Ok((stream, _)) => {
                tracing::info!(%url, "Connected to upstream feed");
                let metrics = pipeline.metrics().clone();
                let events = stream
                    .map(move |frame| decode_frame(frame, &metrics))
                    .flat_map(futures_util::stream::iter);

                let stats = consumer.run(events, shutdown_rx.clone()).await;
                if *shutdown_rx.borrow() || !pipeline.is_accepting() {
                    break;
                }
                tracing::warn!(
                    %url,
                    accepted = stats.accepted,
                    rejected = stats.rejected,
                    "Upstream feed disconnected"
                );
            }
            Err(e) => {
                tracing::warn!(%url, error = %e, "Failed to connect to upstream feed");
            }
        }

        tokio::select! {
            biased;
            _ = shutdown_rx.changed() => break,
            _ = tokio::time::sleep(reconnect_delay) => {}
        }
    }

    tracing::info!("Upstream feed stopped");
}

/// Decode one WebSocket frame. Undecodable payloads and undecodable
/// elements of a batch count as malformed; the rest of the batch survives.
fn decode_frame(
    frame: Result<Message, tungstenite::Error>,
    metrics: &PipelineMetrics,
) -> Vec<RawEvent> {
    let parsed = match frame {
        Ok(Message::Text(text)) => serde_json::from_str(&text),
        Ok(Message::Binary(bytes)) => serde_json::from_slice(&bytes),
        Ok(_) => return Vec::new(),
        Err(e) => {
            tracing::warn!(error = %e, "Upstream feed read error");
            return Vec::new();
        }
    };

    let value = match parsed {
        Ok(value) => value,
        Err(e) => {
            metrics.record_malformed();
            tracing::warn!(error = %e, "Undecodable upstream frame");
            return Vec::new();
        }
    };

    decode_events(value)
        .into_iter()
        .enumerate()
        .filter_map(|(index, decoded)| match decoded {
            Ok(raw) => Some(raw),
            Err(e) => {
                metrics.record_malformed();
                tracing::warn!(index, error = %e, "Undecodable event in upstream frame");
                None
            }
        })
        .collect()
}

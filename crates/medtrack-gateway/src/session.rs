//! Downstream WebSocket session.
//!
//! One task per connection. It forwards queued fan-out messages, answers
//! control messages, and probes liveness: a ping goes out every heartbeat
//! interval, and if the previous ping is still unanswered when the next one
//! is due the connection is dropped without a close handshake.

use crate::broadcast::SubscriptionBroadcaster;
use crate::types::ServerMessage;
use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use medtrack_telemetry::Metrics;
use medtrack_ws::{HeartbeatManager, ProbeDecision};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    ClientClosed,
    HeartbeatTimeout,
    SendFailed,
    Shutdown,
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub heartbeat_interval: Duration,
    pub queue_capacity: usize,
}

type WsSink = SplitSink<WebSocket, Message>;

async fn send_message(sink: &mut WsSink, message: &ServerMessage) -> bool {
    let text = match serde_json::to_string(message) {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, kind = message.kind(), "Failed to serialize outbound message");
            return true;
        }
    };
    sink.send(Message::Text(text.into())).await.is_ok()
}

/// Serve one downstream connection until it closes, times out, or shutdown.
pub async fn run_session(
    socket: WebSocket,
    broadcaster: Arc<SubscriptionBroadcaster>,
    settings: SessionSettings,
    shutdown: CancellationToken,
) -> SessionEnd {
    let (mut sink, mut stream) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel(settings.queue_capacity.max(1));
    let id = broadcaster.register(outbound_tx);
    info!(connection = id, "Downstream client connected");

    let heartbeat = HeartbeatManager::new(settings.heartbeat_interval.as_millis() as u64);
    let period = settings.heartbeat_interval;
    let mut probe = tokio::time::interval_at(Instant::now() + period, period);
    probe.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let end = if !send_message(&mut sink, &broadcaster.welcome()).await {
        SessionEnd::SendFailed
    } else {
        loop {
            tokio::select! {
                Some(message) = outbound_rx.recv() => {
                    if !send_message(&mut sink, &message).await {
                        break SessionEnd::SendFailed;
                    }
                }
                inbound = stream.next() => {
                    let text = match inbound {
                        Some(Ok(Message::Text(text))) => text.as_str().to_owned(),
                        Some(Ok(Message::Binary(data))) => {
                            String::from_utf8_lossy(&data).into_owned()
                        }
                        Some(Ok(Message::Pong(_))) => {
                            heartbeat.record_pong();
                            continue;
                        }
                        Some(Ok(Message::Ping(_))) => continue,
                        Some(Ok(Message::Close(_))) | None => break SessionEnd::ClientClosed,
                        Some(Err(e)) => {
                            debug!(connection = id, error = %e, "Downstream receive error");
                            break SessionEnd::ClientClosed;
                        }
                    };
                    let mut failed = false;
                    for reply in broadcaster.handle_text(id, &text) {
                        if !send_message(&mut sink, &reply).await {
                            failed = true;
                            break;
                        }
                    }
                    if failed {
                        break SessionEnd::SendFailed;
                    }
                }
                _ = probe.tick() => match heartbeat.on_tick() {
                    ProbeDecision::TimedOut => {
                        Metrics::heartbeat_terminated();
                        info!(connection = id, "Downstream client missed heartbeat, terminating");
                        break SessionEnd::HeartbeatTimeout;
                    }
                    ProbeDecision::SendProbe => {
                        if sink.send(Message::Ping(Bytes::new())).await.is_err() {
                            break SessionEnd::SendFailed;
                        }
                        heartbeat.record_ping();
                    }
                },
                () = shutdown.cancelled() => {
                    let _ = sink.send(Message::Close(None)).await;
                    break SessionEnd::Shutdown;
                }
            }
        }
    };

    broadcaster.deregister(id);
    info!(connection = id, reason = ?end, "Downstream client disconnected");
    end
}

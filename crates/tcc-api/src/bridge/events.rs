// Bridge command stream
//
// Connects to the bridge's `/events` WebSocket, reconnecting with capped
// exponential backoff, and forwards `command` frames over an mpsc
// channel. Other frame types are logged and dropped.

use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::models::{BridgeCommand, BridgeEvent};
use crate::error::Error;

const COMMAND_CHANNEL_CAPACITY: usize = 100;

/// Backoff configuration for WebSocket reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,
    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// Receiving end of the bridge's command channel.
///
/// The background task stops when the cancellation token fires or when
/// this handle is dropped.
pub struct CommandStream {
    rx: mpsc::Receiver<BridgeCommand>,
    cancel: CancellationToken,
}

impl CommandStream {
    /// Spawn the reconnect loop. Returns immediately; the first connection
    /// attempt happens in the background.
    pub fn connect(ws_url: Url, reconnect: ReconnectConfig, cancel: CancellationToken) -> Self {
        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let task_cancel = cancel.child_token();
        tokio::spawn(ws_loop(ws_url, tx, reconnect, task_cancel.clone()));
        Self {
            rx,
            cancel: task_cancel,
        }
    }

    /// Next command, or `None` once the stream has shut down.
    pub async fn recv(&mut self) -> Option<BridgeCommand> {
        self.rx.recv().await
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl Drop for CommandStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ── Reconnect loop ──────────────────────────────────────────────────

async fn ws_loop(
    ws_url: Url,
    tx: mpsc::Sender<BridgeCommand>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;

    loop {
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = connect_and_read(&ws_url, &tx, &cancel) => result,
        };

        let delay = match result {
            Ok(()) => {
                tracing::info!("bridge event stream closed, reconnecting");
                attempt = 0;
                reconnect.initial_delay
            }
            Err(e) => {
                tracing::warn!(error = %e, attempt, "bridge event stream error");
                let delay = backoff(attempt, &reconnect);
                attempt = attempt.saturating_add(1);
                delay
            }
        };

        if tx.is_closed() {
            break;
        }
        tracing::debug!(delay_ms = delay.as_millis(), "waiting before reconnect");
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }
    }

    tracing::debug!("bridge event loop exiting");
}

async fn connect_and_read(
    url: &Url,
    tx: &mpsc::Sender<BridgeCommand>,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    tracing::info!(%url, "connecting to bridge event stream");

    let (ws_stream, _response) = tokio_tungstenite::connect_async(url.as_str())
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    tracing::info!("bridge event stream connected");
    let (_write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(()),
            frame = read.next() => match frame {
                Some(Ok(tungstenite::Message::Text(text))) => {
                    if let Some(cmd) = parse_command(&text) {
                        if tx.send(cmd).await.is_err() {
                            // Receiver gone: nobody left to serve.
                            return Ok(());
                        }
                    }
                }
                Some(Ok(tungstenite::Message::Close(frame))) => {
                    tracing::info!(?frame, "bridge sent close frame");
                    return Ok(());
                }
                Some(Err(e)) => return Err(Error::WebSocketConnect(e.to_string())),
                None => return Ok(()),
                Some(Ok(_)) => {}
            },
        }
    }
}

/// Extract a command from a text frame. Non-command events and
/// malformed frames yield `None`.
pub fn parse_command(text: &str) -> Option<BridgeCommand> {
    let event: BridgeEvent = match serde_json::from_str(text) {
        Ok(e) => e,
        Err(e) => {
            tracing::debug!(error = %e, "unparseable bridge frame");
            return None;
        }
    };
    if event.kind != "command" {
        tracing::trace!(kind = %event.kind, "ignoring bridge event");
        return None;
    }
    match serde_json::from_value(event.data) {
        Ok(cmd) => Some(cmd),
        Err(e) => {
            tracing::debug!(error = %e, "command frame without a usable payload");
            None
        }
    }
}

/// `min(initial * 2^attempt, max)`.
fn backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let factor = 2u32.saturating_pow(attempt.min(16));
    config
        .initial_delay
        .saturating_mul(factor)
        .min(config.max_delay)
}

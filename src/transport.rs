//! Bidirectional message channel to the live voice agent.
//!
//! One WebSocket per call. There is no retry or reconnect here: a failed
//! connect or a dropped link surfaces exactly one event and the session
//! decides what to do with it (nothing — the user dials again).

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use url::Url;

use crate::error::CallError;

/// Events flowing from the transport task to the session.
#[derive(Debug)]
pub enum TransportEvent {
    /// Inbound text message, unparsed.
    Message(String),
    /// Remote closed the channel (close frame or stream end).
    Closed,
    /// Channel-level communication failure.
    Failed(String),
}

/// Commands flowing from the session into the transport task.
#[derive(Debug)]
pub enum TransportCommand {
    SendText(String),
    Close,
}

/// A connected call transport: the command sender plus the reader task.
pub struct CallTransport {
    pub commands: mpsc::Sender<TransportCommand>,
    pub task: JoinHandle<()>,
}

impl CallTransport {
    /// Open the channel against `ws_url` and spawn the read/write loop.
    ///
    /// Returning `Ok` means the server completed the handshake — the
    /// transport is confirmed open, not merely requested.
    pub async fn connect(
        ws_url: &str,
        events: mpsc::Sender<TransportEvent>,
        capacity: usize,
    ) -> Result<Self, CallError> {
        let url = Url::parse(ws_url)
            .map_err(|e| CallError::Transport(format!("Invalid WebSocket URL: {}", e)))?;
        tracing::info!(%url, "opening voice transport");

        let (ws_stream, _) = connect_async(ws_url).await.map_err(|e| {
            tracing::error!(error = %e, "WebSocket open failed");
            CallError::Transport("WebSocket connection error".to_string())
        })?;
        tracing::info!("voice transport open");

        let (mut write, mut read) = ws_stream.split();
        let (cmd_tx, mut cmd_rx) = mpsc::channel::<TransportCommand>(capacity);

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    msg = read.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                if events.send(TransportEvent::Message(text.to_string())).await.is_err() {
                                    break;
                                }
                            }
                            Some(Ok(Message::Close(frame))) => {
                                tracing::info!(?frame, "server closed voice transport");
                                let _ = events.send(TransportEvent::Closed).await;
                                break;
                            }
                            // The agent speaks JSON text only; stray binary
                            // or control frames carry nothing for us.
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                tracing::warn!(error = %e, "voice transport error");
                                let _ = events
                                    .send(TransportEvent::Failed(
                                        "WebSocket connection error".to_string(),
                                    ))
                                    .await;
                                break;
                            }
                            None => {
                                let _ = events.send(TransportEvent::Closed).await;
                                break;
                            }
                        }
                    }
                    cmd = cmd_rx.recv() => {
                        match cmd {
                            Some(TransportCommand::SendText(text)) => {
                                if let Err(e) = write.send(Message::Text(text.into())).await {
                                    tracing::warn!(error = %e, "voice transport send failed");
                                    let _ = events
                                        .send(TransportEvent::Failed(
                                            "WebSocket connection error".to_string(),
                                        ))
                                        .await;
                                    break;
                                }
                            }
                            Some(TransportCommand::Close) | None => {
                                let _ = write.send(Message::Close(None)).await;
                                break;
                            }
                        }
                    }
                }
            }
        });

        Ok(Self {
            commands: cmd_tx,
            task,
        })
    }
}

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use super::messages::{
    InlineData, RealtimeInput, RealtimeInputEnvelope, ServerMessage, Setup, SetupEnvelope,
};
use crate::audio::codec;
use crate::error::SessionError;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Session events, delivered on a single channel in arrival order.
#[derive(Debug)]
pub enum SessionEvent {
    /// The server acknowledged setup; audio may now be sent.
    Opened,
    /// One inbound server event.
    Message(ServerMessage),
    /// Connection-level failure. Terminal; always followed by `Closed`.
    Error(String),
    /// The connection is gone, cleanly or otherwise.
    Closed,
}

enum Outbound {
    Frame(Message),
    Close,
}

/// Client half of a live conversation connection.
///
/// Sends are fire-and-forget: they enqueue onto a writer task that owns the
/// socket sink. Inbound traffic is parsed by a reader task and delivered as
/// [`SessionEvent`]s to the single consumer returned by [`connect`].
///
/// [`connect`]: LiveClient::connect
#[derive(Clone)]
pub struct LiveClient {
    outbound: mpsc::UnboundedSender<Outbound>,
    open: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
}

impl LiveClient {
    /// Open a connection and send the setup message.
    ///
    /// Resolves once the websocket handshake completes; the `Opened` event
    /// on the returned channel signals that the server accepted setup and
    /// audio may flow.
    pub async fn connect(
        endpoint: &str,
        api_key: &str,
        setup: Setup,
    ) -> Result<(Self, mpsc::Receiver<SessionEvent>), SessionError> {
        let url = format!("{}?key={}", endpoint, api_key);
        info!(endpoint, "connecting to live endpoint");

        let (ws, _response) = connect_async(url)
            .await
            .map_err(|e| SessionError::Transport(format!("connect failed: {}", e)))?;

        let (mut ws_tx, mut ws_rx) = ws.split();

        let setup_json = serde_json::to_string(&SetupEnvelope { setup })
            .map_err(|e| SessionError::Transport(format!("setup serialization: {}", e)))?;
        ws_tx
            .send(Message::Text(setup_json))
            .await
            .map_err(|e| SessionError::Transport(format!("setup send failed: {}", e)))?;

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Outbound>();
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let open = Arc::new(AtomicBool::new(false));
        let closed = Arc::new(AtomicBool::new(false));

        // Writer task: owns the socket sink until close or failure.
        tokio::spawn(async move {
            while let Some(outbound) = out_rx.recv().await {
                match outbound {
                    Outbound::Frame(message) => {
                        if let Err(e) = ws_tx.send(message).await {
                            debug!(error = %e, "outbound send failed, stopping writer");
                            break;
                        }
                    }
                    Outbound::Close => {
                        let _ = ws_tx.close().await;
                        break;
                    }
                }
            }
        });

        // Reader task: sole producer of session events, in arrival order.
        let open_reader = Arc::clone(&open);
        let closed_reader = Arc::clone(&closed);
        tokio::spawn(async move {
            loop {
                match ws_rx.next().await {
                    Some(Ok(Message::Text(text))) => {
                        let message: ServerMessage = match serde_json::from_str(&text) {
                            Ok(m) => m,
                            Err(e) => {
                                warn!(error = %e, "skipping unparseable server event");
                                continue;
                            }
                        };

                        if message.setup_complete.is_some()
                            && !open_reader.swap(true, Ordering::SeqCst)
                        {
                            info!("live session open");
                            if event_tx.send(SessionEvent::Opened).await.is_err() {
                                break;
                            }
                        }

                        if message.server_content.is_some()
                            && event_tx.send(SessionEvent::Message(message)).await.is_err()
                        {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        info!(?frame, "live endpoint closed the connection");
                        let _ = event_tx.send(SessionEvent::Closed).await;
                        break;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        error!(error = %e, "live connection failed");
                        let _ = event_tx.send(SessionEvent::Error(e.to_string())).await;
                        let _ = event_tx.send(SessionEvent::Closed).await;
                        break;
                    }
                    None => {
                        let _ = event_tx.send(SessionEvent::Closed).await;
                        break;
                    }
                }
            }

            open_reader.store(false, Ordering::SeqCst);
            closed_reader.store(true, Ordering::SeqCst);
        });

        Ok((
            Self {
                outbound: out_tx,
                open,
                closed,
            },
            event_rx,
        ))
    }

    /// Queue one capture block for sending. Fire-and-forget.
    ///
    /// Fails with `NotConnected` before the server has acknowledged setup or
    /// after the connection closed.
    pub fn send_realtime_audio(&self, pcm: &[u8], sample_rate: u32) -> Result<(), SessionError> {
        if self.closed.load(Ordering::SeqCst) || !self.open.load(Ordering::SeqCst) {
            return Err(SessionError::NotConnected);
        }

        let envelope = RealtimeInputEnvelope {
            realtime_input: RealtimeInput {
                media_chunks: vec![InlineData::pcm(codec::encode(pcm), sample_rate)],
            },
        };

        let text = serde_json::to_string(&envelope)
            .map_err(|e| SessionError::Transport(format!("input serialization: {}", e)))?;

        self.outbound
            .send(Outbound::Frame(Message::Text(text)))
            .map_err(|_| SessionError::NotConnected)
    }

    /// Whether the server has acknowledged setup and the connection is live.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst) && !self.closed.load(Ordering::SeqCst)
    }

    /// Best-effort graceful shutdown. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.open.store(false, Ordering::SeqCst);
        let _ = self.outbound.send(Outbound::Close);
        info!("live client closed");
    }
}

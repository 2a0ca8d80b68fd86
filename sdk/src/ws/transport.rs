//! Push transport.
//!
//! [`PushTransport`] is the seam between the channel manager and the wire.
//! [`WsTransport`] implements it over a WebSocket using the JSON envelope in
//! [`messages`](super::messages).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::config::ChannelConfig;
use super::error::WsError;
use super::messages::{body_text, ClientFrame, ServerFrame};
use crate::types::Topic;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Identifier of a subscription on the wire.
pub type WireId = String;

/// Events a connected transport reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A payload arrived on a subscribed topic.
    Message {
        /// Topic the payload was published on.
        topic: Topic,
        /// Raw payload text.
        payload: String,
    },
    /// The connection dropped.
    Closed {
        /// Human-readable reason.
        reason: String,
    },
}

/// A persistent push connection.
///
/// `subscribe`, `unsubscribe` and `send` only queue frames and never block,
/// so they are safe to call while holding a lock.
#[async_trait]
pub trait PushTransport: Send + Sync + 'static {
    /// Opens the connection and returns its event stream.
    ///
    /// The stream ends (or yields [`TransportEvent::Closed`]) when the
    /// connection drops.
    async fn connect(&self) -> Result<mpsc::UnboundedReceiver<TransportEvent>, WsError>;

    /// Opens a wire subscription for a topic.
    fn subscribe(&self, topic: &Topic) -> Result<WireId, WsError>;

    /// Closes a wire subscription.
    fn unsubscribe(&self, id: &WireId) -> Result<(), WsError>;

    /// Publishes a payload to a destination.
    fn send(&self, destination: &str, body: String) -> Result<(), WsError>;

    /// Closes the connection.
    async fn close(&self);
}

/// Tasks and outbound queue of one live socket.
struct Session {
    outbound: mpsc::UnboundedSender<Message>,
    tasks: Vec<JoinHandle<()>>,
}

impl Session {
    fn abort(self) {
        for task in self.tasks {
            task.abort();
        }
    }
}

/// WebSocket push transport.
pub struct WsTransport {
    config: ChannelConfig,
    session: Mutex<Option<Session>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for WsTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsTransport")
            .field("url", &self.config.url)
            .finish_non_exhaustive()
    }
}

impl WsTransport {
    /// Creates a new transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: ChannelConfig) -> Result<Self, WsError> {
        config.validate()?;

        Ok(Self {
            config,
            session: Mutex::new(None),
            next_id: AtomicU64::new(1),
        })
    }

    /// Creates a transport for the given URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_url(url: impl Into<String>) -> Result<Self, WsError> {
        Self::new(ChannelConfig::new(url))
    }

    /// Returns the transport configuration.
    #[must_use]
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    fn session(&self) -> MutexGuard<'_, Option<Session>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues a frame on the live socket.
    fn send_frame(&self, frame: &ClientFrame) -> Result<(), WsError> {
        let json =
            serde_json::to_string(frame).map_err(|e| WsError::Encode(e.to_string()))?;

        let session = self.session();
        let session = session.as_ref().ok_or(WsError::NotConnected)?;

        session
            .outbound
            .send(Message::Text(json.into()))
            .map_err(|_| WsError::WriterStopped)
    }
}

#[async_trait]
impl PushTransport for WsTransport {
    async fn connect(&self) -> Result<mpsc::UnboundedReceiver<TransportEvent>, WsError> {
        let url = self.config.connection_url();

        let (ws_stream, _) =
            tokio::time::timeout(self.config.connect_timeout, tokio_tungstenite::connect_async(url))
                .await
                .map_err(|_| WsError::Connection("connect timed out".to_string()))?
                .map_err(|e| WsError::Connection(e.to_string()))?;

        let (sink, source) = ws_stream.split();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let tasks = vec![
            tokio::spawn(write_frames(sink, out_rx)),
            tokio::spawn(read_frames(source, event_tx)),
            tokio::spawn(heartbeat(out_tx.clone(), self.config.heartbeat_interval)),
        ];

        let previous = self.session().replace(Session {
            outbound: out_tx,
            tasks,
        });
        if let Some(previous) = previous {
            previous.abort();
        }

        info!(url = %self.config.url, "websocket connected");
        Ok(event_rx)
    }

    fn subscribe(&self, topic: &Topic) -> Result<WireId, WsError> {
        let id = format!("sub-{}", self.next_id.fetch_add(1, Ordering::Relaxed));

        self.send_frame(&ClientFrame::Subscribe {
            id: id.clone(),
            topic: topic.to_string(),
        })
        .map_err(|e| WsError::Subscribe(e.to_string()))?;

        Ok(id)
    }

    fn unsubscribe(&self, id: &WireId) -> Result<(), WsError> {
        self.send_frame(&ClientFrame::Unsubscribe { id: id.clone() })
    }

    fn send(&self, destination: &str, body: String) -> Result<(), WsError> {
        self.send_frame(&ClientFrame::Send {
            destination: destination.to_string(),
            body,
        })
    }

    async fn close(&self) {
        let session = self.session().take();

        if let Some(session) = session {
            // The writer flushes the close frame and exits on its own.
            let _ = session.outbound.send(Message::Close(None));
            let Session { tasks, .. } = session;
            for task in tasks.into_iter().skip(1) {
                task.abort();
            }
            debug!("websocket closed");
        }
    }
}

/// Drains the outbound queue into the socket.
async fn write_frames(mut sink: WsSink, mut outbound: mpsc::UnboundedReceiver<Message>) {
    while let Some(msg) = outbound.recv().await {
        let closing = matches!(msg, Message::Close(_));

        if let Err(e) = sink.send(msg).await {
            debug!(error = %e, "websocket write failed");
            break;
        }

        if closing {
            break;
        }
    }

    let _ = sink.close().await;
}

/// Turns inbound frames into transport events.
async fn read_frames(mut source: WsSource, events: mpsc::UnboundedSender<TransportEvent>) {
    let reason = loop {
        match source.next().await {
            Some(Ok(Message::Text(text))) => match serde_json::from_str::<ServerFrame>(text.as_str()) {
                Ok(ServerFrame::Message { topic, body }) => match Topic::parse(&topic) {
                    Ok(topic) => {
                        let event = TransportEvent::Message {
                            topic,
                            payload: body_text(body),
                        };
                        if events.send(event).is_err() {
                            return;
                        }
                    }
                    Err(e) => warn!(error = %e, "dropping frame for unknown topic"),
                },
                Ok(ServerFrame::Pong { .. }) => debug!("received pong"),
                Ok(ServerFrame::Error { code, message }) => {
                    warn!(%code, %message, "server reported an error");
                }
                Err(e) => warn!(error = %e, "dropping malformed frame"),
            },
            Some(Ok(Message::Close(frame))) => {
                break frame.map_or_else(|| "closed by server".to_string(), |f| f.reason.to_string());
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => break e.to_string(),
            None => break "stream ended".to_string(),
        }
    };

    let _ = events.send(TransportEvent::Closed { reason });
}

/// Sends periodic pings until the writer goes away.
async fn heartbeat(outbound: mpsc::UnboundedSender<Message>, interval: std::time::Duration) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);

    loop {
        ticker.tick().await;

        let frame = ClientFrame::Ping {
            timestamp: chrono::Utc::now().timestamp_millis(),
        };

        let Ok(json) = serde_json::to_string(&frame) else {
            continue;
        };

        if outbound.send(Message::Text(json.into())).is_err() {
            break;
        }
    }
}

//! WebSocket client transport talking to the relay.
//!
//! One text frame carries one JSON-encoded [`TransportEvent`]. A writer task
//! drains the outbound queue into the socket; a reader task decodes inbound
//! frames and dispatches them to the registered listeners.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use devconnect_shared::{EventKind, TransportEvent, UserId};

use crate::error::TransportError;
use crate::transport::{Listener, ListenerId, ListenerRegistry, Transport};

pub struct WsTransport {
    outbound: mpsc::UnboundedSender<String>,
    registry: Arc<ListenerRegistry>,
    connected: Arc<AtomicBool>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

/// Relay endpoint URL for `user`, e.g. `ws://host:8090/ws?user=<uuid>`.
pub fn relay_url(base: &str, user: UserId) -> String {
    let base = base.trim_end_matches('/');
    let base = base.strip_suffix("/ws").unwrap_or(base);
    format!("{base}/ws?user={user}")
}

impl WsTransport {
    /// Connect to the relay at `base` as `user`.
    pub async fn connect(base: &str, user: UserId) -> Result<Self, TransportError> {
        let url = relay_url(base, user);
        let (stream, _response) = connect_async(url.as_str())
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        info!(%url, "Connected to relay");

        let (mut sink, mut source) = stream.split();
        let (outbound, mut queue) = mpsc::unbounded_channel::<String>();
        let registry = Arc::new(ListenerRegistry::new());
        let connected = Arc::new(AtomicBool::new(true));

        let writer = tokio::spawn(async move {
            while let Some(frame) = queue.recv().await {
                if let Err(e) = sink.send(Message::Text(frame.into())).await {
                    warn!(error = %e, "Relay write failed");
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let reader = {
            let registry = registry.clone();
            let connected = connected.clone();
            tokio::spawn(async move {
                while let Some(frame) = source.next().await {
                    match frame {
                        Ok(Message::Text(text)) => match TransportEvent::from_json(text.as_str()) {
                            Ok(event) => {
                                registry.dispatch(&event);
                            }
                            Err(e) => debug!(error = %e, "Ignoring malformed relay frame"),
                        },
                        Ok(Message::Close(_)) => break,
                        Ok(_) => {}
                        Err(e) => {
                            warn!(error = %e, "Relay read failed");
                            break;
                        }
                    }
                }
                connected.store(false, Ordering::Relaxed);
                // Wake pending listeners with `None`.
                registry.clear();
                info!("Relay connection closed");
            })
        };

        Ok(Self {
            outbound,
            registry,
            connected,
            reader,
            writer,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Transport for WsTransport {
    fn on(&self, kinds: &[EventKind]) -> Listener {
        self.registry.register(kinds)
    }

    fn off(&self, id: ListenerId) -> bool {
        self.registry.remove(id)
    }

    async fn emit(&self, event: TransportEvent) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::Closed);
        }
        let frame = event.to_json()?;
        self.outbound
            .send(frame)
            .map_err(|_| TransportError::Closed)
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}

//! Match socket connection and the process-wide connection slot

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use reqwest::Url;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::ws::protocol::ClientMsg;

const STATE_CONNECTING: u8 = 0;
const STATE_OPEN: u8 = 1;
const STATE_CLOSED: u8 = 2;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Commands for the socket writer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    Close,
}

/// Socket events, delivered in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Opened,
    Message(String),
    /// Emitted exactly once, whether the close was graceful or not
    Closed,
}

/// Cloneable handle to one match connection
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: u64,
    tx: mpsc::UnboundedSender<Outbound>,
    state: Arc<AtomicU8>,
}

impl ConnectionHandle {
    /// Handle in the connecting state plus the writer side of its queue
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            tx,
            state: Arc::new(AtomicU8::new(STATE_CONNECTING)),
        };
        (handle, rx)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_open(&self) -> bool {
        self.state.load(Ordering::Acquire) == STATE_OPEN
    }

    pub fn is_closed(&self) -> bool {
        self.state.load(Ordering::Acquire) == STATE_CLOSED
    }

    /// Connecting -> open; fails if the handle was closed meanwhile
    pub fn mark_open(&self) -> bool {
        self.state
            .compare_exchange(
                STATE_CONNECTING,
                STATE_OPEN,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub fn mark_closed(&self) {
        self.state.store(STATE_CLOSED, Ordering::Release);
    }

    /// Queue `msg`; silently skipped when the connection is not open
    pub fn send(&self, msg: &ClientMsg) -> bool {
        if !self.is_open() {
            debug!(connection_id = self.id, "Send skipped, connection not open");
            return false;
        }
        match msg.to_json() {
            Ok(json) => self.tx.send(Outbound::Text(json)).is_ok(),
            Err(e) => {
                warn!(connection_id = self.id, error = %e, "Failed to encode client message");
                false
            }
        }
    }

    /// Ask the writer to close the socket; idempotent
    pub fn close(&self) {
        let previous = self.state.swap(STATE_CLOSED, Ordering::AcqRel);
        if previous != STATE_CLOSED {
            debug!(connection_id = self.id, "Closing match connection");
            let _ = self.tx.send(Outbound::Close);
        }
    }
}

/// Process-wide slot holding the in-flight match connection.
///
/// Navigation closes whatever is stored here, so a stale socket never keeps
/// delivering input after the user leaves or re-enters a match.
#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    slot: Arc<Mutex<Option<ConnectionHandle>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `handle`, returning whatever was there before
    pub fn set(&self, handle: ConnectionHandle) -> Option<ConnectionHandle> {
        self.slot.lock().replace(handle)
    }

    pub fn get(&self) -> Option<ConnectionHandle> {
        self.slot.lock().clone()
    }

    /// Close and forget the active connection; returns whether one existed
    pub fn close_active(&self) -> bool {
        match self.slot.lock().take() {
            Some(handle) => {
                info!(connection_id = handle.id(), "Closing active match connection");
                handle.close();
                true
            }
            None => false,
        }
    }

    /// Empty the slot only if it still holds connection `id`
    pub fn clear_if(&self, id: u64) {
        let mut slot = self.slot.lock();
        if slot.as_ref().map(|h| h.id()) == Some(id) {
            *slot = None;
        }
    }
}

/// Connection errors
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Invalid page origin: {0}")]
    InvalidOrigin(String),

    #[error("Unsupported origin scheme: {0}")]
    UnsupportedScheme(String),
}

/// `<ws|wss>://<host>/ws/pong/<match_id>/`, secure when the origin is
pub fn match_url(origin: &str, match_id: Uuid) -> Result<String, ConnectionError> {
    let url = Url::parse(origin).map_err(|_| ConnectionError::InvalidOrigin(origin.to_string()))?;
    let scheme = match url.scheme() {
        "https" => "wss",
        "http" => "ws",
        other => return Err(ConnectionError::UnsupportedScheme(other.to_string())),
    };
    let host = url
        .host_str()
        .ok_or_else(|| ConnectionError::InvalidOrigin(origin.to_string()))?;
    let host = match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    Ok(format!("{scheme}://{host}/ws/pong/{match_id}/"))
}

/// Open the socket for `match_id`.
///
/// Any connection already in the registry is closed first, then the new
/// handle takes its place. The returned receiver yields `Opened` (only if the
/// connect succeeds), every text frame, and finally one `Closed`.
pub fn open_match_connection(
    registry: &ConnectionRegistry,
    origin: &str,
    match_id: Uuid,
) -> Result<(ConnectionHandle, mpsc::UnboundedReceiver<ConnectionEvent>), ConnectionError> {
    let url = match_url(origin, match_id)?;

    if registry.close_active() {
        debug!(match_id = %match_id, "Replaced stale match connection");
    }

    let (handle, outbound_rx) = ConnectionHandle::channel();
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    registry.set(handle.clone());

    info!(match_id = %match_id, url = %url, connection_id = handle.id(), "Opening match connection");
    tokio::spawn(run_socket(
        url,
        handle.clone(),
        outbound_rx,
        events_tx,
        registry.clone(),
    ));

    Ok((handle, events_rx))
}

async fn run_socket(
    url: String,
    handle: ConnectionHandle,
    mut outbound_rx: mpsc::UnboundedReceiver<Outbound>,
    events_tx: mpsc::UnboundedSender<ConnectionEvent>,
    registry: ConnectionRegistry,
) {
    // Nothing but a close can be queued before the socket opens
    let ws_stream = tokio::select! {
        connected = connect_async(url.as_str()) => match connected {
            Ok((ws_stream, _)) => ws_stream,
            Err(e) => {
                warn!(connection_id = handle.id(), error = %e, "Match connection failed");
                finish(&handle, &events_tx, &registry);
                return;
            }
        },
        _ = outbound_rx.recv() => {
            debug!(connection_id = handle.id(), "Closed during the handshake");
            finish(&handle, &events_tx, &registry);
            return;
        }
    };

    let (mut ws_sink, mut ws_read) = ws_stream.split();

    if !handle.mark_open() {
        // Closed while the handshake was in flight
        let _ = ws_sink.send(Message::Close(None)).await;
        finish(&handle, &events_tx, &registry);
        return;
    }

    info!(connection_id = handle.id(), "Match connection open");
    let _ = events_tx.send(ConnectionEvent::Opened);

    loop {
        tokio::select! {
            outbound = outbound_rx.recv() => match outbound {
                Some(Outbound::Text(json)) => {
                    if let Err(e) = ws_sink.send(Message::Text(json)).await {
                        warn!(connection_id = handle.id(), error = %e, "Socket send failed");
                        break;
                    }
                }
                Some(Outbound::Close) | None => {
                    let _ = ws_sink.send(Message::Close(None)).await;
                    break;
                }
            },
            incoming = ws_read.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if events_tx.send(ConnectionEvent::Message(text)).is_err() {
                        debug!(connection_id = handle.id(), "Event receiver dropped");
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    info!(connection_id = handle.id(), "Server closed match connection");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(connection_id = handle.id(), error = %e, "Socket read error");
                    break;
                }
            },
        }
    }

    finish(&handle, &events_tx, &registry);
}

fn finish(
    handle: &ConnectionHandle,
    events_tx: &mpsc::UnboundedSender<ConnectionEvent>,
    registry: &ConnectionRegistry,
) {
    handle.mark_closed();
    registry.clear_if(handle.id());
    let _ = events_tx.send(ConnectionEvent::Closed);
}

//! Realtime channel: one WebSocket per room view with named-event listeners.
//!
//! ## Design
//! - The socket lives in a spawned task; the channel talks to it through an
//!   unbounded mpsc of outbound frames and an atomic connection state.
//! - Listeners are kept per [`EventKind`] behind `Arc<Mutex<..>>` and are
//!   called outside the lock, in registration order.
//! - [`RealtimeChannel::on`] hands back a [`Subscription`]; dropping it
//!   unregisters the callback.
//! - Inbound text frames are JSON with a `type` field. Unknown types and bad
//!   JSON are logged and skipped. `Close`/`Error` are synthesized from the
//!   transport, except after a local [`RealtimeChannel::close`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, Weak};

use futures_util::{SinkExt, StreamExt};
use reqwest::Url;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, warn};

use crate::error::{ChatError, Result};
use crate::message::{ChannelEvent, ChatEvent, EventKind};

type Callback = Arc<dyn Fn(&ChannelEvent) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    by_kind: HashMap<EventKind, Vec<(u64, Callback)>>,
}

type SharedListeners = Arc<Mutex<Listeners>>;

/// Lifecycle of the current socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

impl ConnectionState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => ConnectionState::Connecting,
            1 => ConnectionState::Open,
            _ => ConnectionState::Closed,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            ConnectionState::Connecting => 0,
            ConnectionState::Open => 1,
            ConnectionState::Closed => 2,
        }
    }
}

struct ConnShared {
    state: AtomicU8,
    closed_locally: AtomicBool,
}

impl ConnShared {
    fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    fn closed_locally(&self) -> bool {
        self.closed_locally.load(Ordering::Acquire)
    }
}

struct Connection {
    outbound: mpsc::UnboundedSender<WsMessage>,
    shared: Arc<ConnShared>,
    task: JoinHandle<()>,
}

/// Handle for one registered listener. Dropping it unregisters the callback.
#[must_use = "dropping a Subscription unregisters its callback"]
pub struct Subscription {
    id: u64,
    kind: EventKind,
    listeners: Weak<Mutex<Listeners>>,
}

impl Subscription {
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Unregister now.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(listeners) = self.listeners.upgrade() else {
            return;
        };
        if let Ok(mut guard) = listeners.lock() {
            if let Some(list) = guard.by_kind.get_mut(&self.kind) {
                list.retain(|(id, _)| *id != self.id);
            }
        };
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .finish()
    }
}

/// A room's live connection.
pub struct RealtimeChannel {
    server: Url,
    listeners: SharedListeners,
    conn: Option<Connection>,
}

impl RealtimeChannel {
    /// `server` is the HTTP base URL; the socket URL is derived from it.
    pub fn new(server: Url) -> Self {
        Self {
            server,
            listeners: Arc::new(Mutex::new(Listeners::default())),
            conn: None,
        }
    }

    /// Close any previous socket and open `/ws/{room_id}/{username}`.
    ///
    /// Returns once the connection task is spawned; the handshake finishes
    /// in the background. Must be called from within a tokio runtime.
    pub fn connect(&mut self, room_id: &str, username: &str) -> Result<()> {
        self.close();
        let url = socket_url(&self.server, room_id, username)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(ConnShared {
            state: AtomicU8::new(ConnectionState::Connecting.as_u8()),
            closed_locally: AtomicBool::new(false),
        });
        info!(%url, "connecting");
        let task = tokio::spawn(run_socket(
            url.to_string(),
            rx,
            shared.clone(),
            self.listeners.clone(),
        ));
        self.conn = Some(Connection {
            outbound: tx,
            shared,
            task,
        });
        Ok(())
    }

    /// Register `callback` for `kind`.
    pub fn on<F>(&self, kind: EventKind, callback: F) -> Subscription
    where
        F: Fn(&ChannelEvent) + Send + Sync + 'static,
    {
        let callback: Callback = Arc::new(callback);
        let mut id = 0;
        if let Ok(mut guard) = self.listeners.lock() {
            guard.next_id += 1;
            id = guard.next_id;
            guard.by_kind.entry(kind).or_default().push((id, callback));
        }
        Subscription {
            id,
            kind,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    /// Number of live listeners for `kind`.
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners
            .lock()
            .map(|g| g.by_kind.get(&kind).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    /// Send `payload` if the socket is open. Anything sent while connecting
    /// or after close is dropped; the return value says which happened.
    pub fn send(&self, payload: &ChatEvent) -> bool {
        let Some(conn) = &self.conn else {
            debug!(kind = %payload.kind(), "no socket, dropping frame");
            return false;
        };
        if conn.shared.state() != ConnectionState::Open {
            debug!(kind = %payload.kind(), state = ?conn.shared.state(), "socket not open, dropping frame");
            return false;
        }
        let text = match serde_json::to_string(payload) {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "could not encode frame");
                return false;
            }
        };
        conn.outbound.send(WsMessage::Text(text)).is_ok()
    }

    /// Close the socket if there is one. Calling it again does nothing.
    pub fn close(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        conn.shared.closed_locally.store(true, Ordering::Release);
        match conn.shared.state() {
            ConnectionState::Connecting => conn.task.abort(),
            ConnectionState::Open => {
                let _ = conn.outbound.send(WsMessage::Close(None));
            }
            ConnectionState::Closed => {}
        }
        conn.shared.set_state(ConnectionState::Closed);
        debug!("socket closed locally");
    }

    pub fn state(&self) -> ConnectionState {
        self.conn
            .as_ref()
            .map_or(ConnectionState::Closed, |c| c.shared.state())
    }

    /// Route one inbound text frame to listeners.
    pub(crate) fn dispatch_frame(&self, text: &str) {
        dispatch_frame(&self.listeners, text);
    }
}

impl Drop for RealtimeChannel {
    fn drop(&mut self) {
        self.close();
    }
}

/// `ws://` or `wss://` URL for a room socket on `server`.
pub fn socket_url(server: &Url, room_id: &str, username: &str) -> Result<Url> {
    let scheme = match server.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(ChatError::Validation(format!(
                "cannot derive a socket url from scheme {other}"
            )))
        }
    };
    let mut url = server.clone();
    url.set_scheme(scheme)
        .map_err(|_| ChatError::Validation(format!("cannot switch {server} to {scheme}")))?;
    url.set_query(None);
    url.set_fragment(None);
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| ChatError::Validation(format!("{server} cannot carry a path")))?;
        path.pop_if_empty().extend(["ws", room_id, username]);
    }
    Ok(url)
}

fn dispatch(listeners: &SharedListeners, event: &ChannelEvent) {
    let callbacks: Vec<Callback> = match listeners.lock() {
        Ok(guard) => guard
            .by_kind
            .get(&event.kind())
            .map(|list| list.iter().map(|(_, cb)| cb.clone()).collect())
            .unwrap_or_default(),
        Err(_) => return,
    };
    for callback in callbacks {
        callback(event);
    }
}

fn dispatch_frame(listeners: &SharedListeners, text: &str) {
    let parsed: serde_json::Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "ignoring non-JSON frame");
            return;
        }
    };
    let Some(kind) = parsed.get("type").and_then(|v| v.as_str()).map(str::to_string) else {
        debug!("ignoring frame without type");
        return;
    };
    match serde_json::from_value::<ChatEvent>(parsed) {
        Ok(event) => dispatch(listeners, &ChannelEvent::Message(event)),
        Err(e) => debug!(kind = %kind, error = %e, "ignoring frame"),
    }
}

async fn run_socket(
    url: String,
    mut outbound: mpsc::UnboundedReceiver<WsMessage>,
    shared: Arc<ConnShared>,
    listeners: SharedListeners,
) {
    let ws = match tokio_tungstenite::connect_async(url.as_str()).await {
        Ok((ws, _response)) => ws,
        Err(e) => {
            error!(%url, error = %e, "websocket handshake failed");
            shared.set_state(ConnectionState::Closed);
            if !shared.closed_locally() {
                dispatch(&listeners, &ChannelEvent::Error(e.to_string()));
                dispatch(&listeners, &ChannelEvent::Closed);
            }
            return;
        }
    };
    if shared.closed_locally() {
        return;
    }
    shared.set_state(ConnectionState::Open);
    info!(%url, "websocket open");

    let (mut sink, mut stream) = ws.split();

    loop {
        tokio::select! {
            out = outbound.recv() => match out {
                Some(WsMessage::Close(frame)) => {
                    let _ = sink.send(WsMessage::Close(frame)).await;
                    break;
                }
                Some(msg) => {
                    if let Err(e) = sink.send(msg).await {
                        error!(error = %e, "websocket send failed");
                        if !shared.closed_locally() {
                            dispatch(&listeners, &ChannelEvent::Error(e.to_string()));
                        }
                        break;
                    }
                }
                None => {
                    let _ = sink.close().await;
                    break;
                }
            },
            incoming = stream.next() => match incoming {
                Some(Ok(WsMessage::Text(text))) => dispatch_frame(&listeners, &text),
                Some(Ok(WsMessage::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    error!(error = %e, "websocket read failed");
                    if !shared.closed_locally() {
                        dispatch(&listeners, &ChannelEvent::Error(e.to_string()));
                    }
                    break;
                }
            },
        }
    }

    shared.set_state(ConnectionState::Closed);
    if !shared.closed_locally() {
        info!(%url, "websocket closed by peer");
        dispatch(&listeners, &ChannelEvent::Closed);
    }
}

// crates/live/src/channel.rs
//! WebSocket client for the ticket hub: one shared connection per process,
//! automatic reconnect with backoff, and broadcast fan-out of ticket events
//! to every subscribed detail session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use ticketflow_types::TokenStore;

use crate::protocol::{ClientMessage, TicketEvent};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Timing knobs for the connection task. Defaults suit production; tests
/// shrink them.
#[derive(Debug, Clone)]
pub struct LiveConfig {
    pub heartbeat_interval: Duration,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// How often to re-check for a credential when none is stored.
    pub credential_poll_interval: Duration,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(30),
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            credential_poll_interval: Duration::from_secs(10),
        }
    }
}

/// Handle to the process-wide live update channel.
///
/// Construct exactly one per process and clone the handle everywhere a
/// session needs it — each `LiveChannel::new` owns its own underlying
/// connection, so two instances would mean two connections.
///
/// `join`/`leave` never fail loudly: if the connection cannot be
/// established the channel logs and the detail view degrades to poll-only.
#[derive(Clone)]
pub struct LiveChannel {
    inner: Arc<ChannelInner>,
}

struct ChannelInner {
    ws_url: String,
    tokens: TokenStore,
    config: LiveConfig,
    events: broadcast::Sender<TicketEvent>,
    cmd_tx: mpsc::UnboundedSender<ClientMessage>,
    /// Taken exactly once by the connection task.
    cmd_rx: Mutex<Option<mpsc::UnboundedReceiver<ClientMessage>>>,
    /// Most recently joined ticket; re-joined after every reconnect since
    /// server-side room membership does not survive the transport.
    last_ticket: Mutex<Option<i64>>,
    /// Guards against spawning a second connection task while the first
    /// is still establishing.
    started: AtomicBool,
    connected: AtomicBool,
}

impl LiveChannel {
    pub fn new(ws_url: impl Into<String>, tokens: TokenStore) -> Self {
        Self::with_config(ws_url, tokens, LiveConfig::default())
    }

    pub fn with_config(ws_url: impl Into<String>, tokens: TokenStore, config: LiveConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(ChannelInner {
                ws_url: ws_url.into(),
                tokens,
                config,
                events,
                cmd_tx,
                cmd_rx: Mutex::new(Some(cmd_rx)),
                last_ticket: Mutex::new(None),
                started: AtomicBool::new(false),
                connected: AtomicBool::new(false),
            }),
        }
    }

    /// Fan-out stream of every hub event. No per-ticket filtering here;
    /// callers match against their own ticket id.
    pub fn subscribe(&self) -> broadcast::Receiver<TicketEvent> {
        self.inner.events.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    /// Remember `ticket_id`, lazily start the connection task (only when a
    /// credential is present) and request to join the ticket's room.
    ///
    /// Never errors toward the caller: a connection that cannot be
    /// established is logged and the session runs poll-only. If the
    /// connection is still being established, the post-connect rejoin
    /// delivers this join — no duplicate connection attempt is started.
    pub fn join(&self, ticket_id: i64) {
        self.inner.set_last_ticket(Some(ticket_id));

        if !self.ensure_started() {
            debug!(ticket_id, "no credential present, live updates disabled");
            return;
        }

        if self.is_connected() {
            let _ = self
                .inner
                .cmd_tx
                .send(ClientMessage::JoinTicket { ticket_id });
        }
    }

    /// Leave the ticket's room and forget it as the rejoin target if it
    /// still is one.
    pub fn leave(&self, ticket_id: i64) {
        if self.inner.last_ticket() == Some(ticket_id) {
            self.inner.set_last_ticket(None);
        }

        if self.is_connected() {
            let _ = self
                .inner
                .cmd_tx
                .send(ClientMessage::LeaveTicket { ticket_id });
        }
    }

    /// Spawn the connection task once. Returns false when no credential is
    /// stored (connection stays down until a join happens after sign-in).
    fn ensure_started(&self) -> bool {
        if !self.inner.tokens.is_present() {
            return false;
        }
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return true;
        }

        let receiver = match self.inner.cmd_rx.lock() {
            Ok(mut guard) => guard.take(),
            Err(e) => {
                warn!("live command receiver lock poisoned: {e}");
                None
            }
        };
        let Some(cmd_rx) = receiver else {
            return true;
        };

        tokio::spawn(run(Arc::downgrade(&self.inner), cmd_rx));
        true
    }
}

impl ChannelInner {
    fn last_ticket(&self) -> Option<i64> {
        match self.last_ticket.lock() {
            Ok(guard) => *guard,
            Err(e) => {
                warn!("last-ticket lock poisoned: {e}");
                None
            }
        }
    }

    fn set_last_ticket(&self, value: Option<i64>) {
        match self.last_ticket.lock() {
            Ok(mut guard) => *guard = value,
            Err(e) => warn!("last-ticket lock poisoned: {e}"),
        }
    }
}

/// Connection loop: connect, pump, reconnect with exponential backoff.
///
/// Holds the channel state only weakly between attempts, so the task winds
/// down once every `LiveChannel` handle is gone instead of reconnecting to
/// a hub nobody listens to. An active connection pins the state until it
/// closes.
async fn run(channel: Weak<ChannelInner>, mut cmd_rx: mpsc::UnboundedReceiver<ClientMessage>) {
    let config = match channel.upgrade() {
        Some(inner) => {
            info!(url = %inner.ws_url, "live channel starting");
            inner.config.clone()
        }
        None => return,
    };
    let mut backoff = config.initial_backoff;

    loop {
        let Some(inner) = channel.upgrade() else {
            debug!("all live channel handles dropped, stopping");
            return;
        };

        let Some(token) = inner.tokens.get() else {
            // Credential cleared by a 401; wait for re-authentication.
            drop(inner);
            tokio::time::sleep(config.credential_poll_interval).await;
            continue;
        };

        match connect_and_pump(&inner, &token, &mut cmd_rx).await {
            Ok(()) => {
                info!("live connection closed cleanly");
                backoff = config.initial_backoff;
            }
            Err(e) => {
                warn!(backoff_ms = backoff.as_millis() as u64, "live connection failed: {e}");
            }
        }
        inner.connected.store(false, Ordering::SeqCst);
        drop(inner);

        tokio::time::sleep(backoff).await;
        backoff = (backoff * 2).min(config.max_backoff);
    }
}

async fn connect_and_pump(
    inner: &ChannelInner,
    token: &str,
    cmd_rx: &mut mpsc::UnboundedReceiver<ClientMessage>,
) -> Result<(), String> {
    let mut request = inner
        .ws_url
        .as_str()
        .into_client_request()
        .map_err(|e| format!("bad hub url: {e}"))?;
    let bearer = format!("Bearer {token}")
        .parse()
        .map_err(|e| format!("bad bearer header: {e}"))?;
    request.headers_mut().insert(AUTHORIZATION, bearer);

    let (ws_stream, _) = connect_async(request)
        .await
        .map_err(|e| format!("WS connect failed: {e}"))?;
    let (mut sink, mut stream) = ws_stream.split();

    inner.connected.store(true, Ordering::SeqCst);
    info!("live channel connected");

    // Room membership is per-connection on the server; rejoin the ticket we
    // were last watching.
    if let Some(ticket_id) = inner.last_ticket() {
        let join = ClientMessage::JoinTicket { ticket_id };
        let text = serde_json::to_string(&join).unwrap_or_default();
        sink.send(Message::Text(text.into()))
            .await
            .map_err(|e| format!("join send failed: {e}"))?;
        debug!(ticket_id, "rejoined ticket room");
    }

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(msg) => {
                        let text = serde_json::to_string(&msg).unwrap_or_default();
                        if sink.send(Message::Text(text.into())).await.is_err() {
                            return Ok(());
                        }
                    }
                    // The sender lives in the channel state we pin while
                    // connected; close out if it is ever torn down.
                    None => return Ok(()),
                }
            }
            _ = tokio::time::sleep(inner.config.heartbeat_interval) => {
                if sink.send(Message::Ping(vec![].into())).await.is_err() {
                    return Ok(());
                }
            }
            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<TicketEvent>(&text) {
                            // No receivers is fine; nobody is watching a ticket.
                            Ok(event) => { let _ = inner.events.send(event); }
                            Err(e) => debug!("ignoring unknown hub frame: {e}"),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => return Ok(()),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(format!("live stream error: {e}")),
                }
            }
        }
    }
}

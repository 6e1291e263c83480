//! WebSocket implementation of the push channel.
//!
//! A background supervisor task owns the connection: it opens the socket,
//! pumps inbound frames into the cache and outbound frames onto the wire,
//! and schedules retries. Every state change it makes is tagged with the
//! epoch it was started under; `connect()` and `disconnect()` bump the
//! epoch, so a superseded supervisor can never move the state again.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use greenthumb_proto::codec;
use greenthumb_proto::event::{Inbound, OutboundMessage};

use super::{ChannelError, ChannelEvent, ConnectionState, RetryBudget};
use crate::cache::SharedCache;
use crate::config::RealtimeConfig;

/// Type alias for an open client WebSocket.
type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Close reason reported when this side ends the session.
const CLOSED_BY_CLIENT: &str = "closed by client";

/// Mutable channel state, guarded by one lock.
#[derive(Debug)]
struct Inner {
    state: ConnectionState,
    /// Bumped by every `connect()`/`disconnect()`.
    epoch: u64,
    /// Writer handle of the open session, present only while `Connected`.
    outbound: Option<mpsc::UnboundedSender<Message>>,
}

/// State shared between the handle and its supervisor task.
#[derive(Debug)]
struct Shared {
    inner: Mutex<Inner>,
    events: broadcast::Sender<ChannelEvent>,
    cache: SharedCache,
}

impl Shared {
    /// Publish `event` if `epoch` is still current. Returns `false` once the
    /// supervisor has been superseded.
    fn publish(&self, epoch: u64, event: ChannelEvent) -> bool {
        let inner = self.inner.lock();
        if inner.epoch != epoch {
            return false;
        }
        // No subscribers is fine.
        let _ = self.events.send(event);
        true
    }

    /// Move to `next` if `epoch` is still current.
    fn transition(&self, epoch: u64, next: ConnectionState) -> bool {
        let mut inner = self.inner.lock();
        if inner.epoch != epoch {
            return false;
        }
        Self::set_state(&mut inner, &self.events, next);
        true
    }

    fn set_state(
        inner: &mut Inner,
        events: &broadcast::Sender<ChannelEvent>,
        next: ConnectionState,
    ) {
        if inner.state == next {
            return;
        }
        tracing::debug!(from = %inner.state, to = %next, "push channel state change");
        inner.state = next;
        let _ = events.send(ChannelEvent::StateChanged(next));
    }

    fn mark_connected(&self, epoch: u64, outbound: mpsc::UnboundedSender<Message>) -> bool {
        let mut inner = self.inner.lock();
        if inner.epoch != epoch {
            return false;
        }
        inner.outbound = Some(outbound);
        Self::set_state(&mut inner, &self.events, ConnectionState::Connected);
        let _ = self.events.send(ChannelEvent::Opened);
        true
    }

    fn mark_closed(&self, epoch: u64, reason: Option<String>) -> bool {
        let mut inner = self.inner.lock();
        if inner.epoch != epoch {
            return false;
        }
        inner.outbound = None;
        let _ = self.events.send(ChannelEvent::Closed { reason });
        true
    }

    fn give_up(&self, epoch: u64, attempts: u32) {
        let mut inner = self.inner.lock();
        if inner.epoch != epoch {
            return;
        }
        Self::set_state(&mut inner, &self.events, ConnectionState::Disconnected);
        let _ = self.events.send(ChannelEvent::GaveUp { attempts });
    }

    /// Decode one inbound frame and apply it. Never fails the session.
    fn handle_frame(&self, epoch: u64, bytes: &[u8]) {
        match codec::decode(bytes) {
            Ok(Inbound::Task(event)) => {
                let inner = self.inner.lock();
                if inner.epoch != epoch {
                    return;
                }
                // Cache first, so observers see the post-event state.
                self.cache.lock().apply(&event);
                tracing::debug!(
                    kind = event.kind(),
                    task_id = %event.task_id(),
                    "applied push event"
                );
                let _ = self.events.send(ChannelEvent::Task(event));
            }
            Ok(Inbound::Unrecognized { kind }) => {
                tracing::debug!(kind = %kind, "ignoring push frame of unknown type");
                self.publish(epoch, ChannelEvent::Unrecognized { kind });
            }
            Err(err) => {
                tracing::warn!(err = %err, "malformed push frame, skipping");
                self.publish(epoch, ChannelEvent::Malformed(err));
            }
        }
    }
}

/// Reconnecting WebSocket client for the calendar push channel.
///
/// Created idle; call [`connect`](Self::connect) to start. Dropping the
/// channel cancels the supervisor, including any pending retry.
pub struct EventChannel {
    url: String,
    config: RealtimeConfig,
    shared: Arc<Shared>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl EventChannel {
    /// Create an idle channel that will apply pushed events to `cache`.
    pub fn new(url: impl Into<String>, config: RealtimeConfig, cache: SharedCache) -> Self {
        let (events, _) = broadcast::channel(config.event_buffer.max(1));
        Self {
            url: url.into(),
            config,
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    state: ConnectionState::Disconnected,
                    epoch: 0,
                    outbound: None,
                }),
                events,
                cache,
            }),
            supervisor: Mutex::new(None),
        }
    }

    /// Return the WebSocket URL this channel connects to.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.shared.inner.lock().state
    }

    /// Register a new observer. Dropping the receiver unregisters it.
    ///
    /// Receivers that fall more than the configured buffer behind observe
    /// `RecvError::Lagged` and skip ahead; the cache itself is never skipped.
    pub fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.shared.events.subscribe()
    }

    /// Start connecting. No-op unless the channel is `Disconnected`.
    ///
    /// The retry budget starts full on every call.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn connect(&self) {
        let epoch = {
            let mut inner = self.shared.inner.lock();
            if inner.state != ConnectionState::Disconnected {
                tracing::debug!(state = %inner.state, "connect() ignored, channel already active");
                return;
            }
            inner.epoch += 1;
            Shared::set_state(&mut inner, &self.shared.events, ConnectionState::Connecting);
            inner.epoch
        };

        tracing::info!(url = %self.url, "starting push channel");
        let handle = tokio::spawn(supervise(
            Arc::clone(&self.shared),
            epoch,
            self.url.clone(),
            self.config.clone(),
        ));
        if let Some(previous) = self.supervisor.lock().replace(handle) {
            previous.abort();
        }
    }

    /// Stop the channel and cancel any pending retry.
    ///
    /// An open connection is closed with a Close frame and reported as
    /// [`ChannelEvent::Closed`]. No further automatic attempts happen until
    /// the next [`connect`](Self::connect).
    pub fn disconnect(&self) {
        let was_connected = {
            let mut inner = self.shared.inner.lock();
            inner.epoch += 1;
            let was_connected = match inner.outbound.take() {
                Some(outbound) => outbound.send(Message::Close(None)).is_ok(),
                None => false,
            };
            if was_connected {
                let _ = self.shared.events.send(ChannelEvent::Closed {
                    reason: Some(CLOSED_BY_CLIENT.to_string()),
                });
            }
            Shared::set_state(&mut inner, &self.shared.events, ConnectionState::Disconnected);
            was_connected
        };

        if let Some(handle) = self.supervisor.lock().take() {
            // An open session exits on its own after sending the Close frame;
            // anything else is waiting on a dial or a retry timer.
            if !was_connected {
                handle.abort();
            }
        }
        tracing::info!(url = %self.url, "push channel disconnected by caller");
    }

    /// Send a message to the server.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::NotConnected`] (and logs a warning) when the
    /// channel is not `Connected`; nothing is queued. Returns
    /// [`ChannelError::Encode`] if the message cannot be encoded.
    pub fn send(&self, msg: &OutboundMessage) -> Result<(), ChannelError> {
        let text = codec::encode(msg).map_err(|e| ChannelError::Encode(e.to_string()))?;

        let inner = self.shared.inner.lock();
        match (&inner.state, &inner.outbound) {
            (ConnectionState::Connected, Some(outbound)) => outbound
                .send(Message::Text(text.into()))
                .map_err(|_| ChannelError::NotConnected),
            _ => {
                tracing::warn!(
                    kind = %msg.kind,
                    state = %inner.state,
                    "dropping outbound message, channel not connected"
                );
                Err(ChannelError::NotConnected)
            }
        }
    }
}

impl Drop for EventChannel {
    fn drop(&mut self) {
        self.shared.inner.lock().epoch += 1;
        if let Some(handle) = self.supervisor.lock().take() {
            handle.abort();
        }
    }
}

/// Supervisor: open, run, and retry until the budget is spent or the
/// epoch is superseded. Entered in the `Connecting` state.
async fn supervise(shared: Arc<Shared>, epoch: u64, url: String, config: RealtimeConfig) {
    let mut budget = RetryBudget::new(config.reconnect.max_attempts);

    loop {
        match open(&url, config.connect_timeout).await {
            Ok(ws) => {
                let (tx, rx) = mpsc::unbounded_channel();
                if !shared.mark_connected(epoch, tx) {
                    return;
                }
                budget.reset();
                tracing::info!(url = %url, "push channel open");

                let reason = run_session(&shared, epoch, ws, rx).await;
                tracing::info!(url = %url, reason = ?reason, "push channel closed");
                if !shared.mark_closed(epoch, reason) {
                    return;
                }
            }
            Err(err) => {
                tracing::warn!(
                    url = %url,
                    err = %err,
                    attempt = budget.attempts(),
                    "push channel open failed"
                );
                if !shared.publish(epoch, ChannelEvent::Error(err)) {
                    return;
                }
            }
        }

        if !shared.transition(epoch, ConnectionState::Reconnecting) {
            return;
        }
        let Some(attempt) = budget.next_attempt() else {
            tracing::warn!(
                url = %url,
                attempts = budget.attempts(),
                "push channel retry budget spent, staying disconnected until connect()"
            );
            shared.give_up(epoch, budget.attempts());
            return;
        };

        let delay = config.reconnect.delay;
        tracing::info!(attempt, delay_ms = delay.as_millis(), "scheduling push channel retry");
        if !shared.publish(epoch, ChannelEvent::ReconnectScheduled { attempt, delay }) {
            return;
        }
        tokio::time::sleep(delay).await;

        if !shared.transition(epoch, ConnectionState::Connecting) {
            return;
        }
    }
}

/// Open the socket, bounded by `timeout`.
async fn open(url: &str, timeout: Duration) -> Result<WsStream, ChannelError> {
    let (ws, _response) = tokio::time::timeout(timeout, connect_async(url))
        .await
        .map_err(|_| ChannelError::ConnectTimeout(timeout))?
        .map_err(|e| ChannelError::Connect(e.to_string()))?;
    Ok(ws)
}

/// Pump frames until the connection ends. Returns the close reason, if any.
async fn run_session(
    shared: &Shared,
    epoch: u64,
    ws: WsStream,
    mut outbound: mpsc::UnboundedReceiver<Message>,
) -> Option<String> {
    let (mut sink, mut stream) = ws.split();

    loop {
        tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => shared.handle_frame(epoch, text.as_str().as_bytes()),
                Some(Ok(Message::Binary(data))) => shared.handle_frame(epoch, &data),
                Some(Ok(Message::Close(frame))) => {
                    return frame.map(|f| f.reason.as_str().to_string());
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
                Some(Err(e)) => {
                    tracing::warn!(err = %e, "push channel read error");
                    shared.publish(epoch, ChannelEvent::Error(ChannelError::Transport(e.to_string())));
                    return Some(e.to_string());
                }
                None => return None,
            },
            msg = outbound.recv() => match msg {
                Some(msg) => {
                    let closing = matches!(msg, Message::Close(_));
                    if let Err(e) = sink.send(msg).await {
                        tracing::warn!(err = %e, "push channel write error");
                        shared.publish(epoch, ChannelEvent::Error(ChannelError::Transport(e.to_string())));
                        return Some(e.to_string());
                    }
                    if closing {
                        return Some(CLOSED_BY_CLIENT.to_string());
                    }
                }
                None => {
                    let _ = sink.close().await;
                    return Some(CLOSED_BY_CLIENT.to_string());
                }
            },
        }
    }
}

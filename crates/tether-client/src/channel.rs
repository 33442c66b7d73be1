//! The channel client.
//!
//! [`ChannelClient`] owns a background driver task that dials the WebSocket
//! endpoint, pumps envelopes both ways, sends heartbeat pings, and reconnects
//! with capped exponential backoff when the transport drops. Once the retry
//! budget is spent the driver stops and the client stays `Disconnected`
//! until the application asks for a fresh connection. The client only
//! exposes connection state; escalation decisions belong to the caller,
//! who can stop the driver early through a [`RetryGate`] (see the
//! [`resilient`](crate::resilient) layer).
//!
//! Reserved `pong` envelopes are consumed here; the application only ever
//! sees its own message types on the inbound receiver.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use tether_core::backoff::backoff_delay;
use tether_core::Envelope;

use crate::config::ClientConfig;
use crate::state::{ChannelMode, ConnectionStatus};

/// Queue depths for the in-process envelope channels.
const INBOUND_QUEUE: usize = 256;
const OUTBOUND_QUEUE: usize = 64;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Caller-side policy consulted by the driver after every dial.
///
/// Returning `true` from [`RetryGate::dial_failed`] stops the driver
/// immediately, before the reconnect budget is spent. What the caller does
/// with a stopped driver is its own business; the client never decides to
/// abandon the WebSocket on its own.
pub trait RetryGate: Send + Sync {
    /// A dial failed. Return `true` to stop the driver.
    fn dial_failed(&self) -> bool;

    /// A dial succeeded.
    fn dial_succeeded(&self) {}
}

struct Inner {
    config: ClientConfig,
    status: watch::Sender<ConnectionStatus>,
    mode: watch::Sender<ChannelMode>,
    inbound: mpsc::Sender<Envelope>,
    /// Set only while a transport is live.
    outbound: Mutex<Option<mpsc::Sender<String>>>,
    gate: Option<Arc<dyn RetryGate>>,
    /// Consecutive reconnect attempts; reset on every successful dial.
    attempts: AtomicU32,
    /// Total transport dials over the client's lifetime.
    total_attempts: AtomicU32,
}

impl Inner {
    fn set_status(&self, status: ConnectionStatus) {
        let _ = self.status.send_replace(status);
    }

    fn set_mode(&self, mode: ChannelMode) {
        let _ = self.mode.send_replace(mode);
    }
}

/// Client side of the channel.
///
/// Constructed with [`ChannelClient::new`], which also yields the inbound
/// envelope receiver. [`connect`] is idempotent; [`send`] is fire-and-forget
/// over the live transport.
///
/// [`connect`]: ChannelClient::connect
/// [`send`]: ChannelClient::send
pub struct ChannelClient {
    inner: Arc<Inner>,
    driver: Mutex<Option<(JoinHandle<()>, CancellationToken)>>,
}

impl ChannelClient {
    /// Create a client and the receiver on which application envelopes
    /// arrive. No transport is dialed until [`ChannelClient::connect`].
    pub fn new(config: ClientConfig) -> (Self, mpsc::Receiver<Envelope>) {
        Self::build(config, None)
    }

    /// Like [`ChannelClient::new`], with a retry gate the driver consults
    /// after every dial.
    pub fn with_gate(
        config: ClientConfig,
        gate: Arc<dyn RetryGate>,
    ) -> (Self, mpsc::Receiver<Envelope>) {
        Self::build(config, Some(gate))
    }

    fn build(
        config: ClientConfig,
        gate: Option<Arc<dyn RetryGate>>,
    ) -> (Self, mpsc::Receiver<Envelope>) {
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_QUEUE);
        let (status_tx, _) = watch::channel(ConnectionStatus::Disconnected);
        let (mode_tx, _) = watch::channel(ChannelMode::Direct);

        let inner = Arc::new(Inner {
            config,
            status: status_tx,
            mode: mode_tx,
            inbound: inbound_tx,
            outbound: Mutex::new(None),
            gate,
            attempts: AtomicU32::new(0),
            total_attempts: AtomicU32::new(0),
        });
        (
            Self {
                inner,
                driver: Mutex::new(None),
            },
            inbound_rx,
        )
    }

    /// Start (or restart) the connection driver.
    ///
    /// Idempotent: a call while the driver is already running is a no-op.
    /// A call after the driver went terminal (budget exhausted, stopped by
    /// its gate, or closed) starts over with a fresh attempt counter.
    pub fn connect(&self) {
        let mut driver = self.driver.lock();
        if driver.as_ref().is_some_and(|(handle, _)| !handle.is_finished()) {
            debug!("connect ignored: driver already running");
            return;
        }

        self.inner.attempts.store(0, Ordering::SeqCst);
        self.inner.set_mode(ChannelMode::Direct);

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_driver(self.inner.clone(), cancel.clone()));
        *driver = Some((handle, cancel));
    }

    /// Tear down the transport and stop reconnecting.
    pub fn close(&self) {
        if let Some((_, cancel)) = self.driver.lock().as_ref() {
            cancel.cancel();
        }
    }

    /// Send an envelope over the live transport.
    ///
    /// Returns `false` (with a warning) when no transport is up or the
    /// outbound queue is full; the envelope is dropped, not buffered.
    pub fn send(&self, envelope: &Envelope) -> bool {
        let guard = self.inner.outbound.lock();
        if let Some(tx) = guard.as_ref() {
            if tx.try_send(envelope.to_json()).is_ok() {
                return true;
            }
        }
        drop(guard);
        warn!(kind = %envelope.kind, "send dropped: channel not connected");
        // Nudge a stopped driver back to life, unless it spent the whole
        // budget.
        let attempts = self.inner.attempts.load(Ordering::SeqCst);
        if !self.is_running() && attempts < self.inner.config.reconnect.max_attempts {
            debug!("send while disconnected, restarting driver");
            self.connect();
        }
        false
    }

    /// Current connection status.
    pub fn status(&self) -> ConnectionStatus {
        *self.inner.status.borrow()
    }

    /// Watch connection status changes.
    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.inner.status.subscribe()
    }

    /// Current channel mode.
    pub fn mode(&self) -> ChannelMode {
        *self.inner.mode.borrow()
    }

    /// Watch channel mode changes.
    pub fn subscribe_mode(&self) -> watch::Receiver<ChannelMode> {
        self.inner.mode.subscribe()
    }

    /// Whether the driver task is currently running.
    pub fn is_running(&self) -> bool {
        self.driver
            .lock()
            .as_ref()
            .is_some_and(|(handle, _)| !handle.is_finished())
    }

    /// Total transport dials since the client was created.
    pub fn total_attempts(&self) -> u32 {
        self.inner.total_attempts.load(Ordering::SeqCst)
    }
}

impl Drop for ChannelClient {
    fn drop(&mut self) {
        self.close();
    }
}

/// Dial, pump, and reconnect until cancelled or terminal.
async fn run_driver(inner: Arc<Inner>, cancel: CancellationToken) {
    loop {
        inner.set_status(ConnectionStatus::Connecting);
        let _ = inner.total_attempts.fetch_add(1, Ordering::SeqCst);

        let dial = tokio::select! {
            result = connect_async(inner.config.url.as_str()) => result,
            () = cancel.cancelled() => break,
        };

        match dial {
            Ok((ws, _)) => {
                info!(url = %inner.config.url, "channel connected");
                inner.attempts.store(0, Ordering::SeqCst);
                if let Some(gate) = &inner.gate {
                    gate.dial_succeeded();
                }
                inner.set_mode(ChannelMode::Direct);
                inner.set_status(ConnectionStatus::Connected);

                run_connection(&inner, ws, &cancel).await;

                *inner.outbound.lock() = None;
                inner.set_status(ConnectionStatus::Disconnected);
                if cancel.is_cancelled() {
                    break;
                }
                info!("transport lost, scheduling reconnect");
            }
            Err(e) => {
                warn!(error = %e, url = %inner.config.url, "dial failed");
                inner.set_status(ConnectionStatus::Disconnected);
                if cancel.is_cancelled() {
                    break;
                }
                if inner.gate.as_ref().is_some_and(|gate| gate.dial_failed()) {
                    info!("retry gate stopped the driver");
                    break;
                }
            }
        }

        let attempt = inner.attempts.load(Ordering::SeqCst);
        if attempt >= inner.config.reconnect.max_attempts {
            warn!(attempt, "reconnect budget exhausted, giving up");
            break;
        }
        let delay = backoff_delay(attempt, &inner.config.reconnect);
        let _ = inner.attempts.fetch_add(1, Ordering::SeqCst);
        inner.set_mode(ChannelMode::Reconnecting);
        debug!(?delay, attempt, "backing off");

        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            () = cancel.cancelled() => break,
        }
    }

    *inner.outbound.lock() = None;
    inner.set_status(ConnectionStatus::Disconnected);
    debug!("driver stopped");
}

/// Pump one live transport until it drops or the client is cancelled.
async fn run_connection(inner: &Arc<Inner>, ws: WsStream, cancel: &CancellationToken) {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let (out_tx, mut out_rx) = mpsc::channel::<String>(OUTBOUND_QUEUE);
    *inner.outbound.lock() = Some(out_tx);

    let mut heartbeat =
        tokio::time::interval(Duration::from_millis(inner.config.heartbeat_interval_ms));
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately; the first real ping goes out one
    // interval after connect.
    let _ = heartbeat.tick().await;

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_inbound(inner, text.as_str()).await;
                    }
                    Some(Ok(Message::Binary(data))) => {
                        if let Ok(text) = std::str::from_utf8(&data) {
                            handle_inbound(inner, text).await;
                        }
                    }
                    // Transport pings are answered by the library.
                    Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
                    Some(Ok(Message::Close(_))) => {
                        info!("server closed the channel");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "transport error");
                        break;
                    }
                    None => break,
                }
            }
            queued = out_rx.recv() => {
                // The sender lives in Inner; recv only yields None when the
                // slot was cleared, which means we are already tearing down.
                let Some(text) = queued else { break };
                if ws_tx.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            _ = heartbeat.tick() => {
                debug!("heartbeat ping");
                if ws_tx.send(Message::Text(Envelope::ping().to_json().into())).await.is_err() {
                    break;
                }
            }
            () = cancel.cancelled() => {
                let _ = ws_tx.send(Message::Close(None)).await;
                break;
            }
        }
    }
}

/// Parse one inbound frame, consume heartbeat replies, forward the rest.
async fn handle_inbound(inner: &Arc<Inner>, raw: &str) {
    let envelope = match Envelope::from_json(raw) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(error = %e, "ignoring malformed frame from server");
            return;
        }
    };
    if envelope.is_pong() {
        debug!("heartbeat acknowledged");
        return;
    }
    if envelope.is_ping() {
        // Servers normally probe at the transport level, but answer the
        // envelope form too.
        let tx = inner.outbound.lock().clone();
        if let Some(tx) = tx {
            let _ = tx.try_send(Envelope::pong().to_json());
        }
        return;
    }
    if inner.inbound.try_send(envelope).is_err() {
        warn!("inbound queue full, dropping envelope");
    }
}

//! Per-connection state for one accepted transport socket.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use tether_core::{ConnectionId, Envelope};

/// Lifecycle state of a connection.
///
/// `Connecting → Open → {Closing → Closed | Closed}`. There is no
/// transition out of `Closed`; a reconnecting peer is a new [`Connection`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// Accepted, handshake not yet complete.
    Connecting,
    /// Live member of the registry.
    Open,
    /// Close initiated, not yet finished.
    Closing,
    /// Terminal. Removed from the registry exactly once at this transition.
    Closed,
}

/// An outbound item queued to the connection's write task.
#[derive(Clone, Debug)]
pub enum Outgoing {
    /// A serialized envelope as a text frame. `Arc` so a broadcast
    /// serializes once and shares the buffer across members.
    Frame(Arc<String>),
    /// A transport-level ping, sent by the liveness sweep.
    Ping,
}

/// One connected client.
pub struct Connection {
    /// Unique connection identity.
    pub id: ConnectionId,
    state: Mutex<ConnectionState>,
    /// Send channel to the connection's socket write task.
    tx: mpsc::Sender<Outgoing>,
    cancel: CancellationToken,
    /// When this connection was accepted.
    pub connected_at: Instant,
    /// Whether any activity arrived since the last sweep check.
    is_alive: AtomicBool,
    last_seen: Mutex<Instant>,
    dropped_messages: AtomicU64,
}

impl Connection {
    /// Create a new connection in the `Connecting` state.
    pub fn new(id: ConnectionId, tx: mpsc::Sender<Outgoing>) -> Self {
        let now = Instant::now();
        Self {
            id,
            state: Mutex::new(ConnectionState::Connecting),
            tx,
            cancel: CancellationToken::new(),
            connected_at: now,
            is_alive: AtomicBool::new(true),
            last_seen: Mutex::new(now),
            dropped_messages: AtomicU64::new(0),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    /// Whether the connection is a live registry member.
    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Complete the handshake: `Connecting → Open`.
    ///
    /// Returns `false` if the connection already left `Connecting`.
    pub fn open(&self) -> bool {
        let mut state = self.state.lock();
        if *state == ConnectionState::Connecting {
            *state = ConnectionState::Open;
            true
        } else {
            false
        }
    }

    /// Mark a close as initiated: `Open → Closing`. No-op otherwise.
    pub fn begin_close(&self) {
        let mut state = self.state.lock();
        if *state == ConnectionState::Open {
            *state = ConnectionState::Closing;
        }
    }

    /// Terminal transition to `Closed`.
    ///
    /// Returns `true` only the first time; later calls are no-ops, which is
    /// what makes registry removal idempotent. Cancels the connection's
    /// token so its session task tears down.
    pub fn close(&self) -> bool {
        let first = {
            let mut state = self.state.lock();
            if *state == ConnectionState::Closed {
                false
            } else {
                *state = ConnectionState::Closed;
                true
            }
        };
        if first {
            self.cancel.cancel();
        }
        first
    }

    /// Token cancelled at the `Closed` transition.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Queue a serialized frame for this connection.
    ///
    /// Returns `false` (and counts the drop) if the connection is not open
    /// or its queue is full/closed. Never blocks and never raises.
    pub fn send_text(&self, text: Arc<String>) -> bool {
        if !self.is_open() {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        if self.tx.try_send(Outgoing::Frame(text)).is_ok() {
            true
        } else {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Serialize an envelope and queue it.
    pub fn send(&self, envelope: &Envelope) -> bool {
        self.send_text(Arc::new(envelope.to_json()))
    }

    /// Queue a transport-level ping.
    pub fn ping(&self) -> bool {
        self.is_open() && self.tx.try_send(Outgoing::Ping).is_ok()
    }

    /// Total messages dropped for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Record inbound activity (any frame proves liveness).
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
        *self.last_seen.lock() = Instant::now();
    }

    /// Check and reset the alive flag for the liveness sweep.
    ///
    /// Returns `true` if any activity arrived since the last check.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Time since the last observed activity.
    pub fn last_seen_elapsed(&self) -> Duration {
        self.last_seen.lock().elapsed()
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

//! WebSocket session lifecycle — one accepted client from upgrade through
//! disconnect.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use tether_core::ConnectionId;

use crate::connection::{Connection, Outgoing};
use crate::registry::Registry;

/// Outbound queue depth per connection.
const OUTBOUND_QUEUE: usize = 256;

/// Run a session for one accepted WebSocket.
///
/// 1. Registers the connection (greeting + initial-state payloads)
/// 2. Forwards queued outbound frames and sweep pings on a write task
/// 3. Dispatches inbound frames through the registry
/// 4. Tears down on close frame, transport error, sweep removal, or server
///    shutdown — removal is idempotent, so racing paths are harmless
#[instrument(skip_all, fields(connection_id))]
pub async fn run_session(socket: WebSocket, registry: Arc<Registry>, shutdown: CancellationToken) {
    let id = ConnectionId::new();
    let _ = tracing::Span::current().record("connection_id", id.as_str());

    let (ws_tx, mut ws_rx) = socket.split();
    let (send_tx, send_rx) = mpsc::channel::<Outgoing>(OUTBOUND_QUEUE);
    let connection = Arc::new(Connection::new(id.clone(), send_tx));
    let cancel = connection.cancel_token();

    info!("client connected");
    registry.join(connection.clone()).await;

    let outbound = tokio::spawn(forward_outbound(ws_tx, send_rx));

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        registry.dispatch(&connection, text.as_str()).await;
                    }
                    Some(Ok(Message::Binary(data))) => {
                        // Some clients send text payloads as binary frames.
                        if let Ok(text) = std::str::from_utf8(&data) {
                            registry.dispatch(&connection, text).await;
                        } else {
                            debug!(len = data.len(), "ignoring non-UTF8 binary frame");
                        }
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                        connection.mark_alive();
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("client sent close frame");
                        connection.begin_close();
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "transport error");
                        break;
                    }
                    None => break,
                }
            }
            // Removed by the sweep or closed explicitly.
            () = cancel.cancelled() => {
                debug!("connection cancelled");
                break;
            }
            () = shutdown.cancelled() => {
                connection.begin_close();
                break;
            }
        }
    }

    let _ = registry.leave(&id).await;
    outbound.abort();
    info!("client disconnected");
}

/// Drain the connection's queue into the socket.
///
/// Ends when the queue closes (connection removed) or a write fails.
async fn forward_outbound(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut send_rx: mpsc::Receiver<Outgoing>,
) {
    while let Some(item) = send_rx.recv().await {
        let message = match item {
            Outgoing::Frame(text) => Message::Text(text.as_str().into()),
            Outgoing::Ping => Message::Ping(Vec::new().into()),
        };
        if ws_tx.send(message).await.is_err() {
            break;
        }
    }
}

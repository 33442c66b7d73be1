//! Periodic liveness sweep.
//!
//! Every tick the sweep checks each member's alive flag. A member with any
//! activity since the previous tick gets a transport ping (which provokes a
//! pong and keeps intermediaries from idling the socket out); a member with
//! none is considered half-dead and is proactively closed and removed, so
//! dead sockets never accumulate.

use std::sync::Arc;
use std::time::Duration;

use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::registry::Registry;

/// Run the liveness sweep until cancelled.
///
/// Safe against teardown races: the sweep operates on a snapshot and
/// removal is idempotent, so a connection that closed between the snapshot
/// and the check is simply a no-op.
pub async fn run_sweep(registry: Arc<Registry>, interval: Duration, cancel: CancellationToken) {
    let mut tick = time::interval(interval);
    // Skip the immediate first tick so fresh connections get a full window.
    let _ = tick.tick().await;

    loop {
        tokio::select! {
            _ = tick.tick() => {
                for connection in registry.snapshot().await {
                    if connection.check_alive() {
                        let _ = connection.ping();
                    } else {
                        warn!(
                            id = %connection.id,
                            idle = ?connection.last_seen_elapsed(),
                            "no activity since last sweep, closing connection"
                        );
                        let _ = registry.leave(&connection.id).await;
                    }
                }
            }
            () = cancel.cancelled() => {
                debug!("liveness sweep cancelled");
                break;
            }
        }
    }
}

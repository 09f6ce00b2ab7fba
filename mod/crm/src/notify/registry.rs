//! Live-connection registry — shared, process-wide push fan-out state.
//!
//! One process owns the registry; if multiple instances run behind a load
//! balancer only the instance holding an owner's connection can push to it.
//! That is a scaling limitation of the design, not a correctness bug — the
//! durable ledger is the source of truth, push is an optimization.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;

use crate::model::NotificationKind;

/// Per-connection buffer. A client further behind than this starts losing
/// events; it still has the ledger.
const CHANNEL_CAPACITY: usize = 32;

/// The wire event pushed to live connections — a thin projection of the
/// persisted notification row.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushEvent {
    pub title: String,
    pub message: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<NotificationKind>,
}

/// Push seam between the hub and the transport. Implementations must be
/// non-blocking: delivery is fire-and-forget with no retry.
pub trait NotificationPush: Send + Sync {
    fn push(&self, owner_id: &str, event: PushEvent);
}

/// Handle identifying one registered connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionId(u64);

struct Connection {
    id: u64,
    tx: mpsc::Sender<PushEvent>,
}

/// Registry of live connections, keyed by owner id. Multiple connections
/// per owner (browser tabs) are expected; push delivers to all of them.
///
/// An owned service instance injected where needed — never a global.
pub struct ConnectionRegistry {
    connections: Mutex<HashMap<String, Vec<Connection>>>,
    next_id: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn guard(&self) -> MutexGuard<'_, HashMap<String, Vec<Connection>>> {
        // A poisoned lock only means another thread panicked mid-mutation of
        // the map; the map itself stays usable.
        match self.connections.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Register a new live connection for an owner. The returned receiver
    /// is the connection's event stream.
    pub fn register(&self, owner_id: &str) -> (ConnectionId, mpsc::Receiver<PushEvent>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        self.guard()
            .entry(owner_id.to_string())
            .or_default()
            .push(Connection { id, tx });
        debug!(owner_id, connection = id, "live connection registered");
        (ConnectionId(id), rx)
    }

    /// Remove a connection. Safe to call after the connection was already
    /// lazily evicted by a failed push.
    pub fn unregister(&self, owner_id: &str, connection: ConnectionId) {
        let mut map = self.guard();
        if let Some(conns) = map.get_mut(owner_id) {
            conns.retain(|c| c.id != connection.0);
            if conns.is_empty() {
                map.remove(owner_id);
            }
        }
        debug!(owner_id, connection = connection.0, "live connection unregistered");
    }

    /// Number of live connections for an owner.
    pub fn connection_count(&self, owner_id: &str) -> usize {
        self.guard().get(owner_id).map_or(0, Vec::len)
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationPush for ConnectionRegistry {
    fn push(&self, owner_id: &str, event: PushEvent) {
        let mut map = self.guard();
        let Some(conns) = map.get_mut(owner_id) else {
            return;
        };
        // try_send never blocks. A closed channel means the client is gone:
        // evict it now rather than waiting for the stream teardown. A full
        // channel drops the event only — the ledger still has it.
        conns.retain(|c| match c.tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!(owner_id, connection = c.id, "push buffer full, event dropped");
                true
            }
            Err(TrySendError::Closed(_)) => {
                debug!(owner_id, connection = c.id, "dead connection evicted");
                false
            }
        });
        if conns.is_empty() {
            map.remove(owner_id);
        }
    }
}

use serde_json::Value;
use std::{
    net::SocketAddr,
    sync::{
        Mutex,
        atomic::{AtomicU64, Ordering},
    },
};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one WebSocket connection, for log correlation only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub id: u64,
    pub peer: SocketAddr,
}

impl ConnectionInfo {
    pub fn next(peer: SocketAddr) -> Self {
        Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            peer,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    Connected,
    Received(Value),
    Malformed { raw: String, error: String },
    Ignored { kind: &'static str },
    Disconnected { reason: String },
}

/// Where relay events end up.
pub trait EventSink: Send + Sync {
    fn record(&self, conn: &ConnectionInfo, event: RelayEvent);
}

/// Writes every event to the tracing subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, conn: &ConnectionInfo, event: RelayEvent) {
        let (id, peer) = (conn.id, conn.peer);
        match event {
            RelayEvent::Connected => tracing::info!(conn = id, %peer, "Client connected"),
            RelayEvent::Received(value) => {
                tracing::info!(conn = id, %peer, event = %value, "Event received")
            }
            RelayEvent::Malformed { raw, error } => {
                tracing::warn!(conn = id, %peer, raw = %raw, error = %error, "Discarding malformed message")
            }
            RelayEvent::Ignored { kind } => {
                tracing::debug!(conn = id, %peer, kind, "Control frame ignored")
            }
            RelayEvent::Disconnected { reason } => {
                tracing::info!(conn = id, %peer, reason = %reason, "Client disconnected")
            }
        }
    }
}

/// Keeps events in memory, in arrival order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<(u64, RelayEvent)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far as `(connection id, event)`.
    pub fn events(&self) -> Vec<(u64, RelayEvent)> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl EventSink for RecordingSink {
    fn record(&self, conn: &ConnectionInfo, event: RelayEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push((conn.id, event)),
            Err(poisoned) => poisoned.into_inner().push((conn.id, event)),
        }
    }
}

//! Per-conversation fan-out of realtime events to connected streams.
//!
//! Delivery is at-most-once: each connection has a bounded queue and an event that does not fit
//! is dropped for that connection. Membership lives only as long as the connection.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use shared::models::{ChatStreamEvent, ConnectionReadyEvent};
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// The hub as held by application state and stream guards.
pub type SharedHub = Arc<FanoutHub>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HubError {
    /// Unknown id, or the connection belongs to another user.
    #[error("connection {0} not found")]
    UnknownConnection(Uuid),
}

/// Outcome of a publish call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Connections that had room in their queue.
    pub delivered: usize,
    /// Connections whose queue was full; they miss this event.
    pub dropped: usize,
}

struct ConnectionEntry {
    user_id: Uuid,
    sender: mpsc::Sender<ChatStreamEvent>,
    groups: HashSet<Uuid>,
}

#[derive(Default)]
struct HubInner {
    connections: HashMap<Uuid, ConnectionEntry>,
    groups: HashMap<Uuid, HashSet<Uuid>>,
}

impl HubInner {
    fn remove_connection(&mut self, connection_id: Uuid) -> bool {
        let Some(entry) = self.connections.remove(&connection_id) else {
            return false;
        };
        for conversation_id in entry.groups {
            if let Some(members) = self.groups.get_mut(&conversation_id) {
                members.remove(&connection_id);
                if members.is_empty() {
                    self.groups.remove(&conversation_id);
                }
            }
        }
        true
    }
}

/// Routes pushed events to the stream connections that joined a conversation.
///
/// Each connection owns a bounded queue of `capacity` events. A slow reader loses events
/// instead of holding up the sender, and catches up through history.
pub struct FanoutHub {
    capacity: usize,
    inner: Mutex<HubInner>,
}

impl std::fmt::Debug for FanoutHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanoutHub")
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

impl FanoutHub {
    /// A hub whose connection queues hold `capacity` events, at least one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(HubInner::default()),
        }
    }

    /// Opens a connection for `user_id`. The first queued event is `connection.ready`.
    pub async fn register(&self, user_id: Uuid) -> (Uuid, mpsc::Receiver<ChatStreamEvent>) {
        let connection_id = Uuid::new_v4();
        // The ready event fits the fresh queue. It is read before any join is possible, since
        // joining needs the id it carries, so published events get the full `capacity`.
        let (sender, receiver) = mpsc::channel(self.capacity);
        if sender
            .try_send(ChatStreamEvent::ConnectionReady {
                payload: ConnectionReadyEvent { connection_id },
            })
            .is_err()
        {
            warn!(%connection_id, "could not queue connection.ready");
        }

        let mut inner = self.inner.lock().await;
        inner.connections.insert(
            connection_id,
            ConnectionEntry {
                user_id,
                sender,
                groups: HashSet::new(),
            },
        );
        metrics::gauge!("huddle_stream_connections").set(inner.connections.len() as f64);
        info!(%connection_id, %user_id, "stream connection registered");

        (connection_id, receiver)
    }

    fn owned<'a>(
        inner: &'a mut HubInner,
        connection_id: Uuid,
        user_id: Uuid,
    ) -> Result<&'a mut ConnectionEntry, HubError> {
        inner
            .connections
            .get_mut(&connection_id)
            .filter(|entry| entry.user_id == user_id)
            .ok_or(HubError::UnknownConnection(connection_id))
    }

    /// Adds the connection to the conversation's group. Returns false if it was already a member.
    ///
    /// # Errors
    /// [`HubError::UnknownConnection`] if the connection is gone or not owned by `user_id`.
    pub async fn join(
        &self,
        connection_id: Uuid,
        user_id: Uuid,
        conversation_id: Uuid,
    ) -> Result<bool, HubError> {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        let entry = Self::owned(inner, connection_id, user_id)?;
        let changed = entry.groups.insert(conversation_id);
        if changed {
            inner
                .groups
                .entry(conversation_id)
                .or_default()
                .insert(connection_id);
            debug!(%connection_id, %conversation_id, "joined conversation group");
        }
        Ok(changed)
    }

    /// Removes the connection from the group. Returns false if it was not a member.
    ///
    /// # Errors
    /// [`HubError::UnknownConnection`] if the connection is gone or not owned by `user_id`.
    pub async fn leave(
        &self,
        connection_id: Uuid,
        user_id: Uuid,
        conversation_id: Uuid,
    ) -> Result<bool, HubError> {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        let entry = Self::owned(inner, connection_id, user_id)?;
        let changed = entry.groups.remove(&conversation_id);
        if changed {
            if let Some(members) = inner.groups.get_mut(&conversation_id) {
                members.remove(&connection_id);
                if members.is_empty() {
                    inner.groups.remove(&conversation_id);
                }
            }
            debug!(%connection_id, %conversation_id, "left conversation group");
        }
        Ok(changed)
    }

    /// Drops the connection and all of its group memberships.
    pub async fn disconnect(&self, connection_id: Uuid) -> bool {
        let mut inner = self.inner.lock().await;
        let removed = inner.remove_connection(connection_id);
        if removed {
            metrics::gauge!("huddle_stream_connections").set(inner.connections.len() as f64);
            info!(%connection_id, "stream connection closed");
        }
        removed
    }

    /// Queues `event` on every connection joined to `conversation_id`, the sender's included.
    pub async fn publish(&self, conversation_id: Uuid, event: &ChatStreamEvent) -> PublishReport {
        let mut report = PublishReport::default();
        let mut inner = self.inner.lock().await;

        let Some(members) = inner.groups.get(&conversation_id) else {
            return report;
        };

        let mut closed = Vec::new();
        for connection_id in members {
            let Some(entry) = inner.connections.get(connection_id) else {
                continue;
            };
            match entry.sender.try_send(event.clone()) {
                Ok(()) => report.delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    report.dropped += 1;
                    debug!(%connection_id, "connection queue full; dropping event");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => closed.push(*connection_id),
            }
        }

        for connection_id in closed {
            inner.remove_connection(connection_id);
        }

        metrics::counter!("huddle_fanout_delivered_total").increment(report.delivered as u64);
        if report.dropped > 0 {
            metrics::counter!("huddle_fanout_dropped_total").increment(report.dropped as u64);
        }
        report
    }

    /// Open connections, joined or not.
    pub async fn connection_count(&self) -> usize {
        self.inner.lock().await.connections.len()
    }

    /// Connections currently joined to `conversation_id`.
    pub async fn member_count(&self, conversation_id: Uuid) -> usize {
        self.inner
            .lock()
            .await
            .groups
            .get(&conversation_id)
            .map_or(0, HashSet::len)
    }
}

/// Disconnects its connection from the hub when the stream that owns it is dropped.
pub struct ConnectionGuard {
    hub: SharedHub,
    connection_id: Uuid,
}

impl ConnectionGuard {
    #[must_use]
    pub fn new(hub: SharedHub, connection_id: Uuid) -> Self {
        Self { hub, connection_id }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let hub = Arc::clone(&self.hub);
        let connection_id = self.connection_id;
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                hub.disconnect(connection_id).await;
            });
        }
    }
}

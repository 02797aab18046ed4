use crate::error::{DeliveryErrorKind, Error, RealtimeErrorKind, RegistryErrorKind};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use domain::Identity;
use log::*;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{error::SendTimeoutError, Sender};
use tokio::sync::Notify;
use uuid::Uuid;

/// Unique identifier for a connection (server-generated)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The sending half of one connection's outbound queue.
///
/// Cloning a handle does not create a new connection; every clone feeds the
/// same writer.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    sender: Sender<String>,
}

impl ConnectionHandle {
    pub fn new(sender: Sender<String>) -> Self {
        Self {
            id: ConnectionId::new(),
            sender,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queues `content` for the connection's writer, waiting at most
    /// `deadline` for room in the queue.
    pub async fn send_frame(&self, content: String, deadline: Duration) -> Result<(), Error> {
        self.sender
            .send_timeout(content, deadline)
            .await
            .map_err(|e| {
                let kind = match e {
                    SendTimeoutError::Timeout(_) => DeliveryErrorKind::Full,
                    SendTimeoutError::Closed(_) => DeliveryErrorKind::Closed,
                };
                Error::new(RealtimeErrorKind::Delivery(kind))
            })
    }
}

#[derive(Debug, Clone)]
struct ConnectionInfo {
    identity: Identity,
    handle: ConnectionHandle,
}

/// Live connections keyed two ways.
///
/// A connection is written to the primary map before the user index and
/// removed from it first, and lookups resolve ids through the primary map, so
/// a lookup never returns a connection that is being torn down.
pub struct ConnectionRegistry {
    /// Primary storage: lookup by connection_id for registration/cleanup
    connections: DashMap<ConnectionId, ConnectionInfo>,

    /// Secondary index: lookup by identity for message routing
    user_index: DashMap<Identity, HashSet<ConnectionId>>,

    /// Woken after every successful deregister
    deregistered: Notify,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            user_index: DashMap::new(),
            deregistered: Notify::new(),
        }
    }

    pub fn register(&self, identity: Identity, handle: ConnectionHandle) -> Result<(), Error> {
        let connection_id = handle.id();

        match self.connections.entry(connection_id) {
            Entry::Occupied(_) => {
                return Err(Error::new(RealtimeErrorKind::Registry(
                    RegistryErrorKind::AlreadyRegistered,
                )));
            }
            Entry::Vacant(entry) => {
                entry.insert(ConnectionInfo { identity, handle });
            }
        }

        self.user_index
            .entry(identity)
            .or_default()
            .insert(connection_id);

        debug!("Registered connection {connection_id} for user {identity}");
        Ok(())
    }

    /// Removes a connection. Returns whether it was present; removing an
    /// unknown connection is a no-op.
    pub fn deregister(&self, connection_id: &ConnectionId) -> bool {
        let Some((_, info)) = self.connections.remove(connection_id) else {
            return false;
        };

        if let Some(mut ids) = self.user_index.get_mut(&info.identity) {
            ids.remove(connection_id);
        }
        // Checked under the shard lock so a concurrent register for the same
        // user cannot be dropped.
        self.user_index
            .remove_if(&info.identity, |_, ids| ids.is_empty());

        debug!(
            "Deregistered connection {connection_id} for user {}",
            info.identity
        );
        self.deregistered.notify_waiters();
        true
    }

    /// Snapshot of the user's live connections. Handles may go stale right
    /// after this returns; senders treat a closed handle as gone.
    pub fn connections_for(&self, identity: &Identity) -> Vec<ConnectionHandle> {
        let ids: Vec<ConnectionId> = match self.user_index.get(identity) {
            Some(ids) => ids.iter().copied().collect(),
            None => return Vec::new(),
        };

        ids.iter()
            .filter_map(|id| self.connections.get(id).map(|info| info.handle.clone()))
            .collect()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn user_count(&self) -> usize {
        self.user_index.len()
    }

    /// Resolves once no connection is registered.
    pub async fn emptied(&self) {
        loop {
            let notified = self.deregistered.notified();
            tokio::pin!(notified);
            // Enabled before the check so a deregister in between is not missed.
            notified.as_mut().enable();

            if self.connections.is_empty() {
                return;
            }
            notified.await;
        }
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Deregisters its connection when dropped, on every exit path of a session.
pub struct RegistrationGuard {
    registry: Arc<ConnectionRegistry>,
    connection_id: ConnectionId,
}

impl RegistrationGuard {
    pub fn new(registry: Arc<ConnectionRegistry>, connection_id: ConnectionId) -> Self {
        Self {
            registry,
            connection_id,
        }
    }
}

impl Drop for RegistrationGuard {
    fn drop(&mut self) {
        self.registry.deregister(&self.connection_id);
    }
}

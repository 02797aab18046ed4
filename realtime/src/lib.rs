//! Real-time direct messaging over long-lived connections.
//!
//! # Architecture
//!
//! - **One session per connection**: each upgraded connection runs its own
//!   task that authenticates the peer once from its bearer credential and
//!   then reads chat frames until the peer leaves.
//! - **Dual-index registry**: live connections are indexed both by
//!   connection id and by user identity in separate `DashMap`s. A user may
//!   hold any number of connections.
//! - **Stored before delivered**: every frame is persisted first; a frame the
//!   store rejects is never delivered.
//! - **Bounded outbound queues**: delivery enqueues onto the recipient's
//!   per-connection queue with a short deadline and never writes to a socket
//!   directly, so a slow peer cannot stall senders.
//! - **Ephemeral delivery**: offline recipients get nothing pushed; they read
//!   their history over the HTTP API.
//!
//! # Message Flow
//!
//! 1. Client opens `/ws` with `Authorization: Bearer <jwt>`
//! 2. The session verifies the token and registers a handle to its queue
//! 3. Client sends `{"receiver_id": 2, "content": "hi"}`
//! 4. The router stores the record, looks up user 2's connections and queues
//!    the raw content on each of them (never on the sender's own)
//! 5. Each recipient connection's writer task sends `hi` as a text frame
//!
//! # Example
//!
//! ```rust,ignore
//! use realtime::{DatabasePersister, Hub, HubConfig, WebSocketTransport};
//!
//! let hub = Hub::new(Arc::new(DatabasePersister::new(db)), HubConfig::new(key));
//!
//! // In the upgrade handler
//! ws.on_upgrade(move |socket| async move {
//!     hub.accept(WebSocketTransport::new(socket), credential).await
//! })
//! ```
//!
//! # Modules
//!
//! - `connection`: ConnectionRegistry, connection handles and the registration guard
//! - `session`: per-connection state machine and writer task
//! - `router`: store-then-deliver fan-out
//! - `message`: inbound frame and chat record types
//! - `persister`: storage seam for chat records
//! - `transport`: the duplex channel abstraction with WebSocket and in-memory implementations

pub mod connection;
pub mod error;
pub mod message;
pub mod persister;
pub mod router;
mod session;
pub mod transport;

pub use connection::ConnectionRegistry;
pub use error::Error;
pub use persister::{DatabasePersister, Persister};
pub use transport::{Transport, WebSocketTransport};

use log::*;
use router::Router;
use session::{Session, SessionContext};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

pub const DEFAULT_OUTBOUND_QUEUE_CAPACITY: usize = 64;
pub const DEFAULT_ENQUEUE_TIMEOUT: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Shared HMAC secret bearer tokens are verified with
    pub key: Vec<u8>,
    /// Frames buffered per connection before delivery starts waiting
    pub outbound_queue_capacity: usize,
    /// How long delivery waits on a full queue before dropping the frame
    pub enqueue_timeout: Duration,
}

impl HubConfig {
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            outbound_queue_capacity: DEFAULT_OUTBOUND_QUEUE_CAPACITY,
            enqueue_timeout: DEFAULT_ENQUEUE_TIMEOUT,
        }
    }
}

/// Entry point for every live connection.
///
/// Cheap to clone; clones share the registry and the shutdown signal.
#[derive(Clone)]
pub struct Hub {
    registry: Arc<ConnectionRegistry>,
    router: Arc<Router>,
    key: Arc<[u8]>,
    queue_capacity: usize,
    shutdown: Arc<watch::Sender<bool>>,
}

impl Hub {
    pub fn new(persister: Arc<dyn Persister>, config: HubConfig) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let router = Router::new(Arc::clone(&registry), persister, config.enqueue_timeout);
        let (shutdown, _) = watch::channel(false);

        if config.key.is_empty() {
            warn!("No token key configured, every connection will be rejected");
        }

        Self {
            registry,
            router: Arc::new(router),
            key: Arc::from(config.key),
            // A zero capacity channel is not allowed.
            queue_capacity: config.outbound_queue_capacity.max(1),
            shutdown: Arc::new(shutdown),
        }
    }

    /// Serves one connection until it closes. `credential` is the raw
    /// `Authorization` header value, if the client sent one.
    pub async fn accept<T: Transport>(&self, transport: T, credential: Option<String>) {
        let context = SessionContext {
            registry: Arc::clone(&self.registry),
            router: Arc::clone(&self.router),
            key: Arc::clone(&self.key),
            queue_capacity: self.queue_capacity,
            shutdown: self.shutdown.subscribe(),
        };

        Session::new(context).run(transport, credential).await;
    }

    /// Signals every session, current and future, to close.
    pub fn shutdown(&self) {
        info!(
            "Closing {} live connection(s)",
            self.registry.connection_count()
        );
        self.shutdown.send_replace(true);
    }

    /// Waits until every session has deregistered or `deadline` passes.
    /// Returns whether the registry drained.
    pub async fn drained(&self, deadline: Duration) -> bool {
        tokio::time::timeout(deadline, self.registry.emptied())
            .await
            .is_ok()
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }
}

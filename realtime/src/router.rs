use crate::connection::ConnectionRegistry;
use crate::error::DeliveryErrorKind;
use crate::message::{ChatRecord, InboundFrame};
use crate::persister::Persister;
use domain::Identity;
use log::*;
use std::sync::Arc;
use std::time::Duration;

/// Stores each inbound frame and then fans it out to the recipient's live
/// connections. Nothing is delivered unless the store succeeded.
pub struct Router {
    registry: Arc<ConnectionRegistry>,
    persister: Arc<dyn Persister>,
    enqueue_timeout: Duration,
}

impl Router {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        persister: Arc<dyn Persister>,
        enqueue_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            persister,
            enqueue_timeout,
        }
    }

    /// Returns the number of connections the content was queued on.
    pub async fn route(&self, sender: Identity, frame: InboundFrame) -> usize {
        let record = ChatRecord::new(sender, frame);

        if let Err(e) = self.persister.store(&record).await {
            warn!(
                "Dropping message from {} to {}, it could not be stored: {e}",
                record.sender, record.recipient
            );
            return 0;
        }

        // Messages to oneself are kept but never echoed back.
        if record.recipient == sender {
            return 0;
        }

        let handles = self.registry.connections_for(&record.recipient);
        if handles.is_empty() {
            debug!("User {} is offline, message stored only", record.recipient);
            return 0;
        }

        let mut delivered = 0;
        for handle in handles {
            match handle
                .send_frame(record.content.clone(), self.enqueue_timeout)
                .await
            {
                Ok(()) => delivered += 1,
                Err(e) => match e.delivery_kind() {
                    Some(DeliveryErrorKind::Full) => warn!(
                        "Outbound queue for connection {} stayed full, dropping message from {}",
                        handle.id(),
                        record.sender
                    ),
                    _ => {
                        info!(
                            "Connection {} for user {} is closed, evicting it",
                            handle.id(),
                            record.recipient
                        );
                        self.registry.deregister(&handle.id());
                    }
                },
            }
        }

        trace!(
            "Delivered message from {} to {delivered} connection(s) of {}",
            record.sender,
            record.recipient
        );
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionHandle;
    use crate::error::{Error, RealtimeErrorKind};
    use crate::persister::MockPersister;
    use tokio::sync::mpsc::{channel, Receiver};

    const DEADLINE: Duration = Duration::from_millis(20);

    fn connect(
        registry: &ConnectionRegistry,
        identity: Identity,
    ) -> (ConnectionHandle, Receiver<String>) {
        let (sender, receiver) = channel(4);
        let handle = ConnectionHandle::new(sender);
        registry.register(identity, handle.clone()).unwrap();
        (handle, receiver)
    }

    fn frame(to: i64, content: &str) -> InboundFrame {
        InboundFrame {
            receiver_id: Identity::new(to),
            content: content.to_string(),
        }
    }

    fn storing_persister(times: usize) -> MockPersister {
        let mut persister = MockPersister::new();
        persister.expect_store().times(times).returning(|_| Ok(()));
        persister
    }

    #[tokio::test]
    async fn delivers_to_every_recipient_connection_and_none_of_the_senders() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (_a, mut alice_rx) = connect(&registry, Identity::new(1));
        let (_b1, mut bob_rx1) = connect(&registry, Identity::new(2));
        let (_b2, mut bob_rx2) = connect(&registry, Identity::new(2));
        let router = Router::new(registry, Arc::new(storing_persister(1)), DEADLINE);

        let delivered = router.route(Identity::new(1), frame(2, "hi")).await;

        assert_eq!(delivered, 2);
        assert_eq!(bob_rx1.try_recv().unwrap(), "hi");
        assert_eq!(bob_rx2.try_recv().unwrap(), "hi");
        assert!(alice_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn self_addressed_messages_are_stored_but_not_delivered() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (_a1, mut alice_rx1) = connect(&registry, Identity::new(1));
        let (_a2, mut alice_rx2) = connect(&registry, Identity::new(1));
        let router = Router::new(registry, Arc::new(storing_persister(1)), DEADLINE);

        let delivered = router.route(Identity::new(1), frame(1, "note to self")).await;

        assert_eq!(delivered, 0);
        assert!(alice_rx1.try_recv().is_err());
        assert!(alice_rx2.try_recv().is_err());
    }

    #[tokio::test]
    async fn nothing_is_delivered_when_the_store_fails() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (_b, mut bob_rx) = connect(&registry, Identity::new(2));
        let mut persister = MockPersister::new();
        persister
            .expect_store()
            .times(1)
            .returning(|_| Err(Error::new(RealtimeErrorKind::Persistence)));
        let router = Router::new(registry, Arc::new(persister), DEADLINE);

        let delivered = router.route(Identity::new(1), frame(2, "lost")).await;

        assert_eq!(delivered, 0);
        assert!(bob_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn the_stored_record_carries_sender_recipient_and_content() {
        let registry = Arc::new(ConnectionRegistry::new());
        let mut persister = MockPersister::new();
        persister
            .expect_store()
            .withf(|record| {
                record.sender == Identity::new(1)
                    && record.recipient == Identity::new(9)
                    && record.content == "are you there?"
            })
            .times(1)
            .returning(|_| Ok(()));
        let router = Router::new(registry, Arc::new(persister), DEADLINE);

        let delivered = router
            .route(Identity::new(1), frame(9, "are you there?"))
            .await;

        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn closed_connections_are_evicted_and_the_rest_still_receive() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (gone, gone_rx) = connect(&registry, Identity::new(2));
        let (_live, mut live_rx) = connect(&registry, Identity::new(2));
        drop(gone_rx);
        let router = Router::new(
            Arc::clone(&registry),
            Arc::new(storing_persister(1)),
            DEADLINE,
        );

        let delivered = router.route(Identity::new(1), frame(2, "hi")).await;

        assert_eq!(delivered, 1);
        assert_eq!(live_rx.try_recv().unwrap(), "hi");
        let remaining = registry.connections_for(&Identity::new(2));
        assert_eq!(remaining.len(), 1);
        assert_ne!(remaining[0].id(), gone.id());
    }

    #[tokio::test]
    async fn full_connections_drop_the_message_but_stay_registered() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (sender, mut receiver) = channel(1);
        let slow = ConnectionHandle::new(sender);
        registry.register(Identity::new(2), slow.clone()).unwrap();
        let router = Router::new(
            Arc::clone(&registry),
            Arc::new(storing_persister(2)),
            DEADLINE,
        );

        assert_eq!(router.route(Identity::new(1), frame(2, "first")).await, 1);
        assert_eq!(router.route(Identity::new(1), frame(2, "second")).await, 0);

        assert_eq!(registry.connections_for(&Identity::new(2)).len(), 1);
        assert_eq!(receiver.try_recv().unwrap(), "first");
        assert!(receiver.try_recv().is_err());
    }
}

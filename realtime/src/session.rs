//! One task per live connection.
//!
//! A session walks `Connecting -> Authenticating -> Active -> Closing ->
//! Closed`. It authenticates the peer once, registers a handle to its
//! outbound queue, then reads frames and hands them to the router until the
//! peer leaves or the server shuts down. A separate writer task owns the
//! transport's sink and drains the queue.

use crate::connection::{ConnectionHandle, ConnectionRegistry, RegistrationGuard};
use crate::error::Error;
use crate::message::InboundFrame;
use crate::router::Router;
use crate::transport::{CloseReason, Frame, FrameSink, FrameStream, Transport};
use domain::error::{auth_error, AuthErrorKind};
use domain::jwt::extract_identity;
use domain::Identity;
use log::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;

/// How long the writer gets to flush its close frame before it is aborted.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionState {
    Connecting,
    Authenticating,
    Active,
    Closing(CloseCause),
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CloseCause {
    Unauthorized,
    RegistrationFailed,
    PeerClosed,
    PeerGone,
    TransportError,
    WriterGone,
    Shutdown,
}

impl CloseCause {
    /// The close frame to send the peer, if any.
    fn close_reason(self) -> Option<CloseReason> {
        match self {
            CloseCause::Unauthorized => Some(CloseReason::unauthorized()),
            CloseCause::RegistrationFailed => Some(CloseReason::internal_error()),
            CloseCause::Shutdown => Some(CloseReason::going_away()),
            CloseCause::PeerClosed
            | CloseCause::PeerGone
            | CloseCause::TransportError
            | CloseCause::WriterGone => None,
        }
    }
}

/// Everything a session borrows from the hub.
#[derive(Clone)]
pub(crate) struct SessionContext {
    pub registry: Arc<ConnectionRegistry>,
    pub router: Arc<Router>,
    pub key: Arc<[u8]>,
    pub queue_capacity: usize,
    pub shutdown: watch::Receiver<bool>,
}

pub(crate) struct Session {
    context: SessionContext,
    state: SessionState,
}

impl Session {
    pub(crate) fn new(context: SessionContext) -> Self {
        Self {
            context,
            state: SessionState::Connecting,
        }
    }

    fn transition(&mut self, next: SessionState) {
        trace!("Session state {:?} -> {next:?}", self.state);
        self.state = next;
    }

    /// Drives the connection until it closes. Returns the final state.
    pub(crate) async fn run<T: Transport>(
        mut self,
        transport: T,
        credential: Option<String>,
    ) -> SessionState {
        let (mut sink, stream) = transport.split();
        self.transition(SessionState::Authenticating);

        let identity = match self.authenticate(credential.as_deref()) {
            Ok(identity) => identity,
            Err(e) => {
                info!("Rejecting connection: {e}");
                return self
                    .close_unregistered(&mut sink, CloseCause::Unauthorized)
                    .await;
            }
        };

        let (sender, receiver) = mpsc::channel(self.context.queue_capacity);
        let handle = ConnectionHandle::new(sender);
        let connection_id = handle.id();

        if let Err(e) = self.context.registry.register(identity, handle) {
            error!("Could not register connection for user {identity}: {e}");
            return self
                .close_unregistered(&mut sink, CloseCause::RegistrationFailed)
                .await;
        }
        let registration =
            RegistrationGuard::new(Arc::clone(&self.context.registry), connection_id);

        let (close_tx, close_rx) = oneshot::channel();
        let mut writer = tokio::spawn(write_frames(sink, receiver, close_rx));

        self.transition(SessionState::Active);
        info!("User {identity} connected on {connection_id}");

        let cause = self.receive(identity, stream, &mut writer).await;
        self.transition(SessionState::Closing(cause));

        if cause != CloseCause::WriterGone {
            // The writer may already be gone, in which case there is no one
            // left to tell.
            let _ = close_tx.send(cause.close_reason());
            if timeout(WRITER_DRAIN_TIMEOUT, &mut writer).await.is_err() {
                warn!("Writer for {connection_id} did not finish, aborting it");
                writer.abort();
            }
        }

        drop(registration);
        info!("User {identity} disconnected from {connection_id} ({cause:?})");

        self.transition(SessionState::Closed);
        self.state
    }

    fn authenticate(&self, credential: Option<&str>) -> Result<Identity, Error> {
        let credential = credential.ok_or_else(|| {
            auth_error(
                AuthErrorKind::MalformedCredential,
                "missing authorization header",
            )
        })?;

        Ok(extract_identity(credential, &self.context.key)?)
    }

    async fn receive<S: FrameStream>(
        &self,
        identity: Identity,
        mut stream: S,
        writer: &mut JoinHandle<()>,
    ) -> CloseCause {
        let mut shutdown = self.context.shutdown.clone();

        loop {
            let frame = tokio::select! {
                frame = stream.next() => frame,
                _ = shutdown.wait_for(|stopping| *stopping) => return CloseCause::Shutdown,
                _ = &mut *writer => return CloseCause::WriterGone,
            };

            let payload = match frame {
                Some(Ok(Frame::Text(text))) => text.into_bytes(),
                Some(Ok(Frame::Binary(bytes))) => bytes,
                Some(Ok(Frame::Ping(_) | Frame::Pong(_))) => continue,
                Some(Ok(Frame::Close(reason))) => {
                    debug!("User {identity} sent close {reason:?}");
                    return CloseCause::PeerClosed;
                }
                Some(Err(e)) => {
                    warn!("Receive failed for user {identity}: {e}");
                    return CloseCause::TransportError;
                }
                None => return CloseCause::PeerGone,
            };

            match InboundFrame::decode(&payload) {
                Ok(frame) => {
                    // A stalled store must not hold the session past shutdown.
                    tokio::select! {
                        _ = self.context.router.route(identity, frame) => {}
                        _ = shutdown.wait_for(|stopping| *stopping) => {
                            warn!("Abandoning in-flight message from user {identity} on shutdown");
                            return CloseCause::Shutdown;
                        }
                    }
                }
                Err(e) => debug!("Discarding undecodable frame from user {identity}: {e}"),
            }
        }
    }

    /// Closes a connection that never made it into the registry.
    async fn close_unregistered<S: FrameSink>(
        mut self,
        sink: &mut S,
        cause: CloseCause,
    ) -> SessionState {
        self.transition(SessionState::Closing(cause));

        if let Err(e) = sink.send(Frame::Close(cause.close_reason())).await {
            debug!("Could not send close frame: {e}");
        }

        self.transition(SessionState::Closed);
        self.state
    }
}

/// Drains the outbound queue into the sink. Sends the close frame, if any,
/// once the session asks for it.
async fn write_frames<S: FrameSink>(
    mut sink: S,
    mut queue: mpsc::Receiver<String>,
    mut close: oneshot::Receiver<Option<CloseReason>>,
) {
    loop {
        tokio::select! {
            content = queue.recv() => match content {
                Some(content) => {
                    if let Err(e) = sink.send(Frame::Text(content)).await {
                        debug!("Writer stopping: {e}");
                        return;
                    }
                }
                None => return,
            },
            reason = &mut close => {
                if let Ok(Some(reason)) = reason {
                    if let Err(e) = sink.send(Frame::Close(Some(reason))).await {
                        debug!("Could not send close frame: {e}");
                    }
                }
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ChatRecord;
    use crate::persister::MockPersister;
    use crate::transport::channel;
    use crate::transport::ChannelPeer;

    fn context(persister: MockPersister) -> (SessionContext, watch::Sender<bool>) {
        let registry = Arc::new(ConnectionRegistry::new());
        let router = Router::new(
            Arc::clone(&registry),
            Arc::new(persister),
            Duration::from_millis(50),
        );
        let (shutdown_tx, shutdown) = watch::channel(false);

        (
            SessionContext {
                registry,
                router: Arc::new(router),
                key: Arc::from(&b"session-key"[..]),
                queue_capacity: 8,
                shutdown,
            },
            shutdown_tx,
        )
    }

    fn credential(id: i64) -> String {
        let token = jsonwebtoken::encode(
            &jsonwebtoken::Header::default(),
            &serde_json::json!({ "id": id }),
            &jsonwebtoken::EncodingKey::from_secret(b"session-key"),
        )
        .unwrap();
        format!("Bearer {token}")
    }

    async fn wait_for_registration(registry: &ConnectionRegistry, identity: Identity) {
        for _ in 0..100 {
            if !registry.connections_for(&identity).is_empty() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("user {identity} never registered");
    }

    fn spawn(
        context: &SessionContext,
        credential: Option<String>,
    ) -> (JoinHandle<SessionState>, ChannelPeer) {
        let (transport, peer) = channel::pair();
        let session = Session::new(context.clone());
        (tokio::spawn(session.run(transport, credential)), peer)
    }

    #[tokio::test]
    async fn missing_credential_is_closed_as_unauthorized() {
        let (context, _shutdown) = context(MockPersister::new());

        let (task, mut peer) = spawn(&context, None);

        assert_eq!(
            peer.recv().await,
            Some(Frame::Close(Some(CloseReason::unauthorized())))
        );
        assert_eq!(task.await.unwrap(), SessionState::Closed);
        assert_eq!(context.registry.connection_count(), 0);
    }

    #[tokio::test]
    async fn bad_token_is_closed_as_unauthorized() {
        let (context, _shutdown) = context(MockPersister::new());

        let (task, mut peer) = spawn(&context, Some("Bearer nope".to_string()));

        assert_eq!(
            peer.recv().await,
            Some(Frame::Close(Some(CloseReason::unauthorized())))
        );
        assert_eq!(task.await.unwrap(), SessionState::Closed);
    }

    #[tokio::test]
    async fn undecodable_frames_are_skipped_without_a_reply() {
        let mut persister = MockPersister::new();
        persister
            .expect_store()
            .withf(|record: &ChatRecord| record.content == "after garbage")
            .times(1)
            .returning(|_| Ok(()));
        let (context, _shutdown) = context(persister);

        let (task, mut peer) = spawn(&context, Some(credential(1)));
        wait_for_registration(&context.registry, Identity::new(1)).await;

        peer.send_text("{not json");
        peer.send(Frame::Ping(vec![1]));
        peer.send_text(r#"{"receiver_id": 2, "content": "after garbage"}"#);
        peer.send(Frame::Close(None));

        assert_eq!(task.await.unwrap(), SessionState::Closed);
        assert!(peer.try_recv().is_none());
        assert_eq!(context.registry.connection_count(), 0);
    }

    #[tokio::test]
    async fn dropped_peer_deregisters_the_connection() {
        let (context, _shutdown) = context(MockPersister::new());

        let (task, mut peer) = spawn(&context, Some(credential(1)));
        wait_for_registration(&context.registry, Identity::new(1)).await;
        peer.disconnect();

        assert_eq!(task.await.unwrap(), SessionState::Closed);
        assert!(context.registry.connections_for(&Identity::new(1)).is_empty());
    }

    #[tokio::test]
    async fn shutdown_closes_with_going_away() {
        let (context, shutdown) = context(MockPersister::new());

        let (task, mut peer) = spawn(&context, Some(credential(1)));
        wait_for_registration(&context.registry, Identity::new(1)).await;
        shutdown.send_replace(true);

        assert_eq!(
            peer.recv().await,
            Some(Frame::Close(Some(CloseReason::going_away())))
        );
        assert_eq!(task.await.unwrap(), SessionState::Closed);
        assert_eq!(context.registry.connection_count(), 0);
    }
}

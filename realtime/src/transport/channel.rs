//! In-memory transport backed by a pair of unbounded channels.
//!
//! ```rust,ignore
//! let (transport, mut peer) = realtime::transport::channel::pair();
//! tokio::spawn(async move { hub.accept(transport, Some(credential)).await });
//! peer.send_text(r#"{"receiver_id": 2, "content": "hi"}"#);
//! ```

use super::{Frame, FrameSink, FrameStream, Transport};
use crate::error::{Error, RealtimeErrorKind};
use async_trait::async_trait;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// Server side of an in-memory connection.
pub struct ChannelTransport {
    to_peer: UnboundedSender<Frame>,
    from_peer: UnboundedReceiver<Frame>,
}

/// Client side of an in-memory connection.
pub struct ChannelPeer {
    to_server: Option<UnboundedSender<Frame>>,
    from_server: UnboundedReceiver<Frame>,
}

pub fn pair() -> (ChannelTransport, ChannelPeer) {
    let (to_peer, from_server) = unbounded_channel();
    let (to_server, from_peer) = unbounded_channel();

    (
        ChannelTransport { to_peer, from_peer },
        ChannelPeer {
            to_server: Some(to_server),
            from_server,
        },
    )
}

impl ChannelPeer {
    /// Returns false once the connection is gone.
    pub fn send(&self, frame: Frame) -> bool {
        self.to_server
            .as_ref()
            .is_some_and(|sender| sender.send(frame).is_ok())
    }

    pub fn send_text(&self, text: impl Into<String>) -> bool {
        self.send(Frame::Text(text.into()))
    }

    /// Waits for the next frame from the server; `None` once the server side
    /// has been dropped.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.from_server.recv().await
    }

    /// Returns a frame only if one is already waiting.
    pub fn try_recv(&mut self) -> Option<Frame> {
        self.from_server.try_recv().ok()
    }

    /// Ends the server's inbound stream without a close frame, like a dropped
    /// TCP connection.
    pub fn disconnect(&mut self) {
        self.to_server = None;
    }
}

pub struct ChannelSink(UnboundedSender<Frame>);

pub struct ChannelStream(UnboundedReceiver<Frame>);

impl Transport for ChannelTransport {
    type Sink = ChannelSink;
    type Stream = ChannelStream;

    fn split(self) -> (Self::Sink, Self::Stream) {
        (ChannelSink(self.to_peer), ChannelStream(self.from_peer))
    }
}

#[async_trait]
impl FrameSink for ChannelSink {
    async fn send(&mut self, frame: Frame) -> Result<(), Error> {
        self.0
            .send(frame)
            .map_err(|e| Error::with_source(RealtimeErrorKind::Transport, e.to_string()))
    }
}

#[async_trait]
impl FrameStream for ChannelStream {
    async fn next(&mut self) -> Option<Result<Frame, Error>> {
        self.0.recv().await.map(Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frames_flow_both_ways() {
        let (transport, mut peer) = pair();
        let (mut sink, mut stream) = transport.split();

        assert!(peer.send_text("ping"));
        assert_eq!(
            stream.next().await.unwrap().unwrap(),
            Frame::Text("ping".to_string())
        );

        sink.send(Frame::Text("pong".to_string())).await.unwrap();
        assert_eq!(peer.recv().await, Some(Frame::Text("pong".to_string())));
    }

    #[tokio::test]
    async fn disconnect_ends_the_inbound_stream() {
        let (transport, mut peer) = pair();
        let (_sink, mut stream) = transport.split();

        peer.disconnect();

        assert!(stream.next().await.is_none());
        assert!(!peer.send_text("too late"));
    }

    #[tokio::test]
    async fn sending_to_a_dropped_peer_is_a_transport_error() {
        let (transport, peer) = pair();
        let (mut sink, _stream) = transport.split();
        drop(peer);

        let err = sink.send(Frame::Text("lost".to_string())).await.unwrap_err();

        assert_eq!(err.error_kind, RealtimeErrorKind::Transport);
    }
}

use super::{CloseReason, Frame, FrameSink, FrameStream, Transport};
use crate::error::Error;
use async_trait::async_trait;
use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};

/// An upgraded axum WebSocket.
pub struct WebSocketTransport(WebSocket);

impl WebSocketTransport {
    pub fn new(socket: WebSocket) -> Self {
        Self(socket)
    }
}

impl Transport for WebSocketTransport {
    type Sink = WebSocketSink;
    type Stream = WebSocketStream;

    fn split(self) -> (Self::Sink, Self::Stream) {
        let (sink, stream) = self.0.split();
        (WebSocketSink(sink), WebSocketStream(stream))
    }
}

pub struct WebSocketSink(SplitSink<WebSocket, Message>);

pub struct WebSocketStream(SplitStream<WebSocket>);

#[async_trait]
impl FrameSink for WebSocketSink {
    async fn send(&mut self, frame: Frame) -> Result<(), Error> {
        Ok(self.0.send(frame.into()).await?)
    }
}

#[async_trait]
impl FrameStream for WebSocketStream {
    async fn next(&mut self) -> Option<Result<Frame, Error>> {
        self.0
            .next()
            .await
            .map(|message| message.map(Frame::from).map_err(Error::from))
    }
}

impl From<Frame> for Message {
    fn from(frame: Frame) -> Self {
        match frame {
            Frame::Text(text) => Message::Text(text.into()),
            Frame::Binary(bytes) => Message::Binary(bytes.into()),
            Frame::Ping(bytes) => Message::Ping(bytes.into()),
            Frame::Pong(bytes) => Message::Pong(bytes.into()),
            Frame::Close(reason) => Message::Close(reason.map(|reason| CloseFrame {
                code: reason.code,
                reason: reason.reason.into(),
            })),
        }
    }
}

impl From<Message> for Frame {
    fn from(message: Message) -> Self {
        match message {
            Message::Text(text) => Frame::Text(text.as_str().to_owned()),
            Message::Binary(bytes) => Frame::Binary(bytes.to_vec()),
            Message::Ping(bytes) => Frame::Ping(bytes.to_vec()),
            Message::Pong(bytes) => Frame::Pong(bytes.to_vec()),
            Message::Close(frame) => Frame::Close(
                frame.map(|frame| CloseReason::new(frame.code, frame.reason.as_str())),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_frames_keep_code_and_reason() {
        let message: Message = Frame::Close(Some(CloseReason::unauthorized())).into();

        match message {
            Message::Close(Some(frame)) => {
                assert_eq!(frame.code, 4001);
                assert_eq!(frame.reason.as_str(), "Unauthorized");
            }
            other => panic!("expected a close frame, got {other:?}"),
        }
    }

    #[test]
    fn text_messages_become_text_frames() {
        let frame: Frame = Message::Text("hi".into()).into();

        assert_eq!(frame, Frame::Text("hi".to_string()));
    }
}

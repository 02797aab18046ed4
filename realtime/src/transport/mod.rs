//! The duplex channel a session talks to its peer over.
//!
//! A session only needs to pull frames from the peer and push frames to it,
//! so a transport is anything that can be split into a [`FrameStream`] and a
//! [`FrameSink`]. The production transport wraps an axum WebSocket; tests and
//! in-process clients use the channel pair in [`channel`].

use crate::error::Error;
use async_trait::async_trait;

pub mod channel;
pub mod websocket;

pub use channel::{ChannelPeer, ChannelTransport};
pub use websocket::WebSocketTransport;

/// Close code sent when the presented credential is rejected.
pub const CLOSE_UNAUTHORIZED: u16 = 4001;
/// Close code sent when the server is going away.
pub const CLOSE_GOING_AWAY: u16 = 1001;
/// Close code sent when the server cannot serve the connection.
pub const CLOSE_INTERNAL_ERROR: u16 = 1011;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
    pub code: u16,
    pub reason: String,
}

impl CloseReason {
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    pub fn unauthorized() -> Self {
        Self::new(CLOSE_UNAUTHORIZED, "Unauthorized")
    }

    pub fn going_away() -> Self {
        Self::new(CLOSE_GOING_AWAY, "Server shutting down")
    }

    pub fn internal_error() -> Self {
        Self::new(CLOSE_INTERNAL_ERROR, "Internal error")
    }
}

/// A single unit exchanged with the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close(Option<CloseReason>),
}

/// Outbound half of a transport.
#[async_trait]
pub trait FrameSink: Send + 'static {
    async fn send(&mut self, frame: Frame) -> Result<(), Error>;
}

/// Inbound half of a transport. `None` means the peer went away.
#[async_trait]
pub trait FrameStream: Send + 'static {
    async fn next(&mut self) -> Option<Result<Frame, Error>>;
}

pub trait Transport: Send + 'static {
    type Sink: FrameSink;
    type Stream: FrameStream;

    fn split(self) -> (Self::Sink, Self::Stream);
}

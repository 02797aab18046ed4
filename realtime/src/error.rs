//! Error types for the `realtime` layer.
use domain::error::{AuthErrorKind, Error as DomainError};
use std::error::Error as StdError;
use std::fmt;

/// Errors raised while serving a live connection.
///
/// None of these cross back to a peer as a protocol message: each one either
/// discards the current frame or ends a single session.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: RealtimeErrorKind,
}

#[derive(Debug, PartialEq)]
pub enum RealtimeErrorKind {
    /// Credential rejected; ends the session before it is registered
    Auth(AuthErrorKind),
    Registry(RegistryErrorKind),
    /// Inbound frame was not a valid chat frame; the frame is dropped
    FrameDecode,
    /// The message store refused the record; delivery is skipped
    Persistence,
    Delivery(DeliveryErrorKind),
    /// Reading from or writing to the peer failed
    Transport,
}

#[derive(Debug, PartialEq)]
pub enum RegistryErrorKind {
    AlreadyRegistered,
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum DeliveryErrorKind {
    /// The connection's writer is gone
    Closed,
    /// The outbound queue stayed full past the enqueue deadline
    Full,
}

impl Error {
    pub(crate) fn new(error_kind: RealtimeErrorKind) -> Self {
        Self {
            source: None,
            error_kind,
        }
    }

    pub(crate) fn with_source<E>(error_kind: RealtimeErrorKind, source: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        Self {
            source: Some(source.into()),
            error_kind,
        }
    }

    /// Returns the delivery failure reason, if this is a delivery error.
    pub fn delivery_kind(&self) -> Option<DeliveryErrorKind> {
        match self.error_kind {
            RealtimeErrorKind::Delivery(kind) => Some(kind),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "Realtime Error ({:?}): {source}", self.error_kind),
            None => write!(f, "Realtime Error: {:?}", self.error_kind),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

// Auth failures keep their reason; everything else the domain layer reports
// on this path comes from the message store.
impl From<DomainError> for Error {
    fn from(err: DomainError) -> Self {
        let error_kind = match err.auth_kind() {
            Some(kind) => RealtimeErrorKind::Auth(kind),
            None => RealtimeErrorKind::Persistence,
        };

        Error::with_source(error_kind, err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::with_source(RealtimeErrorKind::FrameDecode, err)
    }
}

impl From<axum::Error> for Error {
    fn from(err: axum::Error) -> Self {
        Error::with_source(RealtimeErrorKind::Transport, err)
    }
}

//! Typed request bodies for the REST endpoints.
//!
//! Deserializing into these structs before a handler runs means malformed
//! input is rejected by the extractor and never reaches the domain layer.

pub(crate) mod message;

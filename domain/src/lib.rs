//! Domain layer for the messenger.
//!
//! Re-exports the entity types consumers need so that `web` and `realtime`
//! never depend on `entity_api` directly.
pub use entity_api::{messages, Id};

pub mod error;
pub mod identity;
pub mod jwt;
pub mod message;

pub use identity::Identity;

//! Direct messages between two users.

use crate::error::Error;
use crate::identity::Identity;
use crate::messages::Model;
use chrono::{DateTime, Utc};
use entity_api::message::{self as MessageApi, NewMessage};
use log::*;
use sea_orm::DatabaseConnection;

pub use entity_api::message::HISTORY_LIMIT;

/// Stores a message from `sender` to `receiver`.
///
/// `sent_at` is when the server accepted the message from the sender and is
/// also stored as the row's creation time. The realtime path stamps it when
/// the frame is decoded, the HTTP path when the request arrives.
pub async fn create(
    db: &DatabaseConnection,
    sender: Identity,
    receiver: Identity,
    content: String,
    sent_at: DateTime<Utc>,
) -> Result<Model, Error> {
    let message = MessageApi::create(
        db,
        NewMessage {
            sender_id: sender.id(),
            receiver_id: receiver.id(),
            content,
            sent_at,
        },
    )
    .await?;

    trace!("Stored message {} from {sender} to {receiver}", message.id);

    Ok(message)
}

/// Returns up to [`HISTORY_LIMIT`] messages exchanged between `user` and
/// `peer`, newest first.
pub async fn find_history(
    db: &DatabaseConnection,
    user: Identity,
    peer: Identity,
) -> Result<Vec<Model>, Error> {
    Ok(MessageApi::find_history(db, user.id(), peer.id()).await?)
}

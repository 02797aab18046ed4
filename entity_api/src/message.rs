//! Persistence operations for the messages table.

use super::error::Error;
use chrono::{DateTime, Utc};
use entity::messages::{ActiveModel, Column, Entity, Model};
use entity::Id;
use log::*;
use sea_orm::{
    entity::prelude::*, ActiveValue::Set, Condition, DatabaseConnection, QueryOrder, QuerySelect,
    Select, TryIntoModel,
};

/// Upper bound on rows returned by a single history query.
pub const HISTORY_LIMIT: u64 = 100;

/// Input for storing a message
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub sender_id: Id,
    pub receiver_id: Id,
    pub content: String,
    /// When the server accepted the message; becomes the row's creation time
    pub sent_at: DateTime<Utc>,
}

/// Stores a message and returns the persisted row. Content is stored as
/// given, empty or not.
pub async fn create(db: &DatabaseConnection, message: NewMessage) -> Result<Model, Error> {
    debug!(
        "Storing message from {} to {} ({} bytes)",
        message.sender_id,
        message.receiver_id,
        message.content.len()
    );

    Ok(active_model(message).save(db).await?.try_into_model()?)
}

fn active_model(message: NewMessage) -> ActiveModel {
    let sent_at: DateTimeWithTimeZone = message.sent_at.into();

    ActiveModel {
        sender_id: Set(message.sender_id),
        receiver_id: Set(message.receiver_id),
        content: Set(message.content),
        sent_at: Set(Some(sent_at)),
        created_at: Set(sent_at),
        updated_at: Set(sent_at),
        deleted_at: Set(None),
        ..Default::default()
    }
}

/// Finds the conversation between two users in either direction, newest first,
/// skipping soft-deleted rows.
pub async fn find_history(
    db: &DatabaseConnection,
    user_id: Id,
    peer_id: Id,
) -> Result<Vec<Model>, Error> {
    Ok(history_query(user_id, peer_id).all(db).await?)
}

fn history_query(user_id: Id, peer_id: Id) -> Select<Entity> {
    let conversation = Condition::any()
        .add(
            Condition::all()
                .add(Column::SenderId.eq(user_id))
                .add(Column::ReceiverId.eq(peer_id)),
        )
        .add(
            Condition::all()
                .add(Column::SenderId.eq(peer_id))
                .add(Column::ReceiverId.eq(user_id)),
        );

    Entity::find()
        .filter(conversation)
        .filter(Column::DeletedAt.is_null())
        .order_by_desc(Column::CreatedAt)
        .limit(HISTORY_LIMIT)
}

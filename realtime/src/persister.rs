use crate::error::Error;
use crate::message::ChatRecord;
use async_trait::async_trait;
use domain::message as MessageApi;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// Durable storage for accepted chat records.
///
/// The router only cares whether a store succeeded: a record that was not
/// stored is never delivered.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Persister: Send + Sync + 'static {
    async fn store(&self, record: &ChatRecord) -> Result<(), Error>;
}

/// Stores records in the messages table.
pub struct DatabasePersister {
    db: Arc<DatabaseConnection>,
}

impl DatabasePersister {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Persister for DatabasePersister {
    async fn store(&self, record: &ChatRecord) -> Result<(), Error> {
        MessageApi::create(
            &self.db,
            record.sender,
            record.recipient,
            record.content.clone(),
            record.sent_at,
        )
        .await?;

        Ok(())
    }
}

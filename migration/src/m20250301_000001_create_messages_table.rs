use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // sender_id and receiver_id reference users owned by the identity
        // provider, so there are no foreign keys here.
        let create_table_sql = "CREATE TABLE IF NOT EXISTS messenger.messages (
            id BIGSERIAL PRIMARY KEY,
            sender_id BIGINT NOT NULL,
            receiver_id BIGINT NOT NULL,
            content TEXT NOT NULL,
            sent_at TIMESTAMPTZ,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            deleted_at TIMESTAMPTZ
        )";

        manager
            .get_connection()
            .execute_unprepared(create_table_sql)
            .await?;

        // Serves the two-direction history lookup ordered by created_at
        let create_conversation_index_sql =
            "CREATE INDEX IF NOT EXISTS messages_conversation_idx
            ON messenger.messages(sender_id, receiver_id, created_at DESC)";

        manager
            .get_connection()
            .execute_unprepared(create_conversation_index_sql)
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("DROP TABLE IF EXISTS messenger.messages")
            .await?;

        Ok(())
    }
}

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum ChatMessages {
    Table,
    SenderId,
    ReceiverId,
    IsRead,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Notifications {
    Table,
    UserId,
    IsRead,
    CreatedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // The conversation list scans every message where the user is sender
        // or receiver, newest first.
        manager
            .create_index(
                Index::create()
                    .name("idx_chat_messages_sender_created")
                    .table(ChatMessages::Table)
                    .col(ChatMessages::SenderId)
                    .col(ChatMessages::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_chat_messages_receiver_created")
                    .table(ChatMessages::Table)
                    .col(ChatMessages::ReceiverId)
                    .col(ChatMessages::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // Unread badge counts filter on (receiver_id, is_read).
        manager
            .create_index(
                Index::create()
                    .name("idx_chat_messages_receiver_unread")
                    .table(ChatMessages::Table)
                    .col(ChatMessages::ReceiverId)
                    .col(ChatMessages::IsRead)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_notifications_user_created")
                    .table(Notifications::Table)
                    .col(Notifications::UserId)
                    .col(Notifications::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_notifications_user_unread")
                    .table(Notifications::Table)
                    .col(Notifications::UserId)
                    .col(Notifications::IsRead)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_chat_messages_sender_created")
                    .table(ChatMessages::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_chat_messages_receiver_created")
                    .table(ChatMessages::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_chat_messages_receiver_unread")
                    .table(ChatMessages::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_notifications_user_created")
                    .table(Notifications::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_notifications_user_unread")
                    .table(Notifications::Table)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }
}

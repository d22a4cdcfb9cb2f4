use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Notification kind, persisted in the `type` column as a lowercase string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    #[sea_orm(string_value = "new_message")]
    NewMessage,
    #[sea_orm(string_value = "new_product")]
    NewProduct,
    #[sea_orm(string_value = "order_update")]
    OrderUpdate,
}

/// SeaORM entity for the `notifications` table.
///
/// Append-only feed of user-facing events. Only `is_read` mutates after
/// insert; rows are never deleted.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notifications")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    #[sea_orm(column_name = "type")]
    pub kind: NotificationKind,
    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub message: String,
    pub related_id: Option<Uuid>,
    pub is_read: bool,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::profiles::Entity",
        from = "Column::UserId",
        to = "super::profiles::Column::Id"
    )]
    User,
}

impl Related<super::profiles::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

// ── DTOs ──

/// DTO for appending a notification to a user's feed.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateNotification {
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub related_id: Option<Uuid>,
}

/// Response for the notification list endpoint. The unread count is derived
/// from the store on every fetch, never kept as a separate counter.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationList {
    pub notifications: Vec<Model>,
    pub unread_count: u64,
}

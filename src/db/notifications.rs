use sea_orm::prelude::Expr;
use sea_orm::*;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::notifications::{self, CreateNotification};

/// The notification list endpoint never returns more than this many rows.
pub const NOTIFICATION_LIST_CAP: u64 = 50;

/// Append a notification to a user's feed.
pub async fn insert_notification(
    db: &DatabaseConnection,
    input: CreateNotification,
) -> Result<notifications::Model, ApiError> {
    if input.user_id.is_nil() {
        return Err(ApiError::validation("user_id is required"));
    }

    let new_notification = notifications::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(input.user_id),
        kind: Set(input.kind),
        title: Set(input.title),
        message: Set(input.message),
        related_id: Set(input.related_id),
        is_read: Set(false),
        created_at: Set(chrono::Utc::now()),
    };

    Ok(new_notification.insert(db).await?)
}

/// Fetch a user's notifications, newest first, capped.
pub async fn get_notifications_for_user(
    db: &DatabaseConnection,
    user_id: Uuid,
) -> Result<Vec<notifications::Model>, ApiError> {
    Ok(notifications::Entity::find()
        .filter(notifications::Column::UserId.eq(user_id))
        .order_by_desc(notifications::Column::CreatedAt)
        .order_by_desc(notifications::Column::Id)
        .limit(NOTIFICATION_LIST_CAP)
        .all(db)
        .await?)
}

/// Count a user's unread notifications. Always derived with a filtered count,
/// never read from a stored counter.
pub async fn count_unread(db: &DatabaseConnection, user_id: Uuid) -> Result<u64, ApiError> {
    Ok(notifications::Entity::find()
        .filter(notifications::Column::UserId.eq(user_id))
        .filter(notifications::Column::IsRead.eq(false))
        .count(db)
        .await?)
}

/// Mark a single notification as read. Scoped to the owner, so a foreign id
/// resolves to NotFound rather than mutating another user's feed.
pub async fn mark_notification_read(
    db: &DatabaseConnection,
    id: Uuid,
    user_id: Uuid,
) -> Result<(), ApiError> {
    let result = notifications::Entity::update_many()
        .col_expr(notifications::Column::IsRead, Expr::value(true))
        .filter(notifications::Column::Id.eq(id))
        .filter(notifications::Column::UserId.eq(user_id))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(ApiError::not_found(format!("Notification {id} not found")));
    }

    Ok(())
}

/// Mark all of a user's notifications as read. Returns the number updated.
pub async fn mark_all_read(db: &DatabaseConnection, user_id: Uuid) -> Result<u64, ApiError> {
    let result = notifications::Entity::update_many()
        .col_expr(notifications::Column::IsRead, Expr::value(true))
        .filter(notifications::Column::UserId.eq(user_id))
        .filter(notifications::Column::IsRead.eq(false))
        .exec(db)
        .await?;

    Ok(result.rows_affected)
}

use actix_web::{HttpResponse, web};
use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::auth::middleware::AuthenticatedUser;
use crate::db::notifications as notification_db;
use crate::error::ApiError;
use crate::models::notifications::NotificationList;

/// GET /api/notifications
///
/// The caller's feed, newest first, capped. The unread count is recomputed
/// from the store on every fetch — it is never a stored counter, so it cannot
/// drift from the rows themselves.
pub async fn get_notifications(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, ApiError> {
    let user_id = user.0.id;

    let notifications = notification_db::get_notifications_for_user(db.get_ref(), user_id).await?;
    let unread_count = notification_db::count_unread(db.get_ref(), user_id).await?;

    Ok(HttpResponse::Ok().json(NotificationList {
        notifications,
        unread_count,
    }))
}

/// PUT /api/notifications/{id}/read — mark one notification as read.
pub async fn mark_read(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();

    notification_db::mark_notification_read(db.get_ref(), id, user.0.id).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": format!("Notification {id} marked read"),
    })))
}

/// PUT /api/notifications/read-all — mark the caller's whole feed as read.
pub async fn mark_all_read(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, ApiError> {
    let updated = notification_db::mark_all_read(db.get_ref(), user.0.id).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "updated": updated })))
}

use actix_web::{HttpResponse, web};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::middleware::AuthenticatedUser;
use crate::cache::{RedisCache, keys};
use crate::db::profiles as profile_db;
use crate::error::ApiError;
use crate::models::profiles::{CompleteProfile, ProfileResponse};

/// GET /api/auth/me — return the currently authenticated user's profile.
pub async fn me(user: AuthenticatedUser) -> HttpResponse {
    HttpResponse::Ok().json(ProfileResponse::from(user.0))
}

/// POST /api/auth/complete-profile — set name, phone, and role after first login.
pub async fn complete_profile(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    cache: web::Data<Arc<RedisCache>>,
    body: web::Json<CompleteProfile>,
) -> Result<HttpResponse, ApiError> {
    let updated = profile_db::complete_profile(db.get_ref(), user.0.id, body.into_inner()).await?;
    let _ = cache.delete(&keys::profile(&updated.id.to_string())).await;
    Ok(HttpResponse::Ok().json(ProfileResponse::from(updated)))
}

/// GET /api/profiles/{id} — public view of a profile (requires authentication).
pub async fn get_profile(
    _user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    cache: web::Data<Arc<RedisCache>>,
    config: web::Data<crate::cache::CacheConfig>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let cache_key = keys::profile(&id.to_string());

    match cache.get::<ProfileResponse>(&cache_key).await {
        Ok(Some(cached)) => return Ok(HttpResponse::Ok().json(cached)),
        Ok(None) => {}
        Err(e) => tracing::warn!("Cache error: {e}"),
    }

    let profile = profile_db::get_profile_by_id(db.get_ref(), id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Profile {id} not found")))?;

    let response = ProfileResponse::from(profile);
    let _ = cache.set(&cache_key, &response, config.profile_ttl).await;
    Ok(HttpResponse::Ok().json(response))
}

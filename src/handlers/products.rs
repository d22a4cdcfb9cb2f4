use actix_web::{HttpResponse, web};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::authorization::verify_product_owner;
use crate::auth::middleware::AuthenticatedUser;
use crate::cache::{CacheConfig, RedisCache, keys};
use crate::db::products as product_db;
use crate::error::ApiError;
use crate::models::PaginationQuery;
use crate::models::products::{self, CreateProduct, UpdateProduct};
use crate::models::profiles::Roles;

/// GET /api/products — paginated market listing (requires authentication).
/// Query params: ?page=1&limit=20
pub async fn get_products(
    _user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    cache: web::Data<Arc<RedisCache>>,
    config: web::Data<CacheConfig>,
    query: web::Query<PaginationQuery>,
) -> Result<HttpResponse, ApiError> {
    let page = query.page();
    let limit = query.limit();
    let cache_key = keys::market_page(page, limit);

    match cache.get::<Vec<products::Model>>(&cache_key).await {
        Ok(Some(cached)) => return Ok(HttpResponse::Ok().json(cached)),
        Ok(None) => {}
        Err(e) => tracing::warn!("Cache error: {e}"),
    }

    let listing = product_db::get_products_paginated(db.get_ref(), page, limit).await?;
    let _ = cache.set(&cache_key, &listing, config.market_ttl).await;

    Ok(HttpResponse::Ok().json(listing))
}

/// GET /api/products/{id} — single product detail.
pub async fn get_product(
    _user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    cache: web::Data<Arc<RedisCache>>,
    config: web::Data<CacheConfig>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let cache_key = keys::product(&id.to_string());

    match cache.get::<products::Model>(&cache_key).await {
        Ok(Some(cached)) => return Ok(HttpResponse::Ok().json(cached)),
        Ok(None) => {}
        Err(e) => tracing::warn!("Cache error: {e}"),
    }

    let product = product_db::get_product_by_id(db.get_ref(), id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Product {id} not found")))?;

    let _ = cache.set(&cache_key, &product, config.product_ttl).await;
    Ok(HttpResponse::Ok().json(product))
}

/// GET /api/products/farmer/{farmer_id} — a farmer's own listings.
pub async fn get_products_by_farmer(
    _user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let farmer_id = path.into_inner();
    let listing = product_db::get_products_by_farmer(db.get_ref(), farmer_id).await?;
    Ok(HttpResponse::Ok().json(listing))
}

/// POST /api/products — create a listing. Farmers only.
pub async fn create_product(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    cache: web::Data<Arc<RedisCache>>,
    body: web::Json<CreateProduct>,
) -> Result<HttpResponse, ApiError> {
    if user.0.role != Roles::Farmer {
        return Err(ApiError::authorization("Only farmers can list products"));
    }

    let product = product_db::insert_product(db.get_ref(), body.into_inner(), user.0.id).await?;

    let _ = cache.delete_pattern(keys::market_pattern()).await;
    let _ = cache
        .delete(&keys::farmer_products(&user.0.id.to_string()))
        .await;

    Ok(HttpResponse::Created().json(product))
}

/// PUT /api/products/{id} — update a listing. Owner only.
pub async fn update_product(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    cache: web::Data<Arc<RedisCache>>,
    path: web::Path<Uuid>,
    body: web::Json<UpdateProduct>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();

    verify_product_owner(db.get_ref(), id, user.0.id).await?;

    let updated = product_db::update_product(db.get_ref(), id, body.into_inner()).await?;

    let _ = cache.delete(&keys::product(&id.to_string())).await;
    let _ = cache.delete_pattern(keys::market_pattern()).await;

    Ok(HttpResponse::Ok().json(updated))
}

/// Request body for PUT /api/products/{id}/contact-visibility.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ContactVisibilityRequest {
    pub visible: bool,
}

/// PUT /api/products/{id}/contact-visibility — owner-only toggle of the
/// contact disclosure flag (the offer engine flips it on acceptance; this
/// endpoint lets a farmer revoke or re-enable it directly).
pub async fn set_contact_visibility(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    cache: web::Data<Arc<RedisCache>>,
    path: web::Path<Uuid>,
    body: web::Json<ContactVisibilityRequest>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();

    product_db::set_contact_visible(db.get_ref(), id, user.0.id, body.visible).await?;

    let _ = cache.delete(&keys::product(&id.to_string())).await;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "id": id,
        "show_contact_number": body.visible,
    })))
}

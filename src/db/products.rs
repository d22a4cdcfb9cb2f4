use sea_orm::prelude::Expr;
use sea_orm::*;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::products::{self, CreateProduct, UpdateProduct};

/// Insert a new product owned by `farmer_id`. Contact visibility starts off.
pub async fn insert_product(
    db: &DatabaseConnection,
    input: CreateProduct,
    farmer_id: Uuid,
) -> Result<products::Model, ApiError> {
    if input.name.trim().is_empty() {
        return Err(ApiError::validation("product name cannot be empty"));
    }
    if input.price <= 0.0 || !input.price.is_finite() {
        return Err(ApiError::validation("price must be positive"));
    }

    let new_product = products::ActiveModel {
        id: Set(Uuid::new_v4()),
        farmer_id: Set(farmer_id),
        name: Set(input.name),
        description: Set(input.description),
        price: Set(input.price),
        unit: Set(input.unit),
        category: Set(input.category),
        image_url: Set(input.image_url),
        show_contact_number: Set(false),
        created_at: Set(chrono::Utc::now()),
    };

    Ok(new_product.insert(db).await?)
}

/// Fetch a page of the market listing, newest first.
pub async fn get_products_paginated(
    db: &DatabaseConnection,
    page: u64,
    limit: u64,
) -> Result<Vec<products::Model>, ApiError> {
    Ok(products::Entity::find()
        .order_by_desc(products::Column::CreatedAt)
        .order_by_desc(products::Column::Id)
        .paginate(db, limit)
        .fetch_page(page.saturating_sub(1))
        .await?)
}

/// Fetch a single product by ID.
pub async fn get_product_by_id(
    db: &DatabaseConnection,
    id: Uuid,
) -> Result<Option<products::Model>, ApiError> {
    Ok(products::Entity::find_by_id(id).one(db).await?)
}

/// Fetch all products owned by a farmer.
pub async fn get_products_by_farmer(
    db: &DatabaseConnection,
    farmer_id: Uuid,
) -> Result<Vec<products::Model>, ApiError> {
    Ok(products::Entity::find()
        .filter(products::Column::FarmerId.eq(farmer_id))
        .order_by_desc(products::Column::CreatedAt)
        .all(db)
        .await?)
}

/// Update a product's editable fields. The caller must already have verified
/// ownership.
pub async fn update_product(
    db: &DatabaseConnection,
    id: Uuid,
    input: UpdateProduct,
) -> Result<products::Model, ApiError> {
    let product = products::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Product {id} not found")))?;

    let mut active: products::ActiveModel = product.into();

    if let Some(name) = input.name {
        active.name = Set(name);
    }
    if let Some(description) = input.description {
        active.description = Set(description);
    }
    if let Some(price) = input.price {
        if price <= 0.0 || !price.is_finite() {
            return Err(ApiError::validation("price must be positive"));
        }
        active.price = Set(price);
    }
    if let Some(unit) = input.unit {
        active.unit = Set(unit);
    }
    if let Some(category) = input.category {
        active.category = Set(Some(category));
    }
    if let Some(image_url) = input.image_url {
        active.image_url = Set(Some(image_url));
    }

    Ok(active.update(db).await?)
}

/// Flip a product's contact-visibility flag.
///
/// The update is guarded by `farmer_id = owner_id` in the predicate itself, so
/// a caller who does not own the product cannot flip it no matter how the
/// request was forged. Zero rows affected resolves to NotFound (no such
/// product) or AuthorizationError (exists, not owned by the caller).
pub async fn set_contact_visible(
    db: &DatabaseConnection,
    product_id: Uuid,
    owner_id: Uuid,
    visible: bool,
) -> Result<(), ApiError> {
    let result = products::Entity::update_many()
        .col_expr(products::Column::ShowContactNumber, Expr::value(visible))
        .filter(products::Column::Id.eq(product_id))
        .filter(products::Column::FarmerId.eq(owner_id))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return match get_product_by_id(db, product_id).await? {
            None => Err(ApiError::not_found(format!("Product {product_id} not found"))),
            Some(_) => Err(ApiError::authorization(
                "Only the owning farmer can change contact visibility",
            )),
        };
    }

    Ok(())
}

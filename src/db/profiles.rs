use sea_orm::*;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::profiles::{self, CompleteProfile, CreateProfileFromAuth};

/// Find a profile by its Supabase auth UUID, creating it from JWT claims on
/// first sight (called by the auth middleware).
pub async fn find_or_create_from_auth(
    db: &DatabaseConnection,
    input: CreateProfileFromAuth,
) -> Result<profiles::Model, ApiError> {
    if let Some(existing) = profiles::Entity::find_by_id(input.id).one(db).await? {
        return Ok(existing);
    }

    let new_profile = profiles::ActiveModel {
        id: Set(input.id),
        email: Set(input.email),
        full_name: Set(input.full_name),
        phone: Set(None),
        avatar_url: Set(input.avatar_url),
        auth_provider: Set(input.auth_provider),
        role: Set(input.role),
        created_at: Set(chrono::Utc::now()),
        updated_at: Set(None),
    };

    Ok(new_profile.insert(db).await?)
}

/// Fetch a single profile by ID.
pub async fn get_profile_by_id(
    db: &DatabaseConnection,
    id: Uuid,
) -> Result<Option<profiles::Model>, ApiError> {
    Ok(profiles::Entity::find_by_id(id).one(db).await?)
}

/// Complete a profile after first login (set name, phone, role).
pub async fn complete_profile(
    db: &DatabaseConnection,
    id: Uuid,
    input: CompleteProfile,
) -> Result<profiles::Model, ApiError> {
    let profile = profiles::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Profile {id} not found")))?;

    let mut active: profiles::ActiveModel = profile.into();

    if let Some(full_name) = input.full_name {
        active.full_name = Set(Some(full_name));
    }
    if let Some(phone) = input.phone {
        active.phone = Set(Some(phone));
    }
    if let Some(role) = input.role {
        active.role = Set(role);
    }
    if let Some(avatar_url) = input.avatar_url {
        active.avatar_url = Set(Some(avatar_url));
    }
    active.updated_at = Set(Some(chrono::Utc::now()));

    Ok(active.update(db).await?)
}

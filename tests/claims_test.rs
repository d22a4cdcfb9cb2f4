//! Tests for Supabase JWT claim helpers.
//!
//! No running server, database, or JWKS endpoint is needed; these only
//! exercise the claim-extraction logic the auth middleware relies on.
//!
//! Run with: `cargo test --test claims_test`
use chrono::Utc;
use uuid::Uuid;

use farmlink_backend::auth::jwt::{Claims, UserMetadata};

fn claims_with_metadata(sub: &str, email: &str, full_name: &str) -> Claims {
    let now = Utc::now().timestamp() as usize;

    Claims {
        sub: sub.to_string(),
        exp: now + 3600,
        iat: Some(now),
        iss: Some("https://example.supabase.co/auth/v1".to_string()),
        email: Some(email.to_string()),
        role: Some("authenticated".to_string()),
        user_metadata: Some(UserMetadata {
            full_name: Some(full_name.to_string()),
            name: None,
            avatar_url: Some("https://example.com/avatar.png".to_string()),
            picture: None,
            email: Some(email.to_string()),
            email_verified: Some(true),
        }),
    }
}

#[test]
fn test_user_id_parses_sub_claim() {
    let user_id = Uuid::new_v4();
    let claims = claims_with_metadata(&user_id.to_string(), "alice@example.com", "Alice Smith");

    assert_eq!(claims.user_id().unwrap(), user_id);
    assert_eq!(claims.user_email().unwrap(), "alice@example.com");
    assert_eq!(claims.display_name().unwrap(), "Alice Smith");
    assert_eq!(
        claims.avatar_url().unwrap(),
        "https://example.com/avatar.png"
    );
}

#[test]
fn test_invalid_sub_is_rejected() {
    let claims = claims_with_metadata("not-a-uuid", "bob@example.com", "Bob Jones");

    assert!(claims.user_id().is_err());
}

#[test]
fn test_claims_helpers_with_missing_metadata() {
    let now = Utc::now().timestamp() as usize;

    let claims = Claims {
        sub: Uuid::new_v4().to_string(),
        exp: now + 3600,
        iat: Some(now),
        iss: None,
        email: Some("bare@example.com".to_string()),
        role: None,
        user_metadata: None, // no metadata at all
    };

    // Should fall back to top-level email.
    assert_eq!(claims.user_email().unwrap(), "bare@example.com");
    // No metadata → None.
    assert!(claims.display_name().is_none());
    assert!(claims.avatar_url().is_none());
}

#[test]
fn test_name_falls_back_when_full_name_missing() {
    let now = Utc::now().timestamp() as usize;

    let claims = Claims {
        sub: Uuid::new_v4().to_string(),
        exp: now + 3600,
        iat: Some(now),
        iss: None,
        email: None,
        role: None,
        user_metadata: Some(UserMetadata {
            full_name: None,
            name: Some("carol".to_string()),
            avatar_url: None,
            picture: Some("https://example.com/pic.png".to_string()),
            email: Some("carol@example.com".to_string()),
            email_verified: None,
        }),
    };

    assert_eq!(claims.display_name().unwrap(), "carol");
    assert_eq!(claims.avatar_url().unwrap(), "https://example.com/pic.png");
    // Falls back to metadata email when the top-level one is absent.
    assert_eq!(claims.user_email().unwrap(), "carol@example.com");
}

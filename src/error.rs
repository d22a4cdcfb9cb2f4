use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use sea_orm::DbErr;
use thiserror::Error;

/// Error taxonomy shared by the store adapters, the chat core, and the REST
/// handlers.
///
/// `Validation` and `PreconditionFailed` are raised before any state changes.
/// `Authorization` aborts the specific step it guards; for offer side effects
/// it is downgraded to a warning by the caller rather than propagated (the
/// status commit is the source of truth). `Database` covers transient backend
/// failures and is safe to retry on reads.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Authorization(String),

    #[error("{0}")]
    PreconditionFailed(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Timeout(String),

    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn authorization(msg: impl Into<String>) -> Self {
        Self::Authorization(msg.into())
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::PreconditionFailed(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Authorization(_) => StatusCode::FORBIDDEN,
            ApiError::PreconditionFailed(_) => StatusCode::CONFLICT,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_taxonomy() {
        assert_eq!(
            ApiError::validation("bad quantity").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::authorization("not the receiver").status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::precondition("offer already resolved").status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::not_found("no such conversation").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::timeout("write timed out").status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            ApiError::Database(DbErr::Custom("connection reset".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn response_body_uses_error_key() {
        let resp = ApiError::validation("quantity must be positive").error_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}

//! Error types for Careerwise.

use std::time::Duration;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Top-level error type for internal plumbing.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Insight error: {0}")]
    Insight(#[from] InsightError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Transaction exceeded its {0:?} budget")]
    TxnTimeout(Duration),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },
}

/// Insight generation errors.
#[derive(Debug, thiserror::Error)]
pub enum InsightError {
    #[error("Generation failed: {0}")]
    Generation(#[from] LlmError),

    #[error("Generated payload invalid: {0}")]
    InvalidPayload(String),
}

/// Cache invalidation errors.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Revalidation request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Revalidation endpoint returned {status}")]
    Rejected { status: u16 },
}

/// Result type alias for internal operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── HTTP-facing taxonomy ────────────────────────────────────────────────

/// Errors surfaced to API callers.
///
/// Downstream detail never reaches the client: the service logs the original
/// error and maps it to one of the generic variants below, whose messages
/// are fixed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AppError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("User not found")]
    UserNotFound,

    #[error("Failed to fetch profile")]
    ProfileFetchFailed,

    #[error("Failed to update profile")]
    ProfileUpdateFailed,

    #[error("Failed to check onboarding status")]
    OnboardingCheckFailed,

    #[error("Failed to fetch industry insights")]
    InsightFetchFailed,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::UserNotFound => StatusCode::NOT_FOUND,
            AppError::ProfileFetchFailed
            | AppError::ProfileUpdateFailed
            | AppError::OnboardingCheckFailed
            | AppError::InsightFetchFailed => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (self.status(), body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_error_status_mapping() {
        assert_eq!(AppError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::UserNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::ProfileFetchFailed.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::ProfileUpdateFailed.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::OnboardingCheckFailed.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::InsightFetchFailed.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn app_error_messages_are_fixed() {
        // These strings are the API contract — clients and logs both key on them.
        assert_eq!(AppError::Unauthorized.to_string(), "Unauthorized");
        assert_eq!(AppError::UserNotFound.to_string(), "User not found");
        assert_eq!(
            AppError::ProfileFetchFailed.to_string(),
            "Failed to fetch profile"
        );
        assert_eq!(
            AppError::ProfileUpdateFailed.to_string(),
            "Failed to update profile"
        );
        assert_eq!(
            AppError::OnboardingCheckFailed.to_string(),
            "Failed to check onboarding status"
        );
        assert_eq!(
            AppError::InsightFetchFailed.to_string(),
            "Failed to fetch industry insights"
        );
    }

    #[test]
    fn database_error_display() {
        let e = DatabaseError::NotFound {
            entity: "user".to_string(),
            id: "abc".to_string(),
        };
        assert_eq!(e.to_string(), "Entity not found: user with id abc");

        let e = DatabaseError::TxnTimeout(Duration::from_secs(10));
        assert!(e.to_string().contains("10s"));
    }
}

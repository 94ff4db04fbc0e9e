//! Service error taxonomy and its HTTP mapping.

use crate::domain::StorageError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Error type shared by the orchestrator, the code service and the handlers.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Malformed or missing input.
    #[error("{0}")]
    BadRequest(String),

    /// User, session, code or credential absent (or expired).
    #[error("{0} not found")]
    NotFound(String),

    /// Duplicate registration without prior authentication.
    #[error("{0}")]
    Conflict(String),

    /// Removing the credential would leave the user with none.
    #[error("cannot delete the last credential")]
    LastCredential,

    /// Missing or invalid session on an endpoint that requires one.
    #[error("authentication required")]
    Unauthorized,

    #[error("invalid client_id")]
    InvalidClient,

    #[error("invalid redirect_uri")]
    InvalidRedirectUri,

    /// Authorization code unknown, already used, or bound to another client.
    #[error("invalid or expired authorization code")]
    InvalidGrant,

    /// Ceremony or request past its time-to-live.
    #[error("{0} expired")]
    Expired(String),

    /// The credential verifier rejected the ceremony.
    #[error("ceremony failed: {0}")]
    Ceremony(String),

    /// Storage backend could not be reached.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    // ---
    pub error: String,
}

impl AuthError {
    // ---
    pub fn bad_request(message: impl Into<String>) -> Self {
        // ---
        Self::BadRequest(message.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        // ---
        Self::NotFound(what.into())
    }

    pub fn internal(err: impl std::fmt::Display) -> Self {
        // ---
        Self::Internal(err.to_string())
    }

    pub fn ceremony(err: impl std::fmt::Display) -> Self {
        // ---
        Self::Ceremony(err.to_string())
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        // ---
        match self {
            Self::BadRequest(_)
            | Self::InvalidClient
            | Self::InvalidRedirectUri
            | Self::InvalidGrant
            | Self::Ceremony(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) | Self::LastCredential => StatusCode::CONFLICT,
            Self::Expired(_) => StatusCode::GONE,
            Self::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message. Server-side failures stay generic.
    fn public_message(&self) -> String {
        // ---
        match self {
            Self::StorageUnavailable(_) => "Storage unavailable".to_string(),
            Self::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<StorageError> for AuthError {
    fn from(err: StorageError) -> Self {
        // ---
        match err {
            StorageError::NotFound => Self::NotFound("record".to_string()),
            other => Self::StorageUnavailable(other.to_string()),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        // ---
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!("Request refused ({}): {}", status, self);
        }

        (
            status,
            Json(ErrorResponse {
                error: self.public_message(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn storage_not_found_stays_not_found() {
        // ---
        let err: AuthError = StorageError::NotFound.into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn storage_fault_is_server_side() {
        // ---
        let err: AuthError = StorageError::unavailable("connection refused").into();
        assert!(matches!(err, AuthError::StorageUnavailable(_)));
        assert!(err.status_code().is_server_error());
        assert_eq!(err.public_message(), "Storage unavailable");
    }

    #[test]
    fn conflicts_map_to_409() {
        // ---
        assert_eq!(AuthError::LastCredential.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            AuthError::Conflict("exists".into()).status_code(),
            StatusCode::CONFLICT
        );
    }
}

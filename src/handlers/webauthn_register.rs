//! WebAuthn registration handlers.
//!
//! Implements the two-phase passkey registration flow:
//! 1. `register_begin` - Generate challenge and return credential creation options
//! 2. `register_finish` - Verify the attestation and store the credential

use super::shared_types::{optional_session, StatusResponse};
use crate::app_state::AppState;
use crate::error::AuthError;
use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct RegistrationQuery {
    // ---
    pub username: Option<String>,
}

impl RegistrationQuery {
    fn username(&self) -> Result<&str, AuthError> {
        // ---
        self.username
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| AuthError::bad_request("username is required"))
    }
}

// ============================================================================
// Registration Begin Handler
// ============================================================================

/// POST /register/begin?username=
///
/// Starts passkey registration. A user that already owns a passkey can only
/// add another while presenting one of their own sessions (header, bearer
/// token or cookie).
///
/// # Response
/// Credential creation options for `navigator.credentials.create()`.
pub async fn register_begin(
    State(state): State<AppState>,
    Query(query): Query<RegistrationQuery>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AuthError> {
    // ---
    let username = query.username()?;
    let caller = optional_session(&state, &headers).await?;

    let options = state
        .orchestrator()
        .begin_registration(username, caller.as_ref())
        .await?;

    Ok(Json(options))
}

// ============================================================================
// Registration Finish Handler
// ============================================================================

/// POST /register/finish?username=
///
/// Completes registration. The body is the credential returned by
/// `navigator.credentials.create()`.
pub async fn register_finish(
    State(state): State<AppState>,
    Query(query): Query<RegistrationQuery>,
    headers: HeaderMap,
    Json(response): Json<serde_json::Value>,
) -> Result<Json<StatusResponse>, AuthError> {
    // ---
    let username = query.username()?;
    let caller = optional_session(&state, &headers).await?;

    state
        .orchestrator()
        .finish_registration(username, &response, caller.as_ref())
        .await?;

    state.metrics().record_registration();
    Ok(Json(StatusResponse::new("registered")))
}

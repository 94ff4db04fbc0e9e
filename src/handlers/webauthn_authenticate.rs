//! WebAuthn authentication handlers.
//!
//! Implements the two-phase discoverable (username-less) login flow:
//! 1. `login_begin` - Generate challenge and a ceremony correlator
//! 2. `login_finish` - Verify the assertion and create a session

use super::shared_types::session_cookie;
use crate::app_state::AppState;
use crate::error::AuthError;
use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginBeginResponse {
    //
    pub public_key: serde_json::Value,
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginFinishQuery {
    //
    #[serde(rename = "sessionId", alias = "session_id")]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginFinishResponse {
    //
    pub status: &'static str,
    pub session_id: String,
}

// ============================================================================
// Login Begin Handler
// ============================================================================

/// POST /login/begin
///
/// Returns assertion options with an empty allow-list, so the authenticator
/// offers whichever passkey the user picks. `sessionId` here is only the
/// ceremony correlator to echo back to `/login/finish`.
pub async fn login_begin(
    State(state): State<AppState>,
) -> Result<Json<LoginBeginResponse>, AuthError> {
    //
    let start = state.orchestrator().begin_discoverable_login().await?;

    let public_key = start
        .options
        .get("publicKey")
        .cloned()
        .unwrap_or(start.options);

    Ok(Json(LoginBeginResponse {
        public_key,
        session_id: start.ceremony_id,
    }))
}

// ============================================================================
// Login Finish Handler
// ============================================================================

/// POST /login/finish?sessionId=
///
/// Verifies the assertion from `navigator.credentials.get()` and mints a new
/// authenticated session, returned in the body and as a cookie.
pub async fn login_finish(
    State(state): State<AppState>,
    Query(query): Query<LoginFinishQuery>,
    Json(response): Json<serde_json::Value>,
) -> Result<impl IntoResponse, AuthError> {
    //
    let ceremony_id = query
        .session_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AuthError::bad_request("sessionId is required"))?;

    let user = state
        .orchestrator()
        .finish_discoverable_login(&ceremony_id, &response)
        .await?;

    let session = state.validator().create_session(&user).await?;
    state.metrics().record_login();

    let max_age = (session.expires_at - session.created_at).num_seconds();
    Ok((
        [(header::SET_COOKIE, session_cookie(&session.id, max_age))],
        Json(LoginFinishResponse {
            status: "authenticated",
            session_id: session.id,
        }),
    ))
}

//! Session validation, logout and self-service session management.

use super::shared_types::{
    cleared_session_cookie, require_session, session_id_from_headers, StatusResponse,
};
use crate::app_state::AppState;
use crate::error::AuthError;
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateResponse {
    // ---
    pub valid: bool,
    pub username: String,
    pub user_id: Uuid,
    pub expires: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct LogoutQuery {
    // ---
    #[serde(alias = "sessionId")]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionList {
    // ---
    pub username: String,
    pub sessions: Vec<SessionSummary>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    // ---
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub current: bool,
}

/// GET /validate/{sessionId}
///
/// Read-only lookup for other services. Unknown and expired sessions are 404.
pub async fn validate_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ValidateResponse>, AuthError> {
    // ---
    let info = state.validator().validate(&session_id).await?;

    Ok(Json(ValidateResponse {
        valid: true,
        username: info.username,
        user_id: info.user_id,
        expires: info.expires_at,
    }))
}

/// POST /logout
///
/// Ends the session named by the usual headers/cookie or by the
/// `session_id` query parameter. Always succeeds once an id is supplied.
pub async fn logout(
    State(state): State<AppState>,
    Query(query): Query<LogoutQuery>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AuthError> {
    // ---
    let session_id = session_id_from_headers(&headers)
        .or(query.session_id.filter(|id| !id.is_empty()))
        .ok_or_else(|| AuthError::bad_request("session id is required"))?;

    state.validator().logout(&session_id).await?;

    Ok((
        [(header::SET_COOKIE, cleared_session_cookie())],
        Json(StatusResponse::new("logged_out")),
    ))
}

/// GET /user/sessions
pub async fn list_sessions(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SessionList>, AuthError> {
    // ---
    let caller = require_session(&state, &headers).await?;
    let sessions = state.validator().list_for_user(&caller.username).await?;

    let sessions = sessions
        .into_iter()
        .map(|s| SessionSummary {
            current: s.id == caller.session_id,
            id: s.id,
            created_at: s.created_at,
            expires_at: s.expires_at,
        })
        .collect();

    Ok(Json(SessionList {
        username: caller.username,
        sessions,
    }))
}

/// DELETE /user/sessions/{id}
///
/// Revokes one of the caller's own sessions. Another user's session id is
/// reported as not found.
pub async fn delete_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
) -> Result<Json<StatusResponse>, AuthError> {
    // ---
    let caller = require_session(&state, &headers).await?;
    state.validator().revoke(&caller.username, &session_id).await?;

    Ok(Json(StatusResponse::new("deleted")))
}

use crate::app_state::AppState;
use crate::error::AuthError;
use crate::session::SessionInfo;
use axum::http::{header, HeaderMap};
use serde::Serialize;

/// Header checked first when looking for the caller's session id.
pub const SESSION_HEADER: &str = "x-session-id";

/// Cookie set on login and checked last.
pub const SESSION_COOKIE: &str = "session_id";

/// `{"status": "..."}` acknowledgement body.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

impl StatusResponse {
    pub fn new(status: &'static str) -> Self {
        Self { status }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    // ---
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Finds the caller's session id: `X-Session-ID`, then
/// `Authorization: Bearer`, then the `session_id` cookie.
pub fn session_id_from_headers(headers: &HeaderMap) -> Option<String> {
    // ---
    if let Some(id) = header_str(headers, SESSION_HEADER) {
        return Some(id.to_string());
    }

    if let Some(token) = header_str(headers, header::AUTHORIZATION.as_str())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
    {
        return Some(token.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// Resolves the caller's session, failing with `Unauthorized` when there is
/// none or it is no longer valid.
pub async fn require_session(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<SessionInfo, AuthError> {
    // ---
    match optional_session(state, headers).await? {
        Some(info) => Ok(info),
        None => {
            tracing::debug!("Missing or invalid session on authenticated endpoint");
            Err(AuthError::Unauthorized)
        }
    }
}

/// Like [`require_session`] but a missing or stale session is `None`.
/// Storage faults still surface as errors.
pub async fn optional_session(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Option<SessionInfo>, AuthError> {
    // ---
    let Some(session_id) = session_id_from_headers(headers) else {
        return Ok(None);
    };

    match state.validator().validate(&session_id).await {
        Ok(info) => Ok(Some(info)),
        Err(AuthError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

/// `Set-Cookie` value carrying a freshly minted session id.
pub fn session_cookie(session_id: &str, max_age_secs: i64) -> String {
    // ---
    format!(
        "{SESSION_COOKIE}={session_id}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        max_age_secs.max(0)
    )
}

/// `Set-Cookie` value that clears the session cookie.
pub fn cleared_session_cookie() -> String {
    // ---
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

//! WebAuthn credential management handlers.
//!
//! 1. `list_credentials` - List all passkeys for the authenticated user
//! 2. `delete_credential` - Remove a specific passkey (never the last one)

use super::shared_types::{require_session, StatusResponse};
use crate::app_state::AppState;
use crate::error::AuthError;
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Response containing a user's registered credentials.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListCredentialsResponse {
    // ---
    pub username: String,
    pub credentials: Vec<CredentialInfo>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---

/// Information about a registered credential (passkey).
///
/// This is a sanitized view of credential data suitable for display to users.
/// Key material is never exposed.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialInfo {
    // ---
    /// Unpadded base64url credential ID
    pub id: String,
    /// When this credential was registered
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// List Credentials Handler
// ============================================================================

/// GET /user/credentials
pub async fn list_credentials(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ListCredentialsResponse>, AuthError> {
    // ---
    let caller = require_session(&state, &headers).await?;
    let user = state.orchestrator().user(&caller.username).await?;

    let credentials = user
        .credentials
        .iter()
        .map(|c| CredentialInfo {
            id: c.external_id(),
            created_at: c.created_at,
        })
        .collect();

    Ok(Json(ListCredentialsResponse {
        username: user.name,
        credentials,
        created_at: user.created_at,
        updated_at: user.updated_at,
    }))
}

// ============================================================================
// Delete Credential Handler
// ============================================================================

/// DELETE /user/credentials/{id}
///
/// # Errors
/// - 404 if the id is not one of the caller's credentials
/// - 409 if it is the caller's only credential
pub async fn delete_credential(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(credential_id): Path<String>,
) -> Result<Json<StatusResponse>, AuthError> {
    // ---
    let caller = require_session(&state, &headers).await?;

    state
        .orchestrator()
        .delete_credential(&caller.username, &credential_id)
        .await?;

    Ok(Json(StatusResponse::new("deleted")))
}

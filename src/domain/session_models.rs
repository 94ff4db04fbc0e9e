//! Ceremony and authenticated-session records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace prefix that separates authorization codes from session ids
/// inside the session store.
pub const AUTH_CODE_PREFIX: &str = "auth_code:";

/// Ephemeral challenge state for one registration or login ceremony.
///
/// `subject` is the username for registration, or a random correlator for
/// discoverable login. `data` is whatever the ceremony engine needs to
/// finish; it is never interpreted here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CeremonySession {
    // ---
    pub subject: String,
    pub data: serde_json::Value,
    pub expires_at: DateTime<Utc>,
}

impl CeremonySession {
    // ---
    pub fn is_expired(&self) -> bool {
        // ---
        is_past(self.expires_at)
    }
}

/// Client binding stored alongside an authorization code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeGrant {
    // ---
    pub client_id: String,
    pub redirect_uri: String,
    #[serde(default)]
    pub state: String,
}

/// Long-lived post-login session, keyed by an opaque id.
///
/// Authorization codes reuse this shape under an [`AUTH_CODE_PREFIX`]ed id
/// with `grant` populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    // ---
    pub id: String,
    pub username: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant: Option<CodeGrant>,
}

impl Session {
    // ---
    pub fn is_expired(&self) -> bool {
        // ---
        is_past(self.expires_at)
    }

    /// True for records that hold an authorization code rather than a login.
    pub fn is_auth_code(&self) -> bool {
        // ---
        is_auth_code_id(&self.id)
    }
}

pub fn is_auth_code_id(id: &str) -> bool {
    // ---
    id.starts_with(AUTH_CODE_PREFIX)
}

/// Wall-clock expiry check shared by every record type.
pub(crate) fn is_past(expires_at: DateTime<Utc>) -> bool {
    // ---
    Utc::now() > expires_at
}

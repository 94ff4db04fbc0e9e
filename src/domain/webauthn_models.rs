use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Longest username accepted by [`is_valid_username`].
pub const MAX_USERNAME_LEN: usize = 64;

/// Represents a user in the WebAuthn system.
///
/// The whole record, credentials included, is persisted as one document
/// keyed by `name`. The `id` doubles as the WebAuthn user handle and never
/// changes once the user exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    // ---
    pub id: Uuid,
    pub name: String,
    pub display_name: String,
    #[serde(default)]
    pub credentials: Vec<Credential>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    // ---
    pub fn new(name: impl Into<String>) -> Self {
        // ---
        let name = name.into();
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            display_name: name.clone(),
            name,
            credentials: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// True once at least one credential has been registered.
    pub fn has_credentials(&self) -> bool {
        // ---
        !self.credentials.is_empty()
    }
}

/// Represents a WebAuthn credential (passkey) for a user.
///
/// `public_key` is the engine's serialized credential material; this crate
/// treats it as opaque bytes and only ever appends or removes whole records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    // ---
    /// Unique credential ID (from authenticator)
    pub id: Vec<u8>,

    /// Serialized public key material for signature verification
    pub public_key: Vec<u8>,

    /// Signature counter reported at registration
    pub counter: u32,

    /// When this credential was created
    pub created_at: DateTime<Utc>,
}

impl Credential {
    // ---
    pub fn new(id: Vec<u8>, public_key: Vec<u8>, counter: u32) -> Self {
        // ---
        Self {
            id,
            public_key,
            counter,
            created_at: Utc::now(),
        }
    }

    /// Externally visible identifier: unpadded base64url of the raw id.
    pub fn external_id(&self) -> String {
        // ---
        use base64::Engine;
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&self.id)
    }
}

/// Checks that a username is usable as a storage key.
///
/// Accepts 1..=64 characters from `[A-Za-z0-9._@-]`, not starting with a dot.
/// Backends derive file names and object keys from the username, so anything
/// that could traverse a directory is refused here.
pub fn is_valid_username(name: &str) -> bool {
    // ---
    !name.is_empty()
        && name.len() <= MAX_USERNAME_LEN
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '@' | '-'))
}

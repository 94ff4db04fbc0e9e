//! Boundary to the public-key credential verifier.
//!
//! The ceremony engine owns all cryptography. Everything crossing this
//! boundary is opaque JSON: options go to the browser, state goes to the
//! session store, responses come back from the browser.

use super::webauthn_models::{Credential, User};
use crate::error::AuthError;
use std::sync::Arc;
use uuid::Uuid;

/// Output of a `begin_*` call.
#[derive(Debug, Clone)]
pub struct CeremonyStart {
    // ---
    /// Options handed to `navigator.credentials.*()`.
    pub options: serde_json::Value,

    /// Challenge state to persist until the matching `finish_*` call.
    pub state: serde_json::Value,
}

/// Resolves the user behind a discoverable assertion.
///
/// Receives the credential's raw id and the user handle carried in the
/// assertion; must return the user whose `id` equals the handle.
#[async_trait::async_trait]
pub trait UserResolver: Send + Sync {
    // ---
    async fn resolve(&self, raw_id: &[u8], user_handle: &Uuid) -> Result<User, AuthError>;
}

#[async_trait::async_trait]
pub trait CeremonyEngine: Send + Sync {
    // ---
    /// Produce creation options for `user`, excluding credentials it already has.
    fn begin_registration(&self, user: &User) -> Result<CeremonyStart, AuthError>;

    /// Verify an attestation response against stored state.
    fn finish_registration(
        &self,
        user: &User,
        state: &serde_json::Value,
        response: &serde_json::Value,
    ) -> Result<Credential, AuthError>;

    /// Produce assertion options with an empty allow-list.
    fn begin_discoverable_login(&self) -> Result<CeremonyStart, AuthError>;

    /// Verify an assertion, using `resolver` to find the owning user.
    async fn finish_discoverable_login(
        &self,
        state: &serde_json::Value,
        response: &serde_json::Value,
        resolver: &dyn UserResolver,
    ) -> Result<User, AuthError>;
}

/// Type alias for any implementation of CeremonyEngine.
pub type CeremonyEnginePtr = Arc<dyn CeremonyEngine>;

//! `CeremonyEngine` backed by webauthn-rs passkey ceremonies.
//!
//! Ceremony state is serialized to JSON so it can sit in any session
//! backend between the begin and finish requests. Stored credentials keep
//! the serialized `Passkey` as their public-key material.

use crate::domain::{CeremonyEngine, CeremonyStart, Credential, User, UserResolver};
use crate::error::AuthError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use webauthn_rs::prelude::*;

pub struct WebauthnEngine {
    // ---
    webauthn: Arc<Webauthn>,
}

impl WebauthnEngine {
    // ---
    pub fn new(webauthn: Webauthn) -> Self {
        // ---
        Self {
            webauthn: Arc::new(webauthn),
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<serde_json::Value, AuthError> {
    // ---
    serde_json::to_value(value).map_err(AuthError::internal)
}

fn ceremony_state<T: DeserializeOwned>(state: &serde_json::Value) -> Result<T, AuthError> {
    // ---
    serde_json::from_value(state.clone()).map_err(|e| {
        tracing::error!("Failed to deserialize ceremony state: {:?}", e);
        AuthError::internal(e)
    })
}

fn client_response<T: DeserializeOwned>(response: &serde_json::Value) -> Result<T, AuthError> {
    // ---
    serde_json::from_value(response.clone())
        .map_err(|e| AuthError::bad_request(format!("malformed credential response: {e}")))
}

/// Passkeys stored on `user`. Records that fail to deserialize are logged
/// and skipped.
fn passkeys(user: &User) -> Vec<Passkey> {
    // ---
    user.credentials
        .iter()
        .filter_map(|cred| {
            //
            serde_json::from_slice(&cred.public_key)
                .map_err(|e| {
                    tracing::error!(
                        "Failed to deserialize passkey for credential {}: {:?}",
                        cred.external_id(),
                        e
                    );
                })
                .ok()
        })
        .collect()
}

#[async_trait::async_trait]
impl CeremonyEngine for WebauthnEngine {
    // ---
    fn begin_registration(&self, user: &User) -> Result<CeremonyStart, AuthError> {
        // ---
        let exclude: Vec<CredentialID> = passkeys(user)
            .iter()
            .map(|pk| pk.cred_id().clone())
            .collect();
        let exclude = (!exclude.is_empty()).then_some(exclude);

        let (challenge, registration) = self
            .webauthn
            .start_passkey_registration(user.id, &user.name, &user.display_name, exclude)
            .map_err(|e| {
                tracing::error!("Failed to start registration: {}", e);
                AuthError::internal(e)
            })?;

        Ok(CeremonyStart {
            options: to_json(&challenge)?,
            state: to_json(&registration)?,
        })
    }

    fn finish_registration(
        &self,
        user: &User,
        state: &serde_json::Value,
        response: &serde_json::Value,
    ) -> Result<Credential, AuthError> {
        // ---
        let credential: RegisterPublicKeyCredential = client_response(response)?;
        let registration: PasskeyRegistration = ceremony_state(state)?;

        let passkey = self
            .webauthn
            .finish_passkey_registration(&credential, &registration)
            .map_err(|e| {
                tracing::warn!("Credential verification failed for '{}': {}", user.name, e);
                AuthError::ceremony(e)
            })?;

        let public_key = serde_json::to_vec(&passkey).map_err(AuthError::internal)?;
        Ok(Credential::new(passkey.cred_id().to_vec(), public_key, 0))
    }

    fn begin_discoverable_login(&self) -> Result<CeremonyStart, AuthError> {
        // ---
        let (challenge, authentication) =
            self.webauthn.start_discoverable_authentication().map_err(|e| {
                tracing::error!("Failed to generate auth challenge: {:?}", e);
                AuthError::internal(e)
            })?;

        Ok(CeremonyStart {
            options: to_json(&challenge)?,
            state: to_json(&authentication)?,
        })
    }

    async fn finish_discoverable_login(
        &self,
        state: &serde_json::Value,
        response: &serde_json::Value,
        resolver: &dyn UserResolver,
    ) -> Result<User, AuthError> {
        // ---
        let credential: PublicKeyCredential = client_response(response)?;
        let authentication: DiscoverableAuthentication = ceremony_state(state)?;

        let (user_handle, raw_id) = self
            .webauthn
            .identify_discoverable_authentication(&credential)
            .map_err(AuthError::ceremony)?;

        let user = resolver.resolve(raw_id, &user_handle).await?;
        if user.id != user_handle {
            tracing::warn!("Resolved user '{}' does not own the user handle", user.name);
            return Err(AuthError::ceremony("user handle mismatch"));
        }

        let keys: Vec<DiscoverableKey> =
            passkeys(&user).iter().map(DiscoverableKey::from).collect();
        if keys.is_empty() {
            return Err(AuthError::ceremony("no usable credentials for user"));
        }

        self.webauthn
            .finish_discoverable_authentication(&credential, authentication, &keys)
            .map_err(|e| {
                tracing::warn!("Authentication verification failed for '{}': {:?}", user.name, e);
                AuthError::ceremony(e)
            })?;

        Ok(user)
    }
}

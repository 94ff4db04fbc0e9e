//! Credential orchestration: registration and discoverable-login ceremonies.
//!
//! Each ceremony is two independent requests. `begin_*` asks the engine for
//! options and parks the challenge state in session storage; `finish_*`
//! reloads it, lets the engine verify the browser's response and applies
//! the outcome to the user record.

use crate::domain::{
    is_valid_username, CeremonyEnginePtr, CeremonySession, SessionStoragePtr, StorageError, User,
    UserResolver, UserStoragePtr, MAX_USERNAME_LEN,
};
use crate::error::AuthError;
use crate::session::{generate_token, redact, SessionInfo};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace for discoverable-login ceremony keys. Usernames cannot contain
/// `:`, so these never collide with a registration ceremony.
const LOGIN_CEREMONY_PREFIX: &str = "login:";

/// Options for `navigator.credentials.get()` plus the correlator the
/// browser must send back to finish the ceremony.
#[derive(Debug, Clone)]
pub struct DiscoverableLoginStart {
    // ---
    pub options: serde_json::Value,
    pub ceremony_id: String,
}

/// What a registration ceremony parks: the engine's state plus the identity
/// the engine was given, so a user who is not stored yet keeps the same
/// handle through `finish`.
#[derive(Debug, Serialize, Deserialize)]
struct PendingRegistration {
    // ---
    state: serde_json::Value,
    user_id: Uuid,
    created_at: DateTime<Utc>,
}

/// Looks up the user behind a discoverable assertion by immutable id.
struct StorageResolver<'a> {
    // ---
    users: &'a UserStoragePtr,
}

#[async_trait::async_trait]
impl UserResolver for StorageResolver<'_> {
    // ---
    async fn resolve(&self, raw_id: &[u8], user_handle: &Uuid) -> Result<User, AuthError> {
        // ---
        let user = match self.users.get_by_id(user_handle).await {
            Ok(user) => user,
            Err(StorageError::NotFound) => {
                tracing::warn!("Assertion for unknown user handle {}", user_handle);
                return Err(AuthError::not_found("user"));
            }
            Err(e) => return Err(e.into()),
        };

        if !user.credentials.iter().any(|c| c.id == raw_id) {
            tracing::warn!("Assertion credential is not registered to '{}'", user.name);
            return Err(AuthError::ceremony("unknown credential"));
        }
        Ok(user)
    }
}

pub struct CredentialOrchestrator {
    // ---
    users: UserStoragePtr,
    sessions: SessionStoragePtr,
    engine: CeremonyEnginePtr,
    ceremony_ttl: Duration,
}

impl CredentialOrchestrator {
    // ---
    pub fn new(
        users: UserStoragePtr,
        sessions: SessionStoragePtr,
        engine: CeremonyEnginePtr,
        ceremony_ttl: Duration,
    ) -> Self {
        // ---
        Self {
            users,
            sessions,
            engine,
            ceremony_ttl,
        }
    }

    /// Loads the stored user a registration applies to, enforcing the rule
    /// that a user with credentials may only add more from one of their own
    /// sessions. `None` means the username is not taken yet.
    async fn registration_subject(
        &self,
        username: &str,
        caller: Option<&SessionInfo>,
    ) -> Result<Option<User>, AuthError> {
        // ---
        if !is_valid_username(username) {
            return Err(AuthError::bad_request(format!(
                "username must be 1-{MAX_USERNAME_LEN} characters of [A-Za-z0-9._@-]"
            )));
        }

        match self.users.get(username).await {
            Ok(user) if user.has_credentials() => {
                let authenticated = caller.is_some_and(|s| s.username == username);
                if !authenticated {
                    tracing::warn!(
                        "Refusing extra credential for '{}' without a session",
                        username
                    );
                    return Err(AuthError::Conflict(
                        "user already exists - please authenticate first to add additional passkeys"
                            .to_string(),
                    ));
                }
                Ok(Some(user))
            }
            Ok(user) => Ok(Some(user)),
            Err(StorageError::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn park(
        &self,
        key: &str,
        subject: &str,
        state: serde_json::Value,
    ) -> Result<(), AuthError> {
        // ---
        let ceremony = CeremonySession {
            subject: subject.to_string(),
            data: state,
            expires_at: Utc::now() + self.ceremony_ttl,
        };
        self.sessions.save_ceremony(key, &ceremony).await?;
        Ok(())
    }

    async fn reload(&self, key: &str, what: &str) -> Result<CeremonySession, AuthError> {
        // ---
        match self.sessions.get_ceremony(key).await {
            Ok(ceremony) => Ok(ceremony),
            Err(StorageError::NotFound) => Err(AuthError::Expired(what.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Starts registration. Returns the creation options for the browser.
    pub async fn begin_registration(
        &self,
        username: &str,
        caller: Option<&SessionInfo>,
    ) -> Result<serde_json::Value, AuthError> {
        // ---
        let user = match self.registration_subject(username, caller).await? {
            Some(user) => user,
            None => User::new(username),
        };
        let start = self.engine.begin_registration(&user)?;

        let pending = PendingRegistration {
            state: start.state,
            user_id: user.id,
            created_at: user.created_at,
        };
        let data = serde_json::to_value(&pending).map_err(AuthError::internal)?;

        // Replaces any ceremony already outstanding for this username.
        self.park(username, username, data).await?;

        tracing::info!("Registration started for user: {}", username);
        Ok(start.options)
    }

    /// Verifies the attestation and appends the new credential. A first-time
    /// user is written only here, once the engine has accepted the
    /// attestation. The ceremony survives a failed verification so the
    /// browser may retry until it expires.
    pub async fn finish_registration(
        &self,
        username: &str,
        response: &serde_json::Value,
        caller: Option<&SessionInfo>,
    ) -> Result<User, AuthError> {
        // ---
        let ceremony = self.reload(username, "registration ceremony").await?;
        let pending: PendingRegistration =
            serde_json::from_value(ceremony.data).map_err(AuthError::internal)?;

        let mut user = match self.registration_subject(username, caller).await? {
            Some(user) if user.id == pending.user_id => user,
            Some(_) => {
                tracing::warn!("User '{}' was registered during this ceremony", username);
                return Err(AuthError::Conflict(
                    "user already exists - please begin registration again".to_string(),
                ));
            }
            None => User {
                id: pending.user_id,
                created_at: pending.created_at,
                ..User::new(username)
            },
        };

        let credential = self
            .engine
            .finish_registration(&user, &pending.state, response)?;

        let first = !user.has_credentials();
        user.credentials.push(credential);
        user.updated_at = Utc::now();
        self.users.save(&user).await?;
        if first {
            tracing::info!("Created user: {}", username);
        }

        // The credential is stored; a leftover ceremony only lives until it expires.
        if let Err(e) = self.sessions.delete_ceremony(username).await {
            tracing::warn!("Failed to clear registration ceremony for '{}': {}", username, e);
        }

        tracing::info!(
            "Registration completed for user: {} ({} credentials)",
            username,
            user.credentials.len()
        );
        Ok(user)
    }

    /// Starts a login without a username. The returned `ceremony_id` is
    /// random and unrelated to any user.
    pub async fn begin_discoverable_login(&self) -> Result<DiscoverableLoginStart, AuthError> {
        // ---
        let ceremony_id = generate_token();
        let start = self.engine.begin_discoverable_login()?;

        self.park(
            &format!("{LOGIN_CEREMONY_PREFIX}{ceremony_id}"),
            &ceremony_id,
            start.state,
        )
        .await?;

        tracing::debug!("Discoverable login started ({}...)", redact(&ceremony_id));
        Ok(DiscoverableLoginStart {
            options: start.options,
            ceremony_id,
        })
    }

    /// Verifies the assertion and returns the user it belongs to. Minting a
    /// session is left to the caller.
    pub async fn finish_discoverable_login(
        &self,
        ceremony_id: &str,
        response: &serde_json::Value,
    ) -> Result<User, AuthError> {
        // ---
        let key = format!("{LOGIN_CEREMONY_PREFIX}{ceremony_id}");
        let ceremony = self.reload(&key, "login ceremony").await?;

        let resolver = StorageResolver { users: &self.users };
        let user = self
            .engine
            .finish_discoverable_login(&ceremony.data, response, &resolver)
            .await?;

        self.sessions.delete_ceremony(&key).await?;

        tracing::info!("User '{}' authenticated successfully", user.name);
        Ok(user)
    }

    pub async fn user(&self, username: &str) -> Result<User, AuthError> {
        // ---
        match self.users.get(username).await {
            Ok(user) => Ok(user),
            Err(StorageError::NotFound) => Err(AuthError::not_found("user")),
            Err(e) => Err(e.into()),
        }
    }

    /// Removes the credential whose external id is `credential_id`, refusing
    /// to remove the last one.
    pub async fn delete_credential(
        &self,
        username: &str,
        credential_id: &str,
    ) -> Result<User, AuthError> {
        // ---
        let mut user = self.user(username).await?;

        let index = user
            .credentials
            .iter()
            .position(|c| c.external_id() == credential_id)
            .ok_or_else(|| AuthError::not_found("credential"))?;

        if user.credentials.len() == 1 {
            return Err(AuthError::LastCredential);
        }

        user.credentials.remove(index);
        user.updated_at = Utc::now();
        self.users.save(&user).await?;

        tracing::info!("Deleted credential {} for user: {}", credential_id, username);
        Ok(user)
    }
}

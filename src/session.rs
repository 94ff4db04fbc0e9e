//! Session management for authenticated users.
//!
//! Mints, validates and revokes the long-lived sessions created after a
//! successful login. Used by this service's own endpoints and exposed to
//! other services through `GET /validate/{sessionId}`.

use crate::domain::{is_auth_code_id, Session, SessionStoragePtr, StorageError, User};
use crate::error::AuthError;
use chrono::{DateTime, Duration, Utc};
use rand::{rngs::OsRng, RngCore};
use serde::Serialize;
use uuid::Uuid;

// ---

/// Bytes of entropy in every session id, ceremony key and authorization code.
pub const TOKEN_BYTES: usize = 32;

/// Returns a fresh hex-encoded token from the operating system RNG.
pub fn generate_token() -> String {
    // ---
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Shortened id for log lines; full tokens are never logged.
pub(crate) fn redact(token: &str) -> &str {
    // ---
    token.get(..8).unwrap_or(token)
}

// ---

/// Identity behind a valid session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionInfo {
    // ---
    pub session_id: String,
    pub username: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl From<Session> for SessionInfo {
    fn from(session: Session) -> Self {
        // ---
        Self {
            session_id: session.id,
            username: session.username,
            user_id: session.user_id,
            created_at: session.created_at,
            expires_at: session.expires_at,
        }
    }
}

#[derive(Clone)]
pub struct SessionValidator {
    // ---
    sessions: SessionStoragePtr,
    ttl: Duration,
}

impl SessionValidator {
    // ---
    pub fn new(sessions: SessionStoragePtr, ttl: Duration) -> Self {
        // ---
        Self { sessions, ttl }
    }

    /// Creates a new session for `user` and stores it.
    pub async fn create_session(&self, user: &User) -> Result<Session, AuthError> {
        // ---
        let now = Utc::now();
        let session = Session {
            id: generate_token(),
            username: user.name.clone(),
            user_id: user.id,
            created_at: now,
            expires_at: now + self.ttl,
            grant: None,
        };

        self.sessions.save_session(&session).await?;

        tracing::info!(
            "Created session {}... for user: {}",
            redact(&session.id),
            user.name
        );
        Ok(session)
    }

    /// Looks up a session. Absent, expired and authorization-code ids all
    /// report `NotFound`.
    pub async fn validate(&self, session_id: &str) -> Result<SessionInfo, AuthError> {
        // ---
        if session_id.is_empty() || is_auth_code_id(session_id) {
            return Err(AuthError::not_found("session"));
        }

        let session = match self.sessions.get_session(session_id).await {
            Ok(session) => session,
            Err(StorageError::NotFound) => return Err(AuthError::not_found("session")),
            Err(e) => return Err(e.into()),
        };

        // Backends already hide expired records; this covers clock skew
        // between a remote store's TTL and our own timestamps.
        if session.is_expired() {
            return Err(AuthError::not_found("session"));
        }

        Ok(session.into())
    }

    /// Deletes the session. Unknown ids are not an error.
    pub async fn logout(&self, session_id: &str) -> Result<(), AuthError> {
        // ---
        if is_auth_code_id(session_id) {
            return Ok(());
        }

        self.sessions.delete_session(session_id).await?;
        tracing::info!("Session {}... logged out", redact(session_id));
        Ok(())
    }

    /// Live sessions owned by `username`, newest first.
    pub async fn list_for_user(&self, username: &str) -> Result<Vec<Session>, AuthError> {
        // ---
        let mut sessions = self.sessions.list_sessions_for_user(username).await?;
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    /// Deletes `session_id` if, and only if, it belongs to `owner`.
    /// Sessions of other users are reported as `NotFound`.
    pub async fn revoke(&self, owner: &str, session_id: &str) -> Result<(), AuthError> {
        // ---
        let info = self.validate(session_id).await?;
        if info.username != owner {
            tracing::warn!(
                "User '{}' attempted to revoke a session owned by someone else",
                owner
            );
            return Err(AuthError::not_found("session"));
        }

        self.sessions.delete_session(session_id).await?;
        tracing::info!("User '{}' revoked session {}...", owner, redact(session_id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::domain::{SessionStorage, AUTH_CODE_PREFIX};
    use crate::infrastructure::storage::MemoryStorage;
    use std::sync::Arc;

    fn validator() -> (Arc<MemoryStorage>, SessionValidator) {
        // ---
        let storage = Arc::new(MemoryStorage::new());
        let validator = SessionValidator::new(storage.clone(), Duration::hours(24));
        (storage, validator)
    }

    #[test]
    fn tokens_are_256_bit_hex_and_distinct() {
        // ---
        let a = generate_token();
        let b = generate_token();

        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn created_session_validates() {
        // ---
        let (_storage, validator) = validator();
        let user = User::new("alice");

        let session = validator.create_session(&user).await.unwrap();
        let info = validator.validate(&session.id).await.unwrap();

        assert_eq!(info.username, "alice");
        assert_eq!(info.user_id, user.id);
        assert_eq!(info.expires_at, session.created_at + Duration::hours(24));
    }

    #[tokio::test]
    async fn session_past_24_hours_is_rejected() {
        // ---
        let (storage, validator) = validator();
        let created = Utc::now() - Duration::hours(25);
        let stale = Session {
            id: generate_token(),
            username: "alice".to_string(),
            user_id: Uuid::new_v4(),
            created_at: created,
            expires_at: created + Duration::hours(24),
            grant: None,
        };
        storage.save_session(&stale).await.unwrap();

        let err = validator.validate(&stale.id).await.unwrap_err();
        assert!(matches!(err, AuthError::NotFound(_)));
    }

    #[tokio::test]
    async fn authorization_codes_are_not_sessions() {
        // ---
        let (storage, validator) = validator();
        let mut code = validator.create_session(&User::new("alice")).await.unwrap();
        code.id = format!("{AUTH_CODE_PREFIX}{}", generate_token());
        storage.save_session(&code).await.unwrap();

        assert!(matches!(
            validator.validate(&code.id).await,
            Err(AuthError::NotFound(_))
        ));

        // Logging out with a code id leaves the code in place.
        validator.logout(&code.id).await.unwrap();
        assert!(storage.get_session(&code.id).await.is_ok());
    }

    #[tokio::test]
    async fn logout_is_idempotent() {
        // ---
        let (_storage, validator) = validator();
        let session = validator.create_session(&User::new("alice")).await.unwrap();

        validator.logout(&session.id).await.unwrap();
        validator.logout(&session.id).await.unwrap();
        validator.logout("never-existed").await.unwrap();

        assert!(validator.validate(&session.id).await.is_err());
    }

    #[tokio::test]
    async fn revoke_refuses_foreign_sessions() {
        // ---
        let (_storage, validator) = validator();
        let alice = validator.create_session(&User::new("alice")).await.unwrap();
        let bob = validator.create_session(&User::new("bob")).await.unwrap();

        let err = validator.revoke("alice", &bob.id).await.unwrap_err();
        assert!(matches!(err, AuthError::NotFound(_)));
        assert!(validator.validate(&bob.id).await.is_ok());

        validator.revoke("alice", &alice.id).await.unwrap();
        assert!(validator.validate(&alice.id).await.is_err());
    }

    #[tokio::test]
    async fn list_returns_newest_first() {
        // ---
        let (_storage, validator) = validator();
        let user = User::new("alice");
        let first = validator.create_session(&user).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = validator.create_session(&user).await.unwrap();
        validator.create_session(&User::new("bob")).await.unwrap();

        let ids: Vec<String> = validator
            .list_for_user("alice")
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }
}

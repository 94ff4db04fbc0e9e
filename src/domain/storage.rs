use super::session_models::{CeremonySession, Session};
use super::webauthn_models::User;
use std::sync::Arc;
use uuid::Uuid;

/// Failure modes shared by every storage backend.
///
/// `NotFound` is an ordinary outcome (absent, or present but expired);
/// everything else means the backend could not answer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    // ---
    #[error("record not found")]
    NotFound,

    #[error("storage backend unavailable: {0}")]
    Unavailable(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("record rejected: {0}")]
    Rejected(String),
}

impl StorageError {
    // ---
    pub fn unavailable(err: impl std::fmt::Display) -> Self {
        // ---
        Self::Unavailable(err.to_string())
    }

    pub fn is_not_found(&self) -> bool {
        // ---
        matches!(self, Self::NotFound)
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Persistent user records.
///
/// `get_by_id` may be a full scan on backends without a secondary index
/// (filesystem, object store); callers must not assume sub-linear lookup.
#[async_trait::async_trait]
pub trait UserStorage: Send + Sync {
    // ---
    /// Get user by name. Fails with `NotFound` when absent.
    async fn get(&self, name: &str) -> StorageResult<User>;

    /// Get user by immutable id. Fails with `NotFound` when absent.
    async fn get_by_id(&self, id: &Uuid) -> StorageResult<User>;

    /// Create or overwrite the whole record for `user.name`.
    async fn save(&self, user: &User) -> StorageResult<()>;

    async fn exists(&self, name: &str) -> StorageResult<bool>;

    /// Connectivity check used by the full health check.
    async fn ping(&self) -> StorageResult<()> {
        // ---
        Ok(())
    }
}

/// Ceremony challenges and authenticated sessions.
///
/// Reads treat a record past its expiry as absent, whether or not the
/// backend has physically purged it yet.
#[async_trait::async_trait]
pub trait SessionStorage: Send + Sync {
    // ---
    /// Store a ceremony under `key`, replacing any outstanding one.
    async fn save_ceremony(&self, key: &str, session: &CeremonySession) -> StorageResult<()>;

    async fn get_ceremony(&self, key: &str) -> StorageResult<CeremonySession>;

    async fn delete_ceremony(&self, key: &str) -> StorageResult<()>;

    async fn save_session(&self, session: &Session) -> StorageResult<()>;

    async fn get_session(&self, id: &str) -> StorageResult<Session>;

    /// Atomically load and remove a session. Of any number of concurrent
    /// callers for the same id, at most one receives the record.
    async fn take_session(&self, id: &str) -> StorageResult<Session>;

    /// Idempotent: deleting an absent id succeeds.
    async fn delete_session(&self, id: &str) -> StorageResult<()>;

    /// Unexpired login sessions owned by `username`. This is a scan over all
    /// session keys and excludes authorization-code records.
    async fn list_sessions_for_user(&self, username: &str) -> StorageResult<Vec<Session>>;

    async fn ping(&self) -> StorageResult<()> {
        // ---
        Ok(())
    }
}

/// Type alias for any backend that implements UserStorage.
pub type UserStoragePtr = Arc<dyn UserStorage>;

/// Type alias for any backend that implements SessionStorage.
pub type SessionStoragePtr = Arc<dyn SessionStorage>;

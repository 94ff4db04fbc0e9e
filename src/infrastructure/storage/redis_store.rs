//! Redis-backed session storage.
//!
//! Every write uses the record's expiry as the key's native TTL, so expired
//! entries vanish without a sweep. Reads still re-check the timestamp.

use crate::domain::{
    is_auth_code_id, CeremonySession, Session, SessionStorage, StorageError, StorageResult,
    AUTH_CODE_PREFIX,
};
use chrono::{DateTime, Utc};
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};

const CEREMONY_NAMESPACE: &str = "webauthn_session:";
const SESSION_NAMESPACE: &str = "session:";

fn ceremony_key(key: &str) -> String {
    // ---
    format!("{CEREMONY_NAMESPACE}{key}")
}

fn session_key(id: &str) -> String {
    // ---
    format!("{SESSION_NAMESPACE}{id}")
}

/// Remaining lifetime in whole seconds, rounded up. Refuses records that
/// are already past their expiry.
fn ttl_seconds(expires_at: DateTime<Utc>) -> StorageResult<u64> {
    // ---
    let millis = (expires_at - Utc::now()).num_milliseconds();
    if millis <= 0 {
        return Err(StorageError::Rejected("record already expired".to_string()));
    }
    Ok((millis as u64).div_ceil(1000))
}

pub struct RedisSessionStorage {
    // ---
    client: Client,
}

impl RedisSessionStorage {
    // ---
    pub fn new(client: Client) -> Self {
        // ---
        Self { client }
    }

    /// Creates a new multiplexed Redis connection.
    async fn get_conn(&self) -> StorageResult<MultiplexedConnection> {
        // ---
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|err| {
                tracing::error!("Failed to connect to Redis: {:?}", err);
                StorageError::unavailable(err)
            })
    }

    async fn load_session(
        conn: &mut MultiplexedConnection,
        key: &str,
    ) -> StorageResult<Option<Session>> {
        // ---
        let data: Option<String> = conn.get(key).await.map_err(StorageError::unavailable)?;
        match data {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}

#[async_trait::async_trait]
impl SessionStorage for RedisSessionStorage {
    // ---
    async fn save_ceremony(&self, key: &str, session: &CeremonySession) -> StorageResult<()> {
        // ---
        let ttl = ttl_seconds(session.expires_at)?;
        let json = serde_json::to_string(session)?;
        let mut conn = self.get_conn().await?;

        conn.set_ex::<_, _, ()>(ceremony_key(key), json, ttl)
            .await
            .map_err(StorageError::unavailable)
    }

    async fn get_ceremony(&self, key: &str) -> StorageResult<CeremonySession> {
        // ---
        let mut conn = self.get_conn().await?;
        let data: Option<String> = conn
            .get(ceremony_key(key))
            .await
            .map_err(StorageError::unavailable)?;

        let session: CeremonySession = serde_json::from_str(&data.ok_or(StorageError::NotFound)?)?;
        if session.is_expired() {
            return Err(StorageError::NotFound);
        }
        Ok(session)
    }

    async fn delete_ceremony(&self, key: &str) -> StorageResult<()> {
        // ---
        let mut conn = self.get_conn().await?;
        conn.del::<_, ()>(ceremony_key(key))
            .await
            .map_err(StorageError::unavailable)
    }

    async fn save_session(&self, session: &Session) -> StorageResult<()> {
        // ---
        let ttl = ttl_seconds(session.expires_at)?;
        let json = serde_json::to_string(session)?;
        let mut conn = self.get_conn().await?;

        conn.set_ex::<_, _, ()>(session_key(&session.id), json, ttl)
            .await
            .map_err(StorageError::unavailable)
    }

    async fn get_session(&self, id: &str) -> StorageResult<Session> {
        // ---
        let key = session_key(id);
        let mut conn = self.get_conn().await?;

        let session = Self::load_session(&mut conn, &key)
            .await?
            .ok_or(StorageError::NotFound)?;

        if session.is_expired() {
            let _: Result<(), _> = conn.del(&key).await;
            return Err(StorageError::NotFound);
        }
        Ok(session)
    }

    async fn take_session(&self, id: &str) -> StorageResult<Session> {
        // ---
        let mut conn = self.get_conn().await?;

        // GETDEL: consumed in one round trip, never fetched then deleted.
        let data: Option<String> = conn
            .get_del(session_key(id))
            .await
            .map_err(StorageError::unavailable)?;

        let session: Session = serde_json::from_str(&data.ok_or(StorageError::NotFound)?)?;
        if session.is_expired() {
            return Err(StorageError::NotFound);
        }
        Ok(session)
    }

    async fn delete_session(&self, id: &str) -> StorageResult<()> {
        // ---
        let mut conn = self.get_conn().await?;
        conn.del::<_, ()>(session_key(id))
            .await
            .map_err(StorageError::unavailable)
    }

    async fn list_sessions_for_user(&self, username: &str) -> StorageResult<Vec<Session>> {
        // ---
        let mut conn = self.get_conn().await?;
        let keys: Vec<String> = conn
            .keys(format!("{SESSION_NAMESPACE}*"))
            .await
            .map_err(StorageError::unavailable)?;

        let code_namespace = session_key(AUTH_CODE_PREFIX);
        let mut sessions = Vec::new();

        for key in keys.iter().filter(|k| !k.starts_with(&code_namespace)) {
            // Deleted between KEYS and GET, or not ours to parse.
            let session = match Self::load_session(&mut conn, key).await {
                Ok(Some(session)) => session,
                Ok(None) => continue,
                Err(StorageError::Unavailable(e)) => return Err(StorageError::Unavailable(e)),
                Err(e) => {
                    tracing::warn!("Skipping malformed session record {}: {}", key, e);
                    continue;
                }
            };

            if session.username == username
                && !session.is_expired()
                && !is_auth_code_id(&session.id)
            {
                sessions.push(session);
            }
        }

        Ok(sessions)
    }

    async fn ping(&self) -> StorageResult<()> {
        // ---
        let mut conn = self.get_conn().await?;
        let _: String = conn.ping().await.map_err(StorageError::unavailable)?;
        Ok(())
    }
}

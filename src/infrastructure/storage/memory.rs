//! In-memory storage for users, ceremonies and sessions.
//!
//! All maps sit behind one lock. Reads that may evict an expired record take
//! the write side so the expiry check and the removal happen in the same
//! critical section. A background sweeper purges whatever nobody reads.

use crate::domain::{
    is_past, CeremonySession, Session, SessionStorage, StorageError, StorageResult, User,
    UserStorage,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

#[derive(Default)]
struct Maps {
    // ---
    users: HashMap<String, User>,
    ceremonies: HashMap<String, CeremonySession>,
    sessions: HashMap<String, Session>,
}

/// Process-local backend. Implements both storage capabilities.
#[derive(Default)]
pub struct MemoryStorage {
    // ---
    maps: RwLock<Maps>,
}

impl MemoryStorage {
    // ---
    pub fn new() -> Self {
        // ---
        Self::default()
    }

    /// Remove every expired ceremony and session. Returns how many were purged.
    pub async fn sweep_expired(&self) -> usize {
        // ---
        let mut maps = self.maps.write().await;
        let before = maps.ceremonies.len() + maps.sessions.len();

        maps.ceremonies.retain(|_, c| !c.is_expired());
        maps.sessions.retain(|_, s| !s.is_expired());

        before - (maps.ceremonies.len() + maps.sessions.len())
    }

    /// Spawn the periodic sweep. The task runs until the returned handle is
    /// stopped or dropped.
    pub fn start_sweeper(self: &Arc<Self>, every: Duration) -> SweepHandle {
        // ---
        let storage = Arc::clone(self);
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            // ---
            let mut ticker = tokio::time::interval(every);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let purged = storage.sweep_expired().await;
                        if purged > 0 {
                            tracing::debug!("Swept {} expired session records", purged);
                        }
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!("Session sweeper stopped");
        });

        tracing::info!("Started in-memory session sweeper (every {:?})", every);
        SweepHandle {
            stop: stop_tx,
            task,
        }
    }
}

/// Owner of the background sweep task.
pub struct SweepHandle {
    // ---
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweepHandle {
    // ---
    /// Signal the sweeper and wait for it to exit.
    pub async fn stop(self) {
        // ---
        let _ = self.stop.send(true);
        if let Err(e) = self.task.await {
            tracing::warn!("Session sweeper ended abnormally: {}", e);
        }
    }
}

#[async_trait::async_trait]
impl UserStorage for MemoryStorage {
    // ---
    async fn get(&self, name: &str) -> StorageResult<User> {
        // ---
        let maps = self.maps.read().await;
        maps.users.get(name).cloned().ok_or(StorageError::NotFound)
    }

    async fn get_by_id(&self, id: &Uuid) -> StorageResult<User> {
        // ---
        let maps = self.maps.read().await;
        maps.users
            .values()
            .find(|u| u.id == *id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn save(&self, user: &User) -> StorageResult<()> {
        // ---
        let mut maps = self.maps.write().await;
        maps.users.insert(user.name.clone(), user.clone());
        Ok(())
    }

    async fn exists(&self, name: &str) -> StorageResult<bool> {
        // ---
        Ok(self.maps.read().await.users.contains_key(name))
    }
}

#[async_trait::async_trait]
impl SessionStorage for MemoryStorage {
    // ---
    async fn save_ceremony(&self, key: &str, session: &CeremonySession) -> StorageResult<()> {
        // ---
        let mut maps = self.maps.write().await;
        maps.ceremonies.insert(key.to_string(), session.clone());
        Ok(())
    }

    async fn get_ceremony(&self, key: &str) -> StorageResult<CeremonySession> {
        // ---
        let mut maps = self.maps.write().await;
        match maps.ceremonies.get(key) {
            Some(c) if is_past(c.expires_at) => {
                maps.ceremonies.remove(key);
                Err(StorageError::NotFound)
            }
            Some(c) => Ok(c.clone()),
            None => Err(StorageError::NotFound),
        }
    }

    async fn delete_ceremony(&self, key: &str) -> StorageResult<()> {
        // ---
        self.maps.write().await.ceremonies.remove(key);
        Ok(())
    }

    async fn save_session(&self, session: &Session) -> StorageResult<()> {
        // ---
        let mut maps = self.maps.write().await;
        maps.sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn get_session(&self, id: &str) -> StorageResult<Session> {
        // ---
        let mut maps = self.maps.write().await;
        match maps.sessions.get(id) {
            Some(s) if s.is_expired() => {
                maps.sessions.remove(id);
                Err(StorageError::NotFound)
            }
            Some(s) => Ok(s.clone()),
            None => Err(StorageError::NotFound),
        }
    }

    async fn take_session(&self, id: &str) -> StorageResult<Session> {
        // ---
        let mut maps = self.maps.write().await;
        match maps.sessions.remove(id) {
            Some(s) if !s.is_expired() => Ok(s),
            _ => Err(StorageError::NotFound),
        }
    }

    async fn delete_session(&self, id: &str) -> StorageResult<()> {
        // ---
        self.maps.write().await.sessions.remove(id);
        Ok(())
    }

    async fn list_sessions_for_user(&self, username: &str) -> StorageResult<Vec<Session>> {
        // ---
        let maps = self.maps.read().await;
        Ok(maps
            .sessions
            .values()
            .filter(|s| s.username == username && !s.is_expired() && !s.is_auth_code())
            .cloned()
            .collect())
    }
}

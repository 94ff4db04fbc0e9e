//! One JSON document per user under `<root>/users/<name>.json`.
//!
//! There is no file locking: concurrent writers to the same username race
//! and the last write wins.

use crate::domain::{is_valid_username, StorageError, StorageResult, User, UserStorage};
use anyhow::{Context, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub struct FilesystemUserStorage {
    // ---
    users_dir: PathBuf,
}

impl FilesystemUserStorage {
    // ---
    /// Creates `<base>/users` if needed.
    pub async fn new(base: impl AsRef<Path>) -> Result<Self> {
        // ---
        let users_dir = base.as_ref().join("users");
        tokio::fs::create_dir_all(&users_dir)
            .await
            .with_context(|| format!("failed to create users path {}", users_dir.display()))?;

        tracing::info!("Using filesystem user storage at {}", users_dir.display());
        Ok(Self { users_dir })
    }

    fn user_path(&self, name: &str) -> StorageResult<PathBuf> {
        // ---
        if !is_valid_username(name) {
            return Err(StorageError::Rejected(format!("invalid username: {name:?}")));
        }
        Ok(self.users_dir.join(format!("{name}.json")))
    }

    async fn read_user(path: &Path) -> StorageResult<User> {
        // ---
        match tokio::fs::read(path).await {
            Ok(data) => Ok(serde_json::from_slice(&data)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::NotFound),
            Err(e) => Err(StorageError::unavailable(format!(
                "failed to read {}: {e}",
                path.display()
            ))),
        }
    }
}

#[async_trait::async_trait]
impl UserStorage for FilesystemUserStorage {
    // ---
    async fn get(&self, name: &str) -> StorageResult<User> {
        // ---
        let path = match self.user_path(name) {
            Ok(path) => path,
            // A name that cannot be stored cannot exist either.
            Err(StorageError::Rejected(_)) => return Err(StorageError::NotFound),
            Err(e) => return Err(e),
        };
        Self::read_user(&path).await
    }

    async fn get_by_id(&self, id: &Uuid) -> StorageResult<User> {
        // ---
        let mut entries = tokio::fs::read_dir(&self.users_dir)
            .await
            .map_err(StorageError::unavailable)?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(StorageError::unavailable)?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            match Self::read_user(&path).await {
                Ok(user) if user.id == *id => return Ok(user),
                Ok(_) => {}
                // Removed since the directory was read.
                Err(StorageError::NotFound) => {}
                Err(StorageError::Serialization(e)) => {
                    tracing::warn!("Skipping malformed user file {}: {}", path.display(), e)
                }
                Err(e) => return Err(e),
            }
        }

        Err(StorageError::NotFound)
    }

    async fn save(&self, user: &User) -> StorageResult<()> {
        // ---
        let path = self.user_path(&user.name)?;
        let data = serde_json::to_vec_pretty(user)?;

        tokio::fs::write(&path, data).await.map_err(|e| {
            StorageError::unavailable(format!("failed to write {}: {e}", path.display()))
        })
    }

    async fn exists(&self, name: &str) -> StorageResult<bool> {
        // ---
        let Ok(path) = self.user_path(name) else {
            return Ok(false);
        };

        match tokio::fs::metadata(&path).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::unavailable(e)),
        }
    }

    async fn ping(&self) -> StorageResult<()> {
        // ---
        tokio::fs::metadata(&self.users_dir)
            .await
            .map(|_| ())
            .map_err(StorageError::unavailable)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::domain::Credential;

    async fn storage() -> (tempfile::TempDir, FilesystemUserStorage) {
        // ---
        let dir = tempfile::tempdir().unwrap();
        let storage = FilesystemUserStorage::new(dir.path()).await.unwrap();
        (dir, storage)
    }

    #[tokio::test]
    async fn saves_one_file_per_user() {
        // ---
        let (dir, storage) = storage().await;
        let mut user = User::new("alice");
        user.credentials.push(Credential::new(vec![1, 2, 3], b"pk".to_vec(), 0));

        storage.save(&user).await.unwrap();

        assert!(dir.path().join("users").join("alice.json").is_file());
        assert!(storage.exists("alice").await.unwrap());
        assert_eq!(storage.get("alice").await.unwrap(), user);
    }

    #[tokio::test]
    async fn missing_user_is_not_found() {
        // ---
        let (_dir, storage) = storage().await;

        assert!(storage.get("nobody").await.unwrap_err().is_not_found());
        assert!(!storage.exists("nobody").await.unwrap());
    }

    #[tokio::test]
    async fn get_by_id_scans_and_skips_junk() {
        // ---
        let (dir, storage) = storage().await;
        let alice = User::new("alice");
        let bob = User::new("bob");
        storage.save(&alice).await.unwrap();
        storage.save(&bob).await.unwrap();
        std::fs::write(dir.path().join("users").join("broken.json"), b"{not json").unwrap();
        std::fs::write(dir.path().join("users").join("notes.txt"), b"ignored").unwrap();

        assert_eq!(storage.get_by_id(&bob.id).await.unwrap().name, "bob");
        assert!(storage
            .get_by_id(&Uuid::new_v4())
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn get_by_id_reports_unreadable_files() {
        // ---
        let (dir, storage) = storage().await;
        storage.save(&User::new("alice")).await.unwrap();
        std::fs::create_dir(dir.path().join("users").join("bob.json")).unwrap();

        let err = storage.get_by_id(&Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, StorageError::Unavailable(_)), "{err:?}");
    }

    #[tokio::test]
    async fn later_save_overwrites() {
        // ---
        let (_dir, storage) = storage().await;
        let mut user = User::new("alice");
        storage.save(&user).await.unwrap();

        user.display_name = "Alice A.".to_string();
        storage.save(&user).await.unwrap();

        assert_eq!(storage.get("alice").await.unwrap().display_name, "Alice A.");
    }

    #[tokio::test]
    async fn traversal_names_are_refused() {
        // ---
        let (_dir, storage) = storage().await;
        let user = User::new("../escape");

        assert!(matches!(
            storage.save(&user).await,
            Err(StorageError::Rejected(_))
        ));
        assert!(storage.get("../escape").await.unwrap_err().is_not_found());
        assert!(!storage.exists("../escape").await.unwrap());
    }
}

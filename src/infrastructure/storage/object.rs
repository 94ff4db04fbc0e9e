//! One JSON object per user, keyed `<prefix>/<name>.json`, in any
//! `object_store` backend (S3 and compatibles in production).

use crate::domain::{is_valid_username, StorageError, StorageResult, User, UserStorage};
use anyhow::Result;
use futures::TryStreamExt;
use object_store::{aws::AmazonS3Builder, path::Path, ObjectStore, PutPayload};
use std::sync::Arc;
use uuid::Uuid;

/// Key prefix under which user documents live.
pub const USERS_PREFIX: &str = "users";

pub struct ObjectStoreUserStorage {
    // ---
    store: Arc<dyn ObjectStore>,
    prefix: Path,
}

/// Connection settings for an S3-compatible endpoint.
#[derive(Debug, Clone)]
pub struct S3Settings {
    // ---
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    pub use_ssl: bool,
}

impl ObjectStoreUserStorage {
    // ---
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        // ---
        Self {
            store,
            prefix: Path::from(USERS_PREFIX),
        }
    }

    /// Builds a client for an S3-compatible endpoint (AWS, MinIO, ...).
    pub fn s3(settings: &S3Settings) -> Result<Self> {
        // ---
        let store = AmazonS3Builder::new()
            .with_endpoint(&settings.endpoint)
            .with_bucket_name(&settings.bucket)
            .with_access_key_id(&settings.access_key)
            .with_secret_access_key(&settings.secret_key)
            .with_region(&settings.region)
            .with_allow_http(!settings.use_ssl)
            .build()?;

        tracing::info!(
            "Using object-store user storage at {} (bucket {})",
            settings.endpoint,
            settings.bucket
        );
        Ok(Self::new(Arc::new(store)))
    }

    fn user_key(&self, name: &str) -> StorageResult<Path> {
        // ---
        if !is_valid_username(name) {
            return Err(StorageError::Rejected(format!("invalid username: {name:?}")));
        }
        Ok(self.prefix.child(format!("{name}.json")))
    }

    async fn read_user(&self, key: &Path) -> StorageResult<User> {
        // ---
        let result = self.store.get(key).await.map_err(map_store_error)?;
        let data = result.bytes().await.map_err(map_store_error)?;
        Ok(serde_json::from_slice(&data)?)
    }
}

fn map_store_error(err: object_store::Error) -> StorageError {
    // ---
    match err {
        object_store::Error::NotFound { .. } => StorageError::NotFound,
        other => StorageError::unavailable(other),
    }
}

#[async_trait::async_trait]
impl UserStorage for ObjectStoreUserStorage {
    // ---
    async fn get(&self, name: &str) -> StorageResult<User> {
        // ---
        let Ok(key) = self.user_key(name) else {
            return Err(StorageError::NotFound);
        };
        self.read_user(&key).await
    }

    async fn get_by_id(&self, id: &Uuid) -> StorageResult<User> {
        // ---
        let objects: Vec<_> = self
            .store
            .list(Some(&self.prefix))
            .try_collect()
            .await
            .map_err(map_store_error)?;

        for meta in objects {
            if meta.location.extension() != Some("json") {
                continue;
            }

            match self.read_user(&meta.location).await {
                Ok(user) if user.id == *id => return Ok(user),
                Ok(_) => {}
                // Removed since the listing.
                Err(StorageError::NotFound) => {}
                Err(StorageError::Serialization(e)) => {
                    tracing::warn!("Skipping malformed user object {}: {}", meta.location, e)
                }
                Err(e) => return Err(e),
            }
        }

        Err(StorageError::NotFound)
    }

    async fn save(&self, user: &User) -> StorageResult<()> {
        // ---
        let key = self.user_key(&user.name)?;
        let data = serde_json::to_vec(user)?;

        self.store
            .put(&key, PutPayload::from(data))
            .await
            .map(|_| ())
            .map_err(map_store_error)
    }

    async fn exists(&self, name: &str) -> StorageResult<bool> {
        // ---
        let Ok(key) = self.user_key(name) else {
            return Ok(false);
        };

        match self.store.head(&key).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::unavailable(e)),
        }
    }

    async fn ping(&self) -> StorageResult<()> {
        // ---
        self.store
            .list_with_delimiter(Some(&self.prefix))
            .await
            .map(|_| ())
            .map_err(map_store_error)
    }
}

// SPDX-License-Identifier: MIT

//! Optional cloud sync for session snapshots (§4.5, §6.5
//! `ASH_SNAPSHOT_URL`). Backed by `object_store` so `file://`, `s3://`, and
//! `gs://` schemes share one implementation.

use crate::StorageError;
use async_trait::async_trait;
use object_store::path::Path as ObjectPath;
use object_store::{local::LocalFileSystem, ObjectStore};
use std::path::Path;
use std::sync::Arc;
use url::Url;

/// Uniform surface for snapshot cloud sync: upload a session's bundle,
/// download it back, or check presence without fetching bytes.
#[async_trait]
pub trait CloudStore: Send + Sync {
    async fn upload(&self, session_id: &str, bytes: Vec<u8>) -> Result<(), StorageError>;
    async fn download(&self, session_id: &str) -> Result<Option<Vec<u8>>, StorageError>;
}

fn object_key(session_id: &str) -> ObjectPath {
    ObjectPath::from(format!("sessions/{session_id}/workspace.tar.gz"))
}

/// `object_store`-backed implementation; covers `s3://` and `gs://` via the
/// crate's `aws`/`gcp` features, constructed from a parsed `ASH_SNAPSHOT_URL`.
pub struct ObjectStoreCloud {
    store: Arc<dyn ObjectStore>,
}

impl ObjectStoreCloud {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CloudStore for ObjectStoreCloud {
    async fn upload(&self, session_id: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        self.store
            .put(&object_key(session_id), bytes.into())
            .await
            .map_err(StorageError::Cloud)?;
        Ok(())
    }

    async fn download(&self, session_id: &str) -> Result<Option<Vec<u8>>, StorageError> {
        match self.store.get(&object_key(session_id)).await {
            Ok(result) => {
                let bytes = result.bytes().await.map_err(StorageError::Cloud)?;
                Ok(Some(bytes.to_vec()))
            }
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(err) => Err(StorageError::Cloud(err)),
        }
    }
}

/// A plain local-filesystem `CloudStore`, used for `file://` snapshot URLs
/// and in tests in lieu of a real bucket.
pub struct FileCloudStore {
    inner: ObjectStoreCloud,
}

impl FileCloudStore {
    pub fn new(root: &Path) -> Result<Self, StorageError> {
        std::fs::create_dir_all(root)?;
        let fs = LocalFileSystem::new_with_prefix(root).map_err(StorageError::Cloud)?;
        Ok(Self { inner: ObjectStoreCloud::new(Arc::new(fs)) })
    }
}

#[async_trait]
impl CloudStore for FileCloudStore {
    async fn upload(&self, session_id: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        self.inner.upload(session_id, bytes).await
    }

    async fn download(&self, session_id: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.inner.download(session_id).await
    }
}

/// Parse `ASH_SNAPSHOT_URL` (`file://|s3://|gs://`) into a constructed
/// [`CloudStore`]. Returns `None` for an unset/empty URL (cloud sync
/// disabled, the common case).
pub fn parse_snapshot_url(url: Option<&str>) -> Result<Option<Arc<dyn CloudStore>>, StorageError> {
    let Some(raw) = url.filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    let parsed = Url::parse(raw).map_err(|_| StorageError::InvalidUrl(raw.to_string()))?;
    match parsed.scheme() {
        "file" => {
            let path = Path::new(parsed.path());
            Ok(Some(Arc::new(FileCloudStore::new(path)?)))
        }
        "s3" | "gs" => {
            let (store, _path) =
                object_store::parse_url(&parsed).map_err(|_| StorageError::InvalidUrl(raw.to_string()))?;
            Ok(Some(Arc::new(ObjectStoreCloud::new(Arc::from(store)))))
        }
        other => Err(StorageError::InvalidUrl(format!("unsupported scheme {other:?} in {raw:?}"))),
    }
}

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use futures::TryStreamExt;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::{path::Path as ObjPath, ObjectStore};
use thiserror::Error;

use crate::utils::config::{AppConfig, StorageKind};

pub type DynStore = Arc<dyn ObjectStore>;

/// Errors raised while reading the documents directory.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Invalid document name: {0}")]
    InvalidName(String),
    #[error("Document not found: {0}")]
    NotFound(String),
    #[error("Storage backend error: {0}")]
    Backend(#[from] object_store::Error),
}

/// Access to the documents directory holding files awaiting ingestion.
#[derive(Clone)]
pub struct StorageManager {
    store: DynStore,
    backend_kind: StorageKind,
    local_base: Option<PathBuf>,
}

impl StorageManager {
    /// Create a new StorageManager for the configured documents directory.
    ///
    /// The local backend creates the directory if it does not exist yet, so a
    /// fresh deployment starts with an empty (not missing) documents dir.
    pub async fn new(cfg: &AppConfig) -> Result<Self, StoreError> {
        let backend_kind = cfg.storage.clone();
        let (store, local_base) = create_storage_backend(cfg).await?;

        Ok(Self {
            store,
            backend_kind,
            local_base,
        })
    }

    /// Create a StorageManager with a custom storage backend.
    ///
    /// This method is useful for testing scenarios where you want to inject
    /// a specific storage backend.
    pub fn with_backend(store: DynStore, backend_kind: StorageKind) -> Self {
        Self {
            store,
            backend_kind,
            local_base: None,
        }
    }

    /// In-memory storage manager for tests.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn memory() -> Self {
        Self::with_backend(Arc::new(InMemory::new()), StorageKind::Memory)
    }

    /// Get the storage backend kind.
    pub fn backend_kind(&self) -> &StorageKind {
        &self.backend_kind
    }

    /// Access the resolved local base directory when using the local backend.
    pub fn local_base_path(&self) -> Option<&Path> {
        self.local_base.as_deref()
    }

    /// List the names of every file in the documents directory, sorted so that
    /// ingestion order is stable across runs. Subdirectories are walked too;
    /// their entries come back as `"sub/dir/file.ext"`.
    pub async fn list_file_names(&self) -> Result<Vec<String>, StoreError> {
        let metas: Vec<object_store::ObjectMeta> = self.store.list(None).try_collect().await?;

        let mut names: Vec<String> = metas
            .into_iter()
            .map(|meta| meta.location.to_string())
            .collect();
        names.sort();

        Ok(names)
    }

    /// Store bytes at the specified location.
    pub async fn put(&self, location: &str, data: Bytes) -> Result<(), StoreError> {
        validate_file_name(location)?;
        let path = ObjPath::from(location);
        let payload = object_store::PutPayload::from_bytes(data);
        self.store.put(&path, payload).await.map(|_| ())?;
        Ok(())
    }

    /// Retrieve the full contents of one document, buffered in memory.
    pub async fn get(&self, location: &str) -> Result<Bytes, StoreError> {
        validate_file_name(location)?;
        let path = ObjPath::from(location);
        let result = self.store.get(&path).await.map_err(|err| match err {
            object_store::Error::NotFound { .. } => StoreError::NotFound(location.to_string()),
            other => StoreError::Backend(other),
        })?;

        Ok(result.bytes().await?)
    }
}

/// Reject names that would escape the documents directory. Relative paths into
/// subdirectories are fine; parent traversals and absolute paths are not.
fn validate_file_name(name: &str) -> Result<(), StoreError> {
    if name.is_empty() {
        return Err(StoreError::InvalidName("empty name".to_string()));
    }

    let path = Path::new(name);
    if path.is_absolute()
        || path
            .components()
            .any(|component| matches!(component, Component::ParentDir | Component::Prefix(_)))
    {
        return Err(StoreError::InvalidName(name.to_string()));
    }

    Ok(())
}

/// Create a storage backend based on configuration.
async fn create_storage_backend(
    cfg: &AppConfig,
) -> Result<(DynStore, Option<PathBuf>), StoreError> {
    match cfg.storage {
        StorageKind::Local => {
            let base = resolve_base_dir(cfg);
            if !base.exists() {
                tokio::fs::create_dir_all(&base).await.map_err(|e| {
                    object_store::Error::Generic {
                        store: "LocalFileSystem",
                        source: e.into(),
                    }
                })?;
            }
            let store = LocalFileSystem::new_with_prefix(base.clone())
                .map_err(StoreError::Backend)?;
            Ok((Arc::new(store), Some(base)))
        }
        StorageKind::Memory => {
            let store = InMemory::new();
            Ok((Arc::new(store), None))
        }
    }
}

/// Resolve the absolute documents directory from config.
///
/// If `documents_dir` is relative, it is resolved against the current working directory.
fn resolve_base_dir(cfg: &AppConfig) -> PathBuf {
    if cfg.documents_dir.starts_with('/') {
        PathBuf::from(&cfg.documents_dir)
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(&cfg.documents_dir)
    }
}

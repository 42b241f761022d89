//! Object store collaborator. The contract is a single `put` returning a
//! stable, publicly fetchable URL; certificate issuance depends on the URL
//! existing before any Certificate row is written.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object store write failed: {0}")]
    WriteFailed(String),
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(
        &self,
        bytes: Vec<u8>,
        content_type: &str,
        name_hint: &str,
    ) -> Result<String, StorageError>;
}

/// Writes under a directory served statically (see bootstrap's `/files`
/// route) and returns `public_base_url/<name>`.
pub struct LocalObjectStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalObjectStore {
    pub fn new(root: PathBuf, public_base_url: impl Into<String>) -> Self {
        Self { root, public_base_url: public_base_url.into().trim_end_matches('/').to_string() }
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(
        &self,
        bytes: Vec<u8>,
        content_type: &str,
        name_hint: &str,
    ) -> Result<String, StorageError> {
        let name = format!("{name_hint}-{}.{}", Uuid::new_v4(), extension_for(content_type));
        let path = self.root.join(&name);

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|error| StorageError::WriteFailed(error.to_string()))?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|error| StorageError::WriteFailed(error.to_string()))?;

        Ok(format!("{}/{name}", self.public_base_url))
    }
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/svg+xml" => "svg",
        "image/png" => "png",
        "application/pdf" => "pdf",
        _ => "bin",
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    pub url: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Test double: records every put and can be told to fail to exercise the
/// upload-before-insert failure path.
#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: RwLock<Vec<StoredObject>>,
    fail_next: AtomicBool,
}

impl InMemoryObjectStore {
    pub fn fail_next_put(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub async fn objects(&self) -> Vec<StoredObject> {
        self.objects.read().await.clone()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put(
        &self,
        bytes: Vec<u8>,
        content_type: &str,
        name_hint: &str,
    ) -> Result<String, StorageError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(StorageError::WriteFailed("simulated outage".to_string()));
        }

        let url = format!("https://files.test/{name_hint}-{}", Uuid::new_v4());
        let mut objects = self.objects.write().await;
        objects.push(StoredObject { url: url.clone(), content_type: content_type.to_string(), bytes });
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::{InMemoryObjectStore, LocalObjectStore, ObjectStore};

    #[tokio::test]
    async fn local_store_returns_public_urls_under_base() {
        let dir = std::env::temp_dir().join(format!("acadia-store-{}", uuid::Uuid::new_v4()));
        let store = LocalObjectStore::new(dir.clone(), "https://files.example/");

        let url = store
            .put(b"<svg/>".to_vec(), "image/svg+xml", "certificate")
            .await
            .expect("write succeeds");

        assert!(url.starts_with("https://files.example/certificate-"));
        assert!(url.ends_with(".svg"));

        let name = url.rsplit('/').next().expect("file name");
        let written = tokio::fs::read(dir.join(name)).await.expect("file exists");
        assert_eq!(written, b"<svg/>");

        tokio::fs::remove_dir_all(dir).await.ok();
    }

    #[tokio::test]
    async fn in_memory_store_can_simulate_an_outage() {
        let store = InMemoryObjectStore::default();
        store.fail_next_put();

        let error = store.put(Vec::new(), "image/svg+xml", "certificate").await;
        assert!(error.is_err());

        let url = store
            .put(b"ok".to_vec(), "image/svg+xml", "certificate")
            .await
            .expect("subsequent put recovers");
        assert!(url.starts_with("https://files.test/"));
        assert_eq!(store.objects().await.len(), 1);
    }
}

//! In-memory object store, useful for tests and local runs.

use async_trait::async_trait;
use sahayak_core::error::StorageError;
use sahayak_core::storage::{ObjectStore, RewriteProgress, StoredObject};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct StoredBlob {
    bytes: Vec<u8>,
    content_type: String,
}

/// Objects kept in a map keyed by name.
///
/// When a rewrite chunk size is set, `rewrite` copies at most that many bytes
/// per round trip and hands back a continuation token, the way large objects
/// behave on the real service.
pub struct InMemoryObjectStore {
    bucket: String,
    public_base_url: String,
    objects: RwLock<BTreeMap<String, StoredBlob>>,
    public: RwLock<BTreeSet<String>>,
    rewrite_chunk: Option<u64>,
    rewrite_calls: AtomicUsize,
}

impl InMemoryObjectStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            public_base_url: "https://storage.googleapis.com".into(),
            objects: RwLock::new(BTreeMap::new()),
            public: RwLock::new(BTreeSet::new()),
            rewrite_chunk: None,
            rewrite_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_public_base_url(mut self, url: impl Into<String>) -> Self {
        self.public_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_rewrite_chunk(mut self, bytes: u64) -> Self {
        self.rewrite_chunk = Some(bytes.max(1));
        self
    }

    /// Number of `rewrite` round trips served so far.
    pub fn rewrite_calls(&self) -> usize {
        self.rewrite_calls.load(Ordering::SeqCst)
    }

    pub async fn object_names(&self) -> Vec<String> {
        self.objects.read().await.keys().cloned().collect()
    }

    pub async fn content_type(&self, name: &str) -> Option<String> {
        self.objects
            .read()
            .await
            .get(name)
            .map(|b| b.content_type.clone())
    }

    pub async fn is_public(&self, name: &str) -> bool {
        self.public.read().await.contains(name)
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn exists(&self, name: &str) -> Result<bool, StorageError> {
        Ok(self.objects.read().await.contains_key(name))
    }

    async fn rewrite(
        &self,
        source: &str,
        destination: &str,
        rewrite_token: Option<&str>,
    ) -> Result<RewriteProgress, StorageError> {
        self.rewrite_calls.fetch_add(1, Ordering::SeqCst);

        let blob = self
            .objects
            .read()
            .await
            .get(source)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(source.to_string()))?;

        let size = blob.bytes.len() as u64;
        let done_so_far = match rewrite_token {
            Some(token) => token.parse::<u64>().map_err(|_| StorageError::Api {
                status_code: 400,
                message: format!("invalid rewrite token '{token}'"),
            })?,
            None => 0,
        };
        let copied = match self.rewrite_chunk {
            Some(chunk) => (done_so_far + chunk).min(size),
            None => size,
        };

        if copied < size {
            return Ok(RewriteProgress {
                rewrite_token: Some(copied.to_string()),
                bytes_rewritten: copied,
                object_size: size,
            });
        }

        self.objects
            .write()
            .await
            .insert(destination.to_string(), blob);
        Ok(RewriteProgress {
            rewrite_token: None,
            bytes_rewritten: size,
            object_size: size,
        })
    }

    async fn delete(&self, name: &str) -> Result<(), StorageError> {
        self.public.write().await.remove(name);
        match self.objects.write().await.remove(name) {
            Some(_) => Ok(()),
            None => Err(StorageError::NotFound(name.to_string())),
        }
    }

    async fn upload(
        &self,
        name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<StoredObject, StorageError> {
        self.objects.write().await.insert(
            name.to_string(),
            StoredBlob {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(StoredObject {
            name: name.to_string(),
            uri: format!("gs://{}/{name}", self.bucket),
        })
    }

    async fn download(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        self.objects
            .read()
            .await
            .get(name)
            .map(|b| b.bytes.clone())
            .ok_or_else(|| StorageError::NotFound(name.to_string()))
    }

    async fn make_public(&self, name: &str) -> Result<(), StorageError> {
        if !self.objects.read().await.contains_key(name) {
            return Err(StorageError::NotFound(name.to_string()));
        }
        self.public.write().await.insert(name.to_string());
        Ok(())
    }

    fn public_url(&self, name: &str) -> String {
        crate::public_object_url(&self.public_base_url, &self.bucket, name)
    }
}

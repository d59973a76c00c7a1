//! Object storage seam and the per-user object layout.
//!
//! Layout inside the bucket:
//!
//! ```text
//! {user}/chat/uploaded/{file}    incoming attachments
//! {user}/chat/processed/{file}   attachments already relocated
//! {user}/generated/{file}        worksheets and answer sheets
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::identity::UserId;

/// Progress of one rewrite (server-side copy) round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteProgress {
    /// Present while the copy still needs more round trips.
    pub rewrite_token: Option<String>,
    pub bytes_rewritten: u64,
    pub object_size: u64,
}

impl RewriteProgress {
    pub fn is_done(&self) -> bool {
        self.rewrite_token.is_none()
    }
}

/// An object written to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    pub name: String,
    /// `gs://bucket/name` style URI.
    pub uri: String,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    fn bucket(&self) -> &str;

    async fn exists(&self, name: &str) -> std::result::Result<bool, StorageError>;

    /// One rewrite round trip. Pass the token of the previous round to continue.
    async fn rewrite(
        &self,
        source: &str,
        destination: &str,
        rewrite_token: Option<&str>,
    ) -> std::result::Result<RewriteProgress, StorageError>;

    async fn delete(&self, name: &str) -> std::result::Result<(), StorageError>;

    async fn upload(
        &self,
        name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> std::result::Result<StoredObject, StorageError>;

    async fn download(&self, name: &str) -> std::result::Result<Vec<u8>, StorageError>;

    /// Grant anonymous read access to one object.
    async fn make_public(&self, name: &str) -> std::result::Result<(), StorageError>;

    fn public_url(&self, name: &str) -> String;
}

pub fn uploaded_path(user_id: &UserId, filename: &str) -> String {
    format!("{user_id}/chat/uploaded/{filename}")
}

pub fn processed_path(user_id: &UserId, filename: &str) -> String {
    format!("{user_id}/chat/processed/{filename}")
}

pub fn generated_path(user_id: &UserId, filename: &str) -> String {
    format!("{user_id}/generated/{filename}")
}

/// Folder marker objects created for every user on first upload.
pub fn folder_markers(user_id: &UserId) -> [String; 3] {
    [
        uploaded_path(user_id, ".keep"),
        processed_path(user_id, ".keep"),
        generated_path(user_id, ".keep"),
    ]
}

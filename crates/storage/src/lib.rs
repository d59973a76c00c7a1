//! Object storage for Sahayak.
//!
//! Backends implement `sahayak_core::ObjectStore`; the
//! [`AttachmentRelocator`] builds the upload/relocate flow on top of one.

pub mod gcs;
pub mod in_memory;
pub mod relocator;

pub use gcs::GcsObjectStore;
pub use in_memory::InMemoryObjectStore;
pub use relocator::{AttachmentRelocator, RelocatedAttachment, mime_for};

use sahayak_config::StorageConfig;
use sahayak_core::{Error, ObjectStore, Result, TokenSource};
use reqwest::Url;
use sahayak_google::AuthorizedClient;
use std::sync::Arc;

/// `{base}/{bucket}/{name}` with every segment percent-encoded.
///
/// Slashes in `name` stay path separators; anything else a user id may hold
/// (spaces, `#`, `?`, `%`, non-ASCII) is encoded.
pub(crate) fn public_object_url(base: &str, bucket: &str, name: &str) -> String {
    match Url::parse(base) {
        Ok(mut url) if !url.cannot_be_a_base() => {
            if let Ok(mut segments) = url.path_segments_mut() {
                segments.pop_if_empty().push(bucket).extend(name.split('/'));
            }
            url.to_string()
        }
        _ => format!("{}/{bucket}/{name}", base.trim_end_matches('/')),
    }
}

/// Build the object store selected by `storage.backend`.
pub fn store_from_config(
    config: &StorageConfig,
    tokens: Arc<dyn TokenSource>,
) -> Result<Arc<dyn ObjectStore>> {
    match config.backend.as_str() {
        "gcs" => {
            tracing::info!(bucket = %config.bucket, "Using Cloud Storage backend");
            let store = GcsObjectStore::new(
                AuthorizedClient::new(tokens),
                &config.bucket,
                &config.api_url,
                &config.public_base_url,
            )
            .map_err(|e| Error::upstream("storage.init", &config.api_url, e))?;
            Ok(Arc::new(store))
        }
        _ => {
            let bucket = if config.bucket.is_empty() {
                "sahayak-local"
            } else {
                config.bucket.as_str()
            };
            tracing::info!(bucket, "Using in-memory object store");
            Ok(Arc::new(
                InMemoryObjectStore::new(bucket).with_public_base_url(&config.public_base_url),
            ))
        }
    }
}

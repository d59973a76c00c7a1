//! Attachment relocation: `uploaded/` to `processed/`, then fetch.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use sahayak_core::content::{Attachment, OCTET_STREAM};
use sahayak_core::storage::{self, ObjectStore, StoredObject};
use sahayak_core::{Error, Result, UserId};
use std::sync::Arc;
use tracing::{debug, info};

/// Bytes and media type of a relocated attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelocatedAttachment {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl RelocatedAttachment {
    pub fn encode(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    pub fn into_attachment(self) -> Attachment {
        let data = self.encode();
        Attachment::new(data, Some(self.mime_type))
    }
}

/// Media type from the filename extension, `application/octet-stream` when unknown.
pub fn mime_for(filename: &str) -> String {
    mime_guess::from_path(filename)
        .first_raw()
        .unwrap_or(OCTET_STREAM)
        .to_string()
}

/// Moves user uploads into the processing area and reads them back.
#[derive(Clone)]
pub struct AttachmentRelocator {
    store: Arc<dyn ObjectStore>,
}

impl AttachmentRelocator {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Move `{user}/chat/uploaded/{file}` to `{user}/chat/processed/{file}`
    /// and return its bytes.
    ///
    /// The rewrite is driven until the store reports completion and only then
    /// is the source deleted. A second call for the same file fails with
    /// `NotFound` because the source is gone.
    pub async fn relocate(&self, user_id: &UserId, filename: &str) -> Result<RelocatedAttachment> {
        let source = storage::uploaded_path(user_id, filename);
        let destination = storage::processed_path(user_id, filename);
        let context = format!("bucket={} object={source}", self.store.bucket());

        let present = self
            .store
            .exists(&source)
            .await
            .map_err(|e| Error::upstream("attachment.exists", &context, e))?;
        if !present {
            return Err(Error::not_found(format!("attachment {source}")));
        }

        let mut token: Option<String> = None;
        let mut rounds = 0usize;
        loop {
            let progress = self
                .store
                .rewrite(&source, &destination, token.as_deref())
                .await
                .map_err(|e| Error::upstream("attachment.rewrite", &context, e))?;
            rounds += 1;
            debug!(
                object = %source,
                bytes = progress.bytes_rewritten,
                size = progress.object_size,
                "Rewrite progress"
            );
            match progress.rewrite_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        self.store
            .delete(&source)
            .await
            .map_err(|e| Error::upstream("attachment.delete_source", &context, e))?;

        let bytes = self
            .store
            .download(&destination)
            .await
            .map_err(|e| Error::upstream("attachment.download", &context, e))?;

        let mime_type = mime_for(filename);
        info!(
            user_id = %user_id,
            file = filename,
            mime_type = %mime_type,
            size = bytes.len(),
            rounds,
            "Attachment relocated"
        );

        Ok(RelocatedAttachment { bytes, mime_type })
    }

    /// [`relocate`](Self::relocate), returning base64 content and media type.
    pub async fn relocate_and_encode(
        &self,
        user_id: &UserId,
        filename: &str,
    ) -> Result<(String, String)> {
        let relocated = self.relocate(user_id, filename).await?;
        Ok((relocated.encode(), relocated.mime_type))
    }

    /// Store a new upload at `{user}/chat/uploaded/{file}`, creating the
    /// per-user folder markers first when they are missing.
    pub async fn upload(
        &self,
        user_id: &UserId,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<StoredObject> {
        for marker in storage::folder_markers(user_id) {
            let context = format!("bucket={} object={marker}", self.store.bucket());
            let present = self
                .store
                .exists(&marker)
                .await
                .map_err(|e| Error::upstream("attachment.marker_exists", &context, e))?;
            if !present {
                self.store
                    .upload(&marker, Vec::new(), "text/plain")
                    .await
                    .map_err(|e| Error::upstream("attachment.marker_create", &context, e))?;
                debug!(marker = %marker, "Created folder marker");
            }
        }

        let name = storage::uploaded_path(user_id, filename);
        let context = format!("bucket={} object={name}", self.store.bucket());
        let stored = self
            .store
            .upload(&name, bytes, &mime_for(filename))
            .await
            .map_err(|e| Error::upstream("attachment.upload", &context, e))?;
        info!(user_id = %user_id, file = filename, "Attachment uploaded");
        Ok(stored)
    }
}

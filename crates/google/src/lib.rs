//! Google credentials for Sahayak.
//!
//! Storage, the reasoning-engine client and the calendar backend all talk to
//! Google APIs through an [`AuthorizedClient`] built on one shared
//! [`TokenSource`](sahayak_core::TokenSource).

pub mod client;
pub mod token;

pub use client::{AuthorizedClient, RequestError};
pub use token::{MetadataTokenSource, StaticTokenSource};

use sahayak_config::AuthConfig;
use sahayak_core::TokenSource;
use std::sync::Arc;

/// Pick the token source described by config: a static token when one is
/// set, otherwise the metadata server.
pub fn token_source_from_config(config: &AuthConfig) -> Arc<dyn TokenSource> {
    match config.access_token.as_deref().filter(|t| !t.is_empty()) {
        Some(token) => {
            tracing::info!("Using static Google access token");
            Arc::new(StaticTokenSource::new(token))
        }
        None => {
            tracing::info!(server = %config.metadata_server, "Using metadata server for Google access tokens");
            Arc::new(MetadataTokenSource::new(config.metadata_server.clone()))
        }
    }
}

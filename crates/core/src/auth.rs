//! Access-token seam shared by every Google-backed collaborator.

use async_trait::async_trait;

use crate::error::AuthError;

#[async_trait]
pub trait TokenSource: Send + Sync {
    fn name(&self) -> &str;

    /// A bearer token, cached when the source supports it.
    async fn token(&self) -> std::result::Result<String, AuthError>;

    /// Discard any cached token and fetch a new one.
    async fn refresh(&self) -> std::result::Result<String, AuthError>;
}

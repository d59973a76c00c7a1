//! Access-token sources.
//!
//! - [`StaticTokenSource`]: a token handed in through config or env
//! - [`MetadataTokenSource`]: the GCE/Cloud Run metadata server, cached
//!   until shortly before expiry

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sahayak_core::{AuthError, TokenSource};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// A fixed bearer token. `refresh` cannot mint a new one and returns it as-is.
pub struct StaticTokenSource {
    token: String,
}

impl StaticTokenSource {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenSource for StaticTokenSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn token(&self) -> Result<String, AuthError> {
        if self.token.is_empty() {
            return Err(AuthError("no access token configured".into()));
        }
        Ok(self.token.clone())
    }

    async fn refresh(&self) -> Result<String, AuthError> {
        self.token().await
    }
}

const TOKEN_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/token";

/// Tokens are considered stale this long before their stated expiry.
const EXPIRY_SLACK_SECS: i64 = 60;

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
    #[serde(default)]
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Service-account tokens from the instance metadata server.
pub struct MetadataTokenSource {
    base_url: String,
    client: reqwest::Client,
    cached: RwLock<Option<CachedToken>>,
}

impl MetadataTokenSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            cached: RwLock::new(None),
        }
    }

    async fn fetch(&self) -> Result<CachedToken, AuthError> {
        let url = format!("{}{TOKEN_PATH}", self.base_url);
        debug!(url = %url, "Fetching access token from metadata server");

        let response = self
            .client
            .get(&url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| AuthError(format!("metadata server unreachable: {e}")))?;

        if !response.status().is_success() {
            return Err(AuthError(format!(
                "metadata server returned {}",
                response.status().as_u16()
            )));
        }

        let body: MetadataToken = response
            .json()
            .await
            .map_err(|e| AuthError(format!("invalid metadata token response: {e}")))?;

        let lifetime = (body.expires_in - EXPIRY_SLACK_SECS).max(0);
        Ok(CachedToken {
            token: body.access_token,
            expires_at: Utc::now() + Duration::seconds(lifetime),
        })
    }
}

#[async_trait]
impl TokenSource for MetadataTokenSource {
    fn name(&self) -> &str {
        "metadata"
    }

    async fn token(&self) -> Result<String, AuthError> {
        if let Some(cached) = self.cached.read().await.as_ref()
            && cached.expires_at > Utc::now()
        {
            return Ok(cached.token.clone());
        }
        self.refresh().await
    }

    async fn refresh(&self) -> Result<String, AuthError> {
        let fresh = self.fetch().await?;
        info!(expires_at = %fresh.expires_at, "Obtained access token from metadata server");
        let token = fresh.token.clone();
        *self.cached.write().await = Some(fresh);
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::get;
    use axum::{Json, Router};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn spawn_metadata(expires_in: i64) -> (String, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let app = Router::new().route(
            TOKEN_PATH,
            get(move |headers: HeaderMap| {
                let counter = Arc::clone(&counter);
                async move {
                    if headers.get("Metadata-Flavor").map(|v| v.as_bytes()) != Some(b"Google") {
                        return Err(StatusCode::FORBIDDEN);
                    }
                    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    Ok(Json(serde_json::json!({
                        "access_token": format!("token-{n}"),
                        "expires_in": expires_in,
                        "token_type": "Bearer"
                    })))
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind mock server");
        let addr = listener.local_addr().expect("mock server address");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        (format!("http://{addr}"), calls)
    }

    #[tokio::test]
    async fn static_source_rejects_empty_token() {
        assert!(StaticTokenSource::new("").token().await.is_err());
        assert_eq!(StaticTokenSource::new("abc").refresh().await.unwrap(), "abc");
    }

    #[tokio::test]
    async fn metadata_token_is_cached_until_refresh() {
        let (url, calls) = spawn_metadata(3600).await;
        let source = MetadataTokenSource::new(url);
        assert_eq!(source.token().await.unwrap(), "token-1");
        assert_eq!(source.token().await.unwrap(), "token-1");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert_eq!(source.refresh().await.unwrap(), "token-2");
        assert_eq!(source.token().await.unwrap(), "token-2");
    }

    #[tokio::test]
    async fn short_lived_token_is_refetched() {
        let (url, calls) = spawn_metadata(10).await;
        let source = MetadataTokenSource::new(url);
        source.token().await.unwrap();
        source.token().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unreachable_metadata_server_is_auth_error() {
        let source = MetadataTokenSource::new("http://127.0.0.1:9");
        let err = source.token().await.unwrap_err();
        assert!(err.0.contains("metadata server"));
    }
}

//! HTTP client that attaches a bearer token and refreshes it once on 401.

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use sahayak_core::{EngineError, ProviderError, StorageError, TokenSource};
use std::sync::Arc;
use tracing::{debug, warn};

/// Why an authorized request could not produce a response.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RequestError {
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("network error: {0}")]
    Network(String),
}

impl From<RequestError> for StorageError {
    fn from(err: RequestError) -> Self {
        match err {
            RequestError::Unauthenticated(r) => Self::Unauthenticated(r),
            RequestError::Network(r) => Self::Network(r),
        }
    }
}

impl From<RequestError> for EngineError {
    fn from(err: RequestError) -> Self {
        match err {
            RequestError::Unauthenticated(r) => Self::Unauthenticated(r),
            RequestError::Network(r) => Self::Network(r),
        }
    }
}

impl From<RequestError> for ProviderError {
    fn from(err: RequestError) -> Self {
        match err {
            RequestError::Unauthenticated(r) => Self::AuthenticationFailed(r),
            RequestError::Network(r) => Self::Network(r),
        }
    }
}

/// A `reqwest::Client` bound to a [`TokenSource`].
#[derive(Clone)]
pub struct AuthorizedClient {
    http: Client,
    tokens: Arc<dyn TokenSource>,
}

impl AuthorizedClient {
    pub fn new(tokens: Arc<dyn TokenSource>) -> Self {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { http, tokens }
    }

    pub fn with_client(http: Client, tokens: Arc<dyn TokenSource>) -> Self {
        Self { http, tokens }
    }

    pub fn http(&self) -> &Client {
        &self.http
    }

    /// Send a request built by `build`, with a bearer token attached.
    ///
    /// On a 401 the token is refreshed and the request is rebuilt and sent
    /// exactly once more. A second 401 is `Unauthenticated`. Any other status
    /// is returned to the caller untouched.
    pub async fn send<F>(&self, build: F) -> Result<Response, RequestError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let token = self
            .tokens
            .token()
            .await
            .map_err(|e| RequestError::Unauthenticated(e.0))?;

        let response = Self::dispatch(build(&self.http).bearer_auth(&token)).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        debug!(source = self.tokens.name(), "Got 401, refreshing access token");
        let token = self
            .tokens
            .refresh()
            .await
            .map_err(|e| RequestError::Unauthenticated(e.0))?;

        let response = Self::dispatch(build(&self.http).bearer_auth(&token)).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            warn!(source = self.tokens.name(), "Request rejected after token refresh");
            return Err(RequestError::Unauthenticated(
                "credentials rejected after refresh".into(),
            ));
        }
        Ok(response)
    }

    async fn dispatch(request: RequestBuilder) -> Result<Response, RequestError> {
        request
            .send()
            .await
            .map_err(|e| RequestError::Network(e.to_string()))
    }
}

//! Vertex AI reasoning engines over REST.
//!
//! - [`VertexRegistry`]: `reasoningEngines` list/create/delete
//! - [`VertexEngine`]: session class methods through `:query`, turns
//!   through `:streamQuery` (one JSON chunk per line)

pub mod engine;
pub mod registry;

pub use engine::VertexEngine;
pub use registry::VertexRegistry;

use reqwest::Response;
use sahayak_core::error::EngineError;
use tracing::warn;

/// `https://{location}-aiplatform.googleapis.com` unless overridden.
pub fn api_base(api_url: Option<&str>, location: &str) -> String {
    api_url
        .map(|u| u.trim_end_matches('/').to_string())
        .unwrap_or_else(|| format!("https://{location}-aiplatform.googleapis.com"))
}

/// Map a non-success status to an [`EngineError`].
pub(crate) async fn check(response: Response, what: &str) -> Result<Response, EngineError> {
    let status = response.status().as_u16();
    if response.status().is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    warn!(status, what, body = %body, "Reasoning engine request failed");
    Err(match status {
        404 => EngineError::NotFound(what.to_string()),
        _ => EngineError::Api {
            status_code: status,
            message: body,
        },
    })
}

pub(crate) fn malformed(what: &str, e: impl std::fmt::Display) -> EngineError {
    EngineError::Api {
        status_code: 200,
        message: format!("unexpected {what} response: {e}"),
    }
}

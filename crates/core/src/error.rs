//! Error types for the Sahayak domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each remote collaborator has its own bounded error; the top-level
//! [`Error`] carries the caller-visible taxonomy.

use thiserror::Error;

/// The top-level error type for all Sahayak operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Attachment missing at the expected stage, unknown session, no deployment.
    #[error("Not found: {what}")]
    NotFound { what: String },

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Rejected locally before any remote call was made.
    #[error("Empty input: {0}")]
    EmptyInput(String),

    /// A remote store/model/storage call failed.
    #[error("{operation} failed [{context}]: {source}")]
    Upstream {
        operation: String,
        context: String,
        #[source]
        source: UpstreamError,
    },

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification used by outer layers (HTTP status, CLI exit text).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Unauthenticated,
    EmptyInput,
    Upstream,
    Internal,
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Annotate a remote failure with the failing operation and its identifiers.
    ///
    /// Bounded `NotFound` / `Unauthenticated` errors are promoted to the
    /// matching top-level variant so callers see the right taxonomy.
    pub fn upstream(
        operation: impl Into<String>,
        context: impl Into<String>,
        err: impl Into<UpstreamError>,
    ) -> Self {
        let operation = operation.into();
        let context = context.into();
        let source = err.into();

        if let Some(what) = source.not_found() {
            return Self::NotFound {
                what: format!("{what} ({operation}: {context})"),
            };
        }
        if let Some(reason) = source.unauthenticated() {
            return Self::Unauthenticated(format!("{reason} ({operation})"));
        }

        Self::Upstream {
            operation,
            context,
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Unauthenticated(_) => ErrorKind::Unauthenticated,
            Self::EmptyInput(_) => ErrorKind::EmptyInput,
            Self::Upstream { .. } => ErrorKind::Upstream,
            Self::Config { .. } | Self::Serialization(_) | Self::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }
}

/// The bounded-context error wrapped by [`Error::Upstream`].
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Tool(#[from] ToolError),
}

impl UpstreamError {
    fn not_found(&self) -> Option<&str> {
        match self {
            Self::Storage(StorageError::NotFound(what)) => Some(what),
            Self::Engine(EngineError::NotFound(what)) => Some(what),
            Self::Provider(ProviderError::ModelNotFound(what)) => Some(what),
            _ => None,
        }
    }

    fn unauthenticated(&self) -> Option<&str> {
        match self {
            Self::Storage(StorageError::Unauthenticated(r)) => Some(r),
            Self::Engine(EngineError::Unauthenticated(r)) => Some(r),
            Self::Provider(ProviderError::AuthenticationFailed(r)) => Some(r),
            _ => None,
        }
    }
}

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Storage authentication failed: {0}")]
    Unauthenticated(String),

    #[error("Storage request failed: {message} (status: {status_code})")]
    Api { status_code: u16, message: String },

    #[error("Storage network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Engine authentication failed: {0}")]
    Unauthenticated(String),

    #[error("Engine request failed: {message} (status: {status_code})")]
    Api { status_code: u16, message: String },

    #[error("Engine stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Engine network error: {0}")]
    Network(String),

    #[error("Engine not configured: {0}")]
    NotConfigured(String),
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

/// A credential could not be obtained or was rejected.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct AuthError(pub String);

impl From<AuthError> for ProviderError {
    fn from(err: AuthError) -> Self {
        Self::AuthenticationFailed(err.0)
    }
}

impl From<AuthError> for StorageError {
    fn from(err: AuthError) -> Self {
        Self::Unauthenticated(err.0)
    }
}

impl From<AuthError> for EngineError {
    fn from(err: AuthError) -> Self {
        Self::Unauthenticated(err.0)
    }
}

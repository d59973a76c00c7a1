//! # Sahayak Core
//!
//! Domain types, traits, and error definitions for the Sahayak teaching
//! assistant. This crate has **zero framework dependencies**: it defines the
//! domain model that all other crates implement against.
//!
//! Every remote collaborator is a trait here:
//! - [`Provider`] for language models
//! - [`Tool`] for handler capabilities
//! - [`ObjectStore`] for attachment and document storage
//! - [`AgentEngine`] / [`DeploymentRegistry`] for the agent runtime
//! - [`TokenSource`] for Google credentials

pub mod auth;
pub mod content;
pub mod engine;
pub mod error;
pub mod identity;
pub mod message;
pub mod provider;
pub mod session;
pub mod storage;
pub mod tool;

pub use auth::TokenSource;
pub use content::{Attachment, Content, Envelope, InlineData, Part, QueryHints, TurnRole, OCTET_STREAM};
pub use engine::{AgentEngine, DeploymentRecord, DeploymentRegistry, EngineChunk, EngineStream};
pub use error::{
    AuthError, EngineError, Error, ErrorKind, ProviderError, Result, StorageError, ToolError,
    UpstreamError,
};
pub use identity::{SessionId, UserId};
pub use message::{Message, MessageToolCall, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
pub use session::{
    DeleteOutcome, EventContent, EventPart, InitialState, Session, SessionEvent, SessionMessage,
    SessionOverview,
};
pub use storage::{ObjectStore, RewriteProgress, StoredObject};
pub use tool::{Tool, ToolCall, ToolContext, ToolRegistry, ToolResult};

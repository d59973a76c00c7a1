//! Agent runtime seams: the engine hosting the dispatcher and the registry
//! of engine deployments.
//!
//! An [`AgentEngine`] owns sessions and runs turns; a [`DeploymentRegistry`]
//! lists/creates/deletes engine deployments and opens a handle to one.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::content::Envelope;
use crate::error::EngineError;
use crate::identity::{SessionId, UserId};
use crate::session::{EventContent, EventPart, InitialState, Session};

/// One streamed chunk of a turn, shaped like a stored event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineChunk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<EventContent>,
}

impl EngineChunk {
    pub fn text(author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            author: Some(author.into()),
            content: Some(EventContent {
                role: Some("model".into()),
                parts: vec![EventPart::text(text)],
            }),
        }
    }

    /// Non-empty text parts, in order.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.content
            .iter()
            .flat_map(|c| c.parts.iter())
            .filter_map(|p| p.text.as_deref())
            .filter(|t| !t.is_empty())
    }
}

/// Stream of turn chunks. It ends when the producer drops its sender.
pub type EngineStream = mpsc::Receiver<std::result::Result<EngineChunk, EngineError>>;

/// A running agent engine: owns sessions and answers turns.
#[async_trait]
pub trait AgentEngine: Send + Sync {
    fn name(&self) -> &str;

    async fn create_session(
        &self,
        user_id: &UserId,
        state: &InitialState,
    ) -> std::result::Result<Session, EngineError>;

    /// Sessions of one user, in the store's native order.
    async fn list_sessions(&self, user_id: &UserId)
    -> std::result::Result<Vec<Session>, EngineError>;

    /// A session with its events.
    async fn get_session(
        &self,
        user_id: &UserId,
        session_id: &SessionId,
    ) -> std::result::Result<Session, EngineError>;

    async fn delete_session(
        &self,
        user_id: &UserId,
        session_id: &SessionId,
    ) -> std::result::Result<(), EngineError>;

    /// Submit one turn and stream back the reply.
    async fn stream_query(
        &self,
        user_id: &UserId,
        session_id: &SessionId,
        envelope: Envelope,
    ) -> std::result::Result<EngineStream, EngineError>;
}

/// A deployment as reported by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    /// Full resource name, e.g. `projects/p/locations/l/reasoningEngines/123`.
    #[serde(rename = "name")]
    pub resource_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
}

impl DeploymentRecord {
    pub fn new(resource_name: impl Into<String>) -> Self {
        Self {
            resource_name: resource_name.into(),
            display_name: None,
            create_time: None,
        }
    }

    /// The last path segment of the resource name.
    pub fn resource_id(&self) -> &str {
        self.resource_name
            .rsplit('/')
            .next()
            .unwrap_or(&self.resource_name)
    }
}

/// Where engine deployments live.
#[async_trait]
pub trait DeploymentRegistry: Send + Sync {
    fn name(&self) -> &str;

    async fn list(&self) -> std::result::Result<Vec<DeploymentRecord>, EngineError>;

    /// Always creates a new deployment.
    async fn create(&self) -> std::result::Result<DeploymentRecord, EngineError>;

    /// Open a handle to an existing deployment.
    async fn open(
        &self,
        record: &DeploymentRecord,
    ) -> std::result::Result<Arc<dyn AgentEngine>, EngineError>;

    /// Tear a deployment down, including its sessions when `force` is set.
    async fn delete(
        &self,
        record: &DeploymentRecord,
        force: bool,
    ) -> std::result::Result<(), EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_id_is_last_segment() {
        let rec = DeploymentRecord::new("projects/p/locations/us-central1/reasoningEngines/4242");
        assert_eq!(rec.resource_id(), "4242");
        assert_eq!(DeploymentRecord::new("local-1").resource_id(), "local-1");
    }

    #[test]
    fn record_parses_registry_json() {
        let rec: DeploymentRecord = serde_json::from_value(serde_json::json!({
            "name": "projects/p/locations/l/reasoningEngines/9",
            "displayName": "sahayak",
            "createTime": "2025-07-26T10:00:00Z"
        }))
        .unwrap();
        assert_eq!(rec.resource_id(), "9");
        assert_eq!(rec.display_name.as_deref(), Some("sahayak"));
    }

    #[test]
    fn chunk_texts_skip_empty_and_missing() {
        let chunk: EngineChunk = serde_json::from_value(serde_json::json!({
            "author": "manager",
            "content": {"parts": [{"text": "Hello "}, {"text": ""}, {"function_call": {}}, {"text": "world"}]}
        }))
        .unwrap();
        assert_eq!(chunk.texts().collect::<String>(), "Hello world");
        assert_eq!(EngineChunk::default().texts().count(), 0);
    }
}

//! The query facade: one inbound turn from request to reply text.

use sahayak_core::content::{Attachment, Envelope, QueryHints};
use sahayak_core::storage::StoredObject;
use sahayak_core::{Error, Result, SessionId, UserId};
use sahayak_storage::AttachmentRelocator;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::deployment::DeploymentManager;
use crate::sessions::SessionManager;

/// Where the attachment of a turn comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentSource {
    /// A file previously uploaded to `{user}/chat/uploaded/`.
    Stored(String),
    /// Bytes already encoded by the caller.
    Inline(Attachment),
}

#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub user_id: UserId,
    /// Empty means the user's most recent session.
    pub session_id: SessionId,
    pub message: Option<String>,
    pub attachment: Option<AttachmentSource>,
    pub hints: QueryHints,
}

impl QueryRequest {
    pub fn text(user_id: impl Into<UserId>, session_id: impl Into<SessionId>, message: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            session_id: session_id.into(),
            message: Some(message.into()),
            attachment: None,
            hints: QueryHints::default(),
        }
    }

    pub fn with_attachment(mut self, attachment: AttachmentSource) -> Self {
        self.attachment = Some(attachment);
        self
    }

    pub fn with_hints(mut self, hints: QueryHints) -> Self {
        self.hints = hints;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplyAttachments {
    pub video_links: Vec<String>,
    pub articles: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryReply {
    pub message: String,
    pub attachments: ReplyAttachments,
    pub role: &'static str,
}

impl QueryReply {
    fn model(message: String) -> Self {
        Self {
            message,
            attachments: ReplyAttachments::default(),
            role: "model",
        }
    }
}

pub struct Assistant {
    deployments: Arc<DeploymentManager>,
    sessions: Arc<SessionManager>,
    relocator: AttachmentRelocator,
}

impl Assistant {
    pub fn new(
        deployments: Arc<DeploymentManager>,
        sessions: Arc<SessionManager>,
        relocator: AttachmentRelocator,
    ) -> Self {
        Self {
            deployments,
            sessions,
            relocator,
        }
    }

    pub fn relocator(&self) -> &AttachmentRelocator {
        &self.relocator
    }

    /// Send one turn and return the whole reply.
    ///
    /// Empty input is rejected before anything is touched. A relocated
    /// attachment stays in `processed/` even when the engine call fails.
    pub async fn send_query(&self, request: QueryRequest) -> Result<QueryReply> {
        let QueryRequest {
            user_id,
            session_id,
            message,
            attachment,
            hints,
        } = request;

        let message = message.filter(|m| !m.is_empty());
        if message.is_none() && attachment.is_none() {
            return Err(Error::EmptyInput("no message or attachment provided".into()));
        }
        let text = match message {
            Some(m) => Some(hints.apply(&m)),
            None if !hints.is_empty() => Some(hints.apply("")),
            None => None,
        };

        let attachment = match attachment {
            Some(AttachmentSource::Stored(filename)) => {
                Some(self.relocator.relocate(&user_id, &filename).await?.into_attachment())
            }
            Some(AttachmentSource::Inline(inline)) => Some(inline),
            None => None,
        };
        let envelope = Envelope::build(text.as_deref(), attachment)?;

        let session_id = if session_id.as_str().is_empty() {
            let latest = self.sessions.latest(&user_id).await?;
            debug!(user_id = %user_id, session_id = %latest, "Resolved empty session id to the latest session");
            latest
        } else {
            session_id
        };

        let context = format!("user_id={user_id} session_id={session_id}");
        let engine = self.deployments.engine().await?;
        let mut stream = engine
            .stream_query(&user_id, &session_id, envelope)
            .await
            .map_err(|e| Error::upstream("assistant.stream_query", &context, e))?;

        let mut reply = String::new();
        let mut chunks = 0usize;
        while let Some(chunk) = stream.recv().await {
            let chunk = chunk.map_err(|e| Error::upstream("assistant.stream", &context, e))?;
            reply.extend(chunk.texts());
            chunks += 1;
        }
        info!(
            user_id = %user_id,
            session_id = %session_id,
            chunks,
            reply_len = reply.len(),
            "Query answered"
        );
        Ok(QueryReply::model(reply))
    }

    /// Store a new upload under the user's `uploaded/` folder.
    pub async fn upload_attachment(&self, user_id: &UserId, filename: &str, bytes: Vec<u8>) -> Result<StoredObject> {
        if filename.is_empty() {
            return Err(Error::EmptyInput("no file name provided".into()));
        }
        self.relocator.upload(user_id, filename, bytes).await
    }

    /// Relocate a stored upload and return it base64-encoded with its media type.
    pub async fn relocate_and_encode(&self, user_id: &UserId, filename: &str) -> Result<(String, String)> {
        self.relocator.relocate_and_encode(user_id, filename).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::LocalRegistry;
    use crate::test_helpers::{ScriptedProvider, keyword_coordinator};
    use sahayak_core::ErrorKind;
    use sahayak_core::session::InitialState;
    use sahayak_core::storage::{ObjectStore, processed_path};
    use sahayak_storage::InMemoryObjectStore;

    struct Fixture {
        assistant: Assistant,
        store: Arc<InMemoryObjectStore>,
        provider: Arc<ScriptedProvider>,
    }

    async fn fixture(replies: &[&str]) -> Fixture {
        let provider = Arc::new(ScriptedProvider::texts(replies));
        let (coordinator, store) = keyword_coordinator(provider.clone());
        let deployments = Arc::new(DeploymentManager::new(Arc::new(LocalRegistry::new(
            "sahayak",
            coordinator,
        ))));
        deployments.ensure_active().await.unwrap();
        let sessions = Arc::new(SessionManager::new(deployments.clone(), InitialState::DEFAULT));
        let assistant = Assistant::new(deployments, sessions, AttachmentRelocator::new(store.clone()));
        Fixture {
            assistant,
            store,
            provider,
        }
    }

    #[tokio::test]
    async fn text_turn_is_answered() {
        let f = fixture(&["Hello teacher!"]).await;
        let session = f.assistant.sessions.create(&UserId::from("t1")).await.unwrap();

        let reply = f
            .assistant
            .send_query(QueryRequest::text("t1", session, "hello"))
            .await
            .unwrap();
        assert_eq!(reply.message, "Hello teacher!");
        assert_eq!(reply.role, "model");
        assert!(reply.attachments.video_links.is_empty());
    }

    #[tokio::test]
    async fn empty_turn_is_rejected_without_side_effects() {
        let f = fixture(&[]).await;
        let request = QueryRequest {
            user_id: UserId::from("t1"),
            session_id: SessionId::from(""),
            message: Some(String::new()),
            attachment: None,
            hints: QueryHints {
                response_tone: Some("friendly".into()),
                ..QueryHints::default()
            },
        };
        let err = f.assistant.send_query(request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyInput);
        assert!(f.provider.requests().is_empty());
        assert!(f.store.object_names().await.is_empty());
    }

    #[tokio::test]
    async fn hints_reach_the_model() {
        let f = fixture(&["ok"]).await;
        let hints = QueryHints {
            target_audience: vec!["Grade 3".into(), "Grade 4".into()],
            response_tone: Some("playful".into()),
            complexity_level: None,
        };
        f.assistant
            .send_query(QueryRequest::text("t1", "", "hello class").with_hints(hints))
            .await
            .unwrap();

        let requests = f.provider.requests();
        let last_user = requests[0]
            .messages
            .iter()
            .rev()
            .find(|m| m.role == sahayak_core::Role::User)
            .unwrap();
        assert!(last_user.content.contains("hello class\nTarget Audience will be: Grade 3, Grade 4"));
        assert!(last_user.content.contains("Response Tone has to be: playful"));
    }

    #[tokio::test]
    async fn stored_attachment_is_relocated_before_sending() {
        let f = fixture(&["A leaf."]).await;
        let user = UserId::from("t1");
        f.assistant
            .upload_attachment(&user, "leaf.png", vec![1, 2, 3])
            .await
            .unwrap();

        let reply = f
            .assistant
            .send_query(
                QueryRequest::text("t1", "", "hello, what is this?")
                    .with_attachment(AttachmentSource::Stored("leaf.png".into())),
            )
            .await
            .unwrap();
        assert_eq!(reply.message, "A leaf.");
        assert!(f.store.exists(&processed_path(&user, "leaf.png")).await.unwrap());

        let again = f
            .assistant
            .send_query(
                QueryRequest::text("t1", "", "again")
                    .with_attachment(AttachmentSource::Stored("leaf.png".into())),
            )
            .await
            .unwrap_err();
        assert_eq!(again.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn empty_session_id_uses_the_latest_session() {
        let f = fixture(&["first", "second"]).await;
        let user = UserId::from("t1");
        f.assistant
            .send_query(QueryRequest::text("t1", "", "hello"))
            .await
            .unwrap();
        let sessions = f.assistant.sessions.list(&user).await.unwrap();
        assert_eq!(sessions.len(), 1);

        let messages = f.assistant.sessions.get_messages(&user, &sessions[0].id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].message, "first");
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let f = fixture(&["never"]).await;
        let err = f
            .assistant
            .send_query(QueryRequest::text("t1", "missing", "hello"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn upload_requires_a_file_name() {
        let f = fixture(&[]).await;
        let err = f
            .assistant
            .upload_attachment(&UserId::from("t1"), "", vec![1])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyInput);
    }
}

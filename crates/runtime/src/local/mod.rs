//! The in-process engine: the dispatcher running over an in-memory session
//! store, plus a registry that hands out such engines as "deployments".

pub mod sessions;

pub use sessions::InMemorySessionService;

use async_trait::async_trait;
use sahayak_agent::{Coordinator, HandlerContext, HandlerEvent, Intent};
use sahayak_core::content::{Envelope, Part, TurnRole};
use sahayak_core::engine::{AgentEngine, DeploymentRecord, DeploymentRegistry, EngineChunk, EngineStream};
use sahayak_core::error::EngineError;
use sahayak_core::message::Message;
use sahayak_core::session::{EventContent, EventPart, InitialState, Session, SessionEvent};
use sahayak_core::{SessionId, UserId};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info};

const USER_AUTHOR: &str = "user";

fn event_parts(envelope: &Envelope) -> Vec<EventPart> {
    envelope
        .parts()
        .into_iter()
        .map(|part| match part {
            Part::Text { text } => EventPart::text(text),
            Part::InlineData { inline_data } => EventPart {
                text: None,
                inline_data: Some(inline_data),
            },
        })
        .collect()
}

fn new_event(author: &str, role: TurnRole, parts: Vec<EventPart>) -> SessionEvent {
    SessionEvent {
        id: uuid::Uuid::new_v4().to_string(),
        author: author.to_string(),
        content: Some(EventContent {
            role: Some(role.as_str().to_string()),
            parts,
        }),
        timestamp: 0.0,
    }
}

/// Earlier turns as model history. Attachments of past turns are not resent.
fn history_from(events: &[SessionEvent]) -> Vec<Message> {
    events
        .iter()
        .filter_map(|event| {
            let content = event.content.as_ref()?;
            let text = content
                .parts
                .iter()
                .filter_map(|p| p.text.as_deref())
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join("\n");
            if text.is_empty() {
                return None;
            }
            Some(match content.role.as_deref() {
                Some("user") => Message::user(text),
                _ => Message::assistant(text),
            })
        })
        .collect()
}

/// The handler that wrote the latest model turn. Model events carry the
/// handler's label as their author.
fn previous_handler(events: &[SessionEvent]) -> Option<Intent> {
    events
        .iter()
        .rev()
        .find(|event| event.author != USER_AUTHOR)
        .and_then(|event| Intent::from_label(&event.author))
}

/// Runs turns through a [`Coordinator`] in this process.
pub struct LocalEngine {
    sessions: Arc<InMemorySessionService>,
    coordinator: Arc<Coordinator>,
}

impl LocalEngine {
    pub fn new(app_name: impl Into<String>, coordinator: Arc<Coordinator>) -> Self {
        Self {
            sessions: Arc::new(InMemorySessionService::new(app_name)),
            coordinator,
        }
    }

    pub fn sessions(&self) -> &InMemorySessionService {
        &self.sessions
    }
}

#[async_trait]
impl AgentEngine for LocalEngine {
    fn name(&self) -> &str {
        "local"
    }

    async fn create_session(&self, user_id: &UserId, state: &InitialState) -> Result<Session, EngineError> {
        Ok(self.sessions.create(user_id, state).await)
    }

    async fn list_sessions(&self, user_id: &UserId) -> Result<Vec<Session>, EngineError> {
        Ok(self.sessions.list(user_id).await)
    }

    async fn get_session(&self, user_id: &UserId, session_id: &SessionId) -> Result<Session, EngineError> {
        self.sessions.get(user_id, session_id).await
    }

    async fn delete_session(&self, user_id: &UserId, session_id: &SessionId) -> Result<(), EngineError> {
        self.sessions.delete(user_id, session_id).await
    }

    /// Record the user turn, dispatch it, and stream the handler's fragments.
    ///
    /// The model turn is recorded once the handler finishes, before the
    /// returned stream closes.
    async fn stream_query(
        &self,
        user_id: &UserId,
        session_id: &SessionId,
        envelope: Envelope,
    ) -> Result<EngineStream, EngineError> {
        let session = self.sessions.get(user_id, session_id).await?;
        let history = history_from(&session.events);
        let previous = previous_handler(&session.events);

        self.sessions
            .append(
                user_id,
                session_id,
                new_event(USER_AUTHOR, TurnRole::User, event_parts(&envelope)),
            )
            .await?;

        let ctx = HandlerContext::new(user_id.clone(), session_id.clone())
            .with_history(history)
            .with_previous(previous);
        let mut dispatch = self
            .coordinator
            .dispatch(Message::from_envelope(&envelope), ctx)
            .await;

        let (tx, rx) = mpsc::channel(64);
        let sessions = self.sessions.clone();
        let user_id = user_id.clone();
        let session_id = session_id.clone();
        tokio::spawn(async move {
            let handler = dispatch.handler;
            let mut reply = String::new();
            while let Some(event) = dispatch.stream.recv().await {
                match &event {
                    HandlerEvent::Chunk { content } => {
                        reply.push_str(content);
                        // A gone receiver only means nobody is listening; the
                        // turn is still recorded below.
                        let _ = tx.send(Ok(EngineChunk::text(&handler, content.as_str()))).await;
                    }
                    other => debug!(event = other.event_type(), handler = %handler, "Handler event"),
                }
            }

            if !reply.is_empty() {
                let event = new_event(&handler, TurnRole::Model, vec![EventPart::text(reply)]);
                if let Err(e) = sessions.append(&user_id, &session_id, event).await {
                    let _ = tx.send(Err(e)).await;
                }
            }
        });

        Ok(rx)
    }
}

/// Hands out [`LocalEngine`]s sharing one dispatcher.
pub struct LocalRegistry {
    app_name: String,
    coordinator: Arc<Coordinator>,
    deployments: RwLock<Vec<(DeploymentRecord, Arc<LocalEngine>)>>,
    next_id: AtomicU64,
}

impl LocalRegistry {
    pub fn new(app_name: impl Into<String>, coordinator: Arc<Coordinator>) -> Self {
        Self {
            app_name: app_name.into(),
            coordinator,
            deployments: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

#[async_trait]
impl DeploymentRegistry for LocalRegistry {
    fn name(&self) -> &str {
        "local"
    }

    async fn list(&self) -> Result<Vec<DeploymentRecord>, EngineError> {
        Ok(self
            .deployments
            .read()
            .await
            .iter()
            .map(|(record, _)| record.clone())
            .collect())
    }

    async fn create(&self) -> Result<DeploymentRecord, EngineError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let record = DeploymentRecord {
            resource_name: format!("local/reasoningEngines/{id}"),
            display_name: Some(self.app_name.clone()),
            create_time: Some(chrono::Utc::now().to_rfc3339()),
        };
        let engine = Arc::new(LocalEngine::new(&self.app_name, self.coordinator.clone()));
        self.deployments.write().await.push((record.clone(), engine));
        info!(resource_id = record.resource_id(), "Local deployment created");
        Ok(record)
    }

    async fn open(&self, record: &DeploymentRecord) -> Result<Arc<dyn AgentEngine>, EngineError> {
        self.deployments
            .read()
            .await
            .iter()
            .find(|(r, _)| r.resource_name == record.resource_name)
            .map(|(_, engine)| engine.clone() as Arc<dyn AgentEngine>)
            .ok_or_else(|| EngineError::NotFound(format!("deployment {}", record.resource_name)))
    }

    async fn delete(&self, record: &DeploymentRecord, _force: bool) -> Result<(), EngineError> {
        let mut deployments = self.deployments.write().await;
        let before = deployments.len();
        deployments.retain(|(r, _)| r.resource_name != record.resource_name);
        if deployments.len() == before {
            return Err(EngineError::NotFound(format!("deployment {}", record.resource_name)));
        }
        info!(resource_id = record.resource_id(), "Local deployment deleted");
        Ok(())
    }
}

//! In-process session store used by the local engine.
//!
//! Ids are uuids and `last_update_time` is epoch seconds, matching what the
//! managed store reports. Sessions keep their creation order, which is the
//! "native order" callers see before sorting.

use sahayak_core::error::EngineError;
use sahayak_core::session::{InitialState, Session, SessionEvent};
use sahayak_core::{SessionId, UserId};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

struct StoredSession {
    session: Session,
    state: InitialState,
}

pub struct InMemorySessionService {
    app_name: String,
    sessions: RwLock<HashMap<UserId, Vec<StoredSession>>>,
}

fn now_seconds() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

fn unknown(user_id: &UserId, session_id: &SessionId) -> EngineError {
    EngineError::NotFound(format!("session {session_id} of user {user_id}"))
}

impl InMemorySessionService {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub async fn create(&self, user_id: &UserId, state: &InitialState) -> Session {
        let session = Session {
            id: SessionId::new(uuid::Uuid::new_v4().to_string()),
            user_id: user_id.clone(),
            last_update_time: now_seconds(),
            app_name: Some(self.app_name.clone()),
            events: Vec::new(),
        };
        debug!(user_id = %user_id, session_id = %session.id, "Session created");
        self.sessions
            .write()
            .await
            .entry(user_id.clone())
            .or_default()
            .push(StoredSession {
                session: session.clone(),
                state: state.clone(),
            });
        session
    }

    /// Sessions of a user without their events, in creation order.
    pub async fn list(&self, user_id: &UserId) -> Vec<Session> {
        self.sessions
            .read()
            .await
            .get(user_id)
            .map(|stored| {
                stored
                    .iter()
                    .map(|s| Session {
                        events: Vec::new(),
                        ..s.session.clone()
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub async fn get(&self, user_id: &UserId, session_id: &SessionId) -> Result<Session, EngineError> {
        self.sessions
            .read()
            .await
            .get(user_id)
            .and_then(|stored| stored.iter().find(|s| &s.session.id == session_id))
            .map(|s| s.session.clone())
            .ok_or_else(|| unknown(user_id, session_id))
    }

    /// The state the session was created with.
    pub async fn state(&self, user_id: &UserId, session_id: &SessionId) -> Result<InitialState, EngineError> {
        self.sessions
            .read()
            .await
            .get(user_id)
            .and_then(|stored| stored.iter().find(|s| &s.session.id == session_id))
            .map(|s| s.state.clone())
            .ok_or_else(|| unknown(user_id, session_id))
    }

    pub async fn delete(&self, user_id: &UserId, session_id: &SessionId) -> Result<(), EngineError> {
        let mut sessions = self.sessions.write().await;
        let stored = sessions
            .get_mut(user_id)
            .ok_or_else(|| unknown(user_id, session_id))?;
        let before = stored.len();
        stored.retain(|s| &s.session.id != session_id);
        if stored.len() == before {
            return Err(unknown(user_id, session_id));
        }
        debug!(user_id = %user_id, session_id = %session_id, "Session deleted");
        Ok(())
    }

    /// Record a turn and bump the session's update time.
    pub async fn append(
        &self,
        user_id: &UserId,
        session_id: &SessionId,
        mut event: SessionEvent,
    ) -> Result<(), EngineError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(user_id)
            .and_then(|stored| stored.iter_mut().find(|s| &s.session.id == session_id))
            .map(|s| &mut s.session)
            .ok_or_else(|| unknown(user_id, session_id))?;

        let now = now_seconds().max(session.last_update_time);
        if event.timestamp == 0.0 {
            event.timestamp = now;
        }
        session.last_update_time = now;
        session.events.push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sahayak_core::session::{EventContent, EventPart};

    fn text_event(role: &str, text: &str) -> SessionEvent {
        SessionEvent {
            author: role.into(),
            content: Some(EventContent {
                role: Some(role.into()),
                parts: vec![EventPart::text(text)],
            }),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn sessions_are_scoped_per_user() {
        let service = InMemorySessionService::new("sahayak");
        let alice = UserId::from("alice");
        let bob = UserId::from("bob");
        let s = service.create(&alice, &InitialState::with_user_name("Asha")).await;

        assert_eq!(service.state(&alice, &s.id).await.unwrap().user_name, "Asha");
        assert_eq!(service.list(&alice).await.len(), 1);
        assert!(service.list(&bob).await.is_empty());
        assert!(matches!(
            service.get(&bob, &s.id).await,
            Err(EngineError::NotFound(_))
        ));
        assert_eq!(s.app_name.as_deref(), Some("sahayak"));
    }

    #[tokio::test]
    async fn append_keeps_order_and_bumps_update_time() {
        let service = InMemorySessionService::new("sahayak");
        let user = UserId::from("u1");
        let s = service.create(&user, &InitialState::DEFAULT).await;

        service.append(&user, &s.id, text_event("user", "hi")).await.unwrap();
        service.append(&user, &s.id, text_event("model", "hello")).await.unwrap();

        let stored = service.get(&user, &s.id).await.unwrap();
        assert_eq!(stored.events.len(), 2);
        assert_eq!(stored.events[0].author, "user");
        assert!(stored.last_update_time >= s.last_update_time);
        assert!(stored.events[1].timestamp >= stored.events[0].timestamp);

        // Listing leaves events out.
        assert!(service.list(&user).await[0].events.is_empty());
    }

    #[tokio::test]
    async fn deleting_twice_is_not_found() {
        let service = InMemorySessionService::new("sahayak");
        let user = UserId::from("u1");
        let s = service.create(&user, &InitialState::DEFAULT).await;

        service.delete(&user, &s.id).await.unwrap();
        assert!(matches!(
            service.delete(&user, &s.id).await,
            Err(EngineError::NotFound(_))
        ));
    }
}

//! Session store adapter over the active deployment's engine.
//!
//! Holds no session data itself; every call goes to the engine.

use sahayak_core::session::{
    self, DeleteOutcome, InitialState, Session, SessionMessage, SessionOverview,
};
use sahayak_core::{Error, Result, SessionId, UserId};
use std::sync::Arc;
use tracing::{info, warn};

use crate::deployment::DeploymentManager;

pub struct SessionManager {
    deployments: Arc<DeploymentManager>,
    initial_state: InitialState,
}

fn user_context(user_id: &UserId) -> String {
    format!("user_id={user_id}")
}

fn session_context(user_id: &UserId, session_id: &SessionId) -> String {
    format!("user_id={user_id} session_id={session_id}")
}

impl SessionManager {
    pub fn new(deployments: Arc<DeploymentManager>, initial_state: InitialState) -> Self {
        Self {
            deployments,
            initial_state,
        }
    }

    pub fn initial_state(&self) -> &InitialState {
        &self.initial_state
    }

    /// Create a session with the configured initial state.
    pub async fn create(&self, user_id: &UserId) -> Result<SessionId> {
        let engine = self.deployments.engine().await?;
        let session = engine
            .create_session(user_id, &self.initial_state)
            .await
            .map_err(|e| Error::upstream("session.create", user_context(user_id), e))?;
        info!(user_id = %user_id, session_id = %session.id, "Session created");
        Ok(session.id)
    }

    /// Sessions of a user, most recent first. Never empty: a user without
    /// sessions gets one created and the list is fetched again.
    pub async fn list(&self, user_id: &UserId) -> Result<Vec<Session>> {
        let engine = self.deployments.engine().await?;
        let fetch = || async {
            engine
                .list_sessions(user_id)
                .await
                .map_err(|e| Error::upstream("session.list", user_context(user_id), e))
        };

        let mut sessions = fetch().await?;
        if sessions.is_empty() {
            self.create(user_id).await?;
            info!(user_id = %user_id, "New session created for user without sessions");
            sessions = fetch().await?;
        }
        session::sort_most_recent_first(&mut sessions);
        Ok(sessions)
    }

    /// Text messages of a session, in event order.
    pub async fn get_messages(&self, user_id: &UserId, session_id: &SessionId) -> Result<Vec<SessionMessage>> {
        let engine = self.deployments.engine().await?;
        let stored = engine
            .get_session(user_id, session_id)
            .await
            .map_err(|e| Error::upstream("session.get", session_context(user_id, session_id), e))?;
        Ok(session::flatten_messages(&stored.events))
    }

    /// Best-effort delete. Failures are reported, never raised.
    pub async fn delete(&self, user_id: &UserId, session_id: &SessionId) -> DeleteOutcome {
        let result = match self.deployments.engine().await {
            Ok(engine) => engine
                .delete_session(user_id, session_id)
                .await
                .map_err(|e| Error::upstream("session.delete", session_context(user_id, session_id), e)),
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => {
                info!(user_id = %user_id, session_id = %session_id, "Session deleted");
                DeleteOutcome::Deleted
            }
            Err(e) => {
                warn!(user_id = %user_id, session_id = %session_id, error = %e, "Session delete failed");
                DeleteOutcome::IncorrectDetails
            }
        }
    }

    /// [`list`](Self::list) plus the messages of the most recent session.
    pub async fn list_with_latest_messages(&self, user_id: &UserId) -> Result<SessionOverview> {
        let sessions = self.list(user_id).await?;
        let messages = match sessions.first() {
            Some(latest) => self.get_messages(user_id, &latest.id).await?,
            None => Vec::new(),
        };
        Ok(SessionOverview { sessions, messages })
    }

    /// The most recent session of a user, created when there is none.
    pub async fn latest(&self, user_id: &UserId) -> Result<SessionId> {
        let sessions = self.list(user_id).await?;
        sessions
            .into_iter()
            .next()
            .map(|s| s.id)
            .ok_or_else(|| Error::not_found(format!("session of user {user_id}")))
    }
}

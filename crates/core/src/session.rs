//! Session domain types.
//!
//! Sessions and their events are owned by the remote session store; the core
//! only reads them back and reshapes them for callers.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;

use crate::content::InlineData;
use crate::identity::{SessionId, UserId};

/// A conversation thread as reported by the session store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: SessionId,

    pub user_id: UserId,

    /// Store-assigned timestamp (seconds) used for ordering.
    #[serde(default)]
    pub last_update_time: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,

    /// Store-owned turns. Only populated by `get`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<SessionEvent>,
}

/// Sort most recently updated first.
///
/// The sort is stable, so equal timestamps keep the store's native order.
pub fn sort_most_recent_first(sessions: &mut [Session]) {
    sessions.sort_by(|a, b| b.last_update_time.total_cmp(&a.last_update_time));
}

/// One turn recorded by the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionEvent {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub author: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<EventContent>,

    #[serde(default)]
    pub timestamp: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    #[serde(default)]
    pub parts: Vec<EventPart>,
}

/// A stored part. Unknown part kinds (function calls and the like) are
/// accepted and simply carry no text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

impl EventPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }
}

/// A flattened, caller-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMessage {
    pub role: String,
    pub message: String,
}

/// Role used when a stored event does not carry one.
pub const DEFAULT_EVENT_ROLE: &str = "model";

/// Flatten events into messages: one message per non-empty text part, in
/// event order. Events without text contribute nothing.
pub fn flatten_messages(events: &[SessionEvent]) -> Vec<SessionMessage> {
    let mut messages = Vec::new();
    for event in events {
        let Some(content) = &event.content else {
            continue;
        };
        let role = content.role.as_deref().unwrap_or(DEFAULT_EVENT_ROLE);
        for part in &content.parts {
            if let Some(text) = part.text.as_deref().filter(|t| !t.is_empty()) {
                messages.push(SessionMessage {
                    role: role.to_string(),
                    message: text.to_string(),
                });
            }
        }
    }
    messages
}

/// Sessions of a user plus the messages of the most recent one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionOverview {
    pub sessions: Vec<Session>,
    pub messages: Vec<SessionMessage>,
}

/// Outcome of a best-effort session deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    IncorrectDetails,
}

impl DeleteOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Deleted => "session deleted",
            Self::IncorrectDetails => "incorrect session details",
        }
    }
}

/// Initial state written into every new session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialState {
    #[serde(rename = "user name")]
    pub user_name: Cow<'static, str>,

    #[serde(rename = "to-do reminders")]
    pub todo_reminders: Vec<String>,

    #[serde(rename = "exam-important")]
    pub exam_important: Vec<String>,
}

impl InitialState {
    /// The fixed default shape: a display-name placeholder and two empty lists.
    pub const DEFAULT: InitialState = InitialState {
        user_name: Cow::Borrowed("user"),
        todo_reminders: Vec::new(),
        exam_important: Vec::new(),
    };

    pub fn with_user_name(name: impl Into<String>) -> Self {
        Self {
            user_name: Cow::Owned(name.into()),
            ..Self::DEFAULT
        }
    }
}

impl Default for InitialState {
    fn default() -> Self {
        Self::DEFAULT
    }
}

//! The uniform handler contract.

use async_trait::async_trait;
use sahayak_core::identity::{SessionId, UserId};
use sahayak_core::message::Message;
use sahayak_core::tool::ToolContext;
use tokio::sync::mpsc;

use crate::event::HandlerEvent;
use crate::intent::Intent;

/// Caller identity and conversation history for one handler turn.
///
/// `user_id` is the exact string the inbound request carried.
#[derive(Debug, Clone)]
pub struct HandlerContext {
    pub user_id: UserId,
    pub session_id: SessionId,
    /// Prior turns of the session, oldest first.
    pub history: Vec<Message>,
    /// The handler that produced the latest reply in the session, if any.
    pub previous: Option<Intent>,
}

impl HandlerContext {
    pub fn new(user_id: UserId, session_id: SessionId) -> Self {
        Self {
            user_id,
            session_id,
            history: Vec::new(),
            previous: None,
        }
    }

    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }

    pub fn with_previous(mut self, previous: Option<Intent>) -> Self {
        self.previous = previous;
        self
    }

    pub fn tool_context(&self) -> ToolContext {
        ToolContext::new(self.user_id.clone(), self.session_id.clone())
    }
}

/// A single-purpose responder.
///
/// Handlers never fail: tool and model failures are turned into a
/// user-facing fragment. The stream ends when `handle` returns and drops
/// `events`.
#[async_trait]
pub trait Handler: Send + Sync {
    fn name(&self) -> &str;

    async fn handle(&self, turn: Message, ctx: HandlerContext, events: mpsc::Sender<HandlerEvent>);
}

//! Handler streaming events.
//!
//! A handler reports progress as a sequence of [`HandlerEvent`]s over an
//! mpsc channel. Only `chunk` events carry user-facing text; the others are
//! for logs and the engine's own bookkeeping and never reach the user.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Events emitted while a handler works on a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HandlerEvent {
    /// User-facing text fragment, in arrival order.
    Chunk { content: String },

    /// The handler is calling a tool.
    ToolCall { id: String, name: String },

    /// Tool execution completed.
    ToolResult {
        id: String,
        name: String,
        success: bool,
    },

    /// The handler is finished; no further events follow.
    Done {
        handler: String,
        iterations: usize,
        tool_calls_made: usize,
    },
}

impl HandlerEvent {
    pub fn chunk(content: impl Into<String>) -> Self {
        Self::Chunk {
            content: content.into(),
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Chunk { .. } => "chunk",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResult { .. } => "tool_result",
            Self::Done { .. } => "done",
        }
    }

    pub fn as_chunk(&self) -> Option<&str> {
        match self {
            Self::Chunk { content } => Some(content),
            _ => None,
        }
    }
}

/// Stream of handler events. It ends when the handler drops its sender.
pub type HandlerStream = mpsc::Receiver<HandlerEvent>;

/// Drain a stream, concatenating chunk text in arrival order.
pub async fn collect_text(mut stream: HandlerStream) -> String {
    let mut text = String::new();
    while let Some(event) = stream.recv().await {
        if let Some(chunk) = event.as_chunk() {
            text.push_str(chunk);
        }
    }
    text
}

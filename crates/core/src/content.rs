//! Turn content: parts, envelopes and query hints.
//!
//! A turn is an ordered list of parts, each either text or inline binary
//! data. The envelope is what actually gets submitted to the agent runtime:
//! a bare string for text-only turns, or a structured `{role, parts}` turn
//! as soon as an attachment is involved.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Fallback media type for attachments whose type is unknown.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Base64 payload plus its media type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineData {
    /// Base64-encoded bytes.
    pub data: String,
    pub mime_type: String,
}

/// One content fragment of a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn inline(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self::InlineData {
            inline_data: InlineData {
                data: data.into(),
                mime_type: mime_type.into(),
            },
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            Self::InlineData { .. } => None,
        }
    }

    pub fn as_inline(&self) -> Option<&InlineData> {
        match self {
            Self::InlineData { inline_data } => Some(inline_data),
            Self::Text { .. } => None,
        }
    }
}

/// Who produced a turn, in the runtime's vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Model,
}

impl TurnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
        }
    }
}

/// A structured turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    pub role: TurnRole,
    pub parts: Vec<Part>,
}

/// A binary attachment that has already been fetched and encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Base64-encoded bytes.
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl Attachment {
    pub fn new(data: impl Into<String>, mime_type: Option<String>) -> Self {
        Self {
            data: data.into(),
            mime_type,
        }
    }
}

/// One outbound turn, ready for the agent runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Envelope {
    /// Text-only turn in its simple form.
    Text(String),
    Content(Content),
}

impl Envelope {
    /// Assemble a turn from optional text and an optional attachment.
    ///
    /// Text-only input yields the bare text. With an attachment the parts are
    /// always `[text?, inline_data]`, in that order. Fails with `EmptyInput`
    /// when neither non-empty text nor an attachment is present.
    pub fn build(text: Option<&str>, attachment: Option<Attachment>) -> Result<Self> {
        let text = text.filter(|t| !t.is_empty());

        match (text, attachment) {
            (None, None) => Err(Error::EmptyInput(
                "no message or attachment provided".into(),
            )),
            (Some(text), None) => Ok(Self::Text(text.to_string())),
            (text, Some(attachment)) => {
                let mut parts = Vec::with_capacity(2);
                if let Some(text) = text {
                    parts.push(Part::text(text));
                }
                let mime = attachment
                    .mime_type
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| OCTET_STREAM.to_string());
                parts.push(Part::inline(attachment.data, mime));
                Ok(Self::Content(Content {
                    role: TurnRole::User,
                    parts,
                }))
            }
        }
    }

    /// Concatenated text of the turn, attachments excluded.
    pub fn text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Content(content) => content
                .parts
                .iter()
                .filter_map(Part::as_text)
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// The turn as a list of parts.
    pub fn parts(&self) -> Vec<Part> {
        match self {
            Self::Text(text) => vec![Part::text(text.clone())],
            Self::Content(content) => content.parts.clone(),
        }
    }

    pub fn has_attachment(&self) -> bool {
        matches!(self, Self::Content(c) if c.parts.iter().any(|p| p.as_inline().is_some()))
    }
}

/// Optional audience/tone/complexity hints a caller can attach to a query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryHints {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_audience: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_tone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity_level: Option<String>,
}

impl QueryHints {
    pub fn is_empty(&self) -> bool {
        self.target_audience.is_empty()
            && self.response_tone.as_deref().is_none_or(str::is_empty)
            && self.complexity_level.as_deref().is_none_or(str::is_empty)
    }

    /// Append each present hint to the message on its own line.
    pub fn apply(&self, message: &str) -> String {
        let mut lines: Vec<String> = Vec::new();
        if !message.is_empty() {
            lines.push(message.to_string());
        }
        if !self.target_audience.is_empty() {
            lines.push(format!(
                "Target Audience will be: {}",
                self.target_audience.join(", ")
            ));
        }
        if let Some(tone) = self.response_tone.as_deref().filter(|t| !t.is_empty()) {
            lines.push(format!("Response Tone has to be: {tone}"));
        }
        if let Some(level) = self.complexity_level.as_deref().filter(|l| !l.is_empty()) {
            lines.push(format!("Complexity Level has to be: {level}"));
        }
        lines.join("\n")
    }
}

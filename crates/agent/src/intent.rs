//! Intent classification: which handler, if any, owns a turn.
//!
//! The delegation rules are ordered; the first one that matches wins and
//! anything matching none of them is general conversation. Classification is
//! pluggable behind [`IntentClassifier`]: [`ModelClassifier`] asks a language
//! model for a single label, [`KeywordClassifier`] applies the same rules with
//! plain substring checks.
//!
//! Follow-up turns stay with the handler that produced the previous reply:
//! "Class 5, CBSE" after the worksheet handler asked for the class is still
//! worksheet work, even though it names no rule on its own.

use async_trait::async_trait;
use sahayak_core::error::ProviderError;
use sahayak_core::message::Message;
use sahayak_core::provider::{Provider, ProviderRequest};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::handler::HandlerContext;

/// The routing decision for one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    ThoughtOfDay,
    LessonPlanner,
    ResourceScout,
    Worksheet,
    Answering,
    ConceptSimplifier,
    /// Matches no delegation rule; the coordinator answers itself.
    General,
}

impl Intent {
    /// Delegation targets in rule order.
    pub const ROUTED: [Intent; 6] = [
        Self::ThoughtOfDay,
        Self::LessonPlanner,
        Self::ResourceScout,
        Self::Worksheet,
        Self::Answering,
        Self::ConceptSimplifier,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::ThoughtOfDay => "thought_of_day",
            Self::LessonPlanner => "lesson_planner",
            Self::ResourceScout => "resource_scout",
            Self::Worksheet => "worksheet",
            Self::Answering => "answering",
            Self::ConceptSimplifier => "concept_simplifier",
            Self::General => "general",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ROUTED
            .into_iter()
            .chain([Self::General])
            .find(|i| i.label() == label)
    }

    /// The rule text shown to the classifying model.
    pub fn rule(self) -> &'static str {
        match self {
            Self::ThoughtOfDay => "anything about a thought or quote of the day",
            Self::LessonPlanner => {
                "scheduling extra classes, planning weekly lessons or managing calendar events"
            }
            Self::ResourceScout => {
                "fetching learning resources such as videos, study materials or articles"
            }
            Self::Worksheet => "making or creating a worksheet from a syllabus or concept",
            Self::Answering => "solving or answering a worksheet",
            Self::ConceptSimplifier => {
                "simplifying a concept, or describing an image or visual concept"
            }
            Self::General => "greetings, casual questions and anything else",
        }
    }

    /// Whether a follow-up to this handler's reply should stay with it.
    ///
    /// The thought of the day is one-shot and general conversation has no
    /// task to continue.
    pub fn holds_conversation(self) -> bool {
        !matches!(self, Self::ThoughtOfDay | Self::General)
    }

    /// Handlers that persist files under the caller's user id.
    pub fn persists_files(self) -> bool {
        matches!(self, Self::Worksheet | Self::Answering)
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Decides the intent of an inbound turn.
///
/// `ctx` carries the session history and the handler that answered last.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    fn name(&self) -> &str;

    async fn classify(&self, turn: &Message, ctx: &HandlerContext)
    -> Result<Intent, ProviderError>;
}

// --- Model-backed ---

/// Asks the model for exactly one label from the ordered rule list.
///
/// The most recent history turns travel with the request so the model can
/// tell a reply to a handler's question from a fresh request.
pub struct ModelClassifier {
    provider: Arc<dyn Provider>,
    model: String,
}

/// History turns sent along with a classification request.
const CLASSIFIER_HISTORY: usize = 6;

impl ModelClassifier {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    fn instruction(previous: Option<Intent>) -> String {
        let rules: String = Intent::ROUTED
            .iter()
            .enumerate()
            .map(|(i, intent)| format!("{}. {} -> {}\n", i + 1, intent.rule(), intent.label()))
            .collect();
        let base = format!(
            "You route requests for a school teaching assistant. Check these rules in order \
             and stop at the first that applies:\n{rules}\
             If none applies, the label is {general}. Only pick a rule when the user \
             explicitly asks for that service.\n\
             Reply with the label alone, no other words.",
            general = Intent::General.label()
        );
        match previous.filter(|p| p.holds_conversation()) {
            Some(previous) => format!(
                "{base}\nThe previous reply came from {label}. If the user is answering \
                 its question or continuing that task, the label is {label}.",
                label = previous.label()
            ),
            None => base,
        }
    }
}

/// Map raw model output onto an intent; unknown output is general conversation.
pub fn parse_label(output: &str) -> Intent {
    let normalized = output
        .trim()
        .trim_matches(|c: char| !c.is_ascii_alphanumeric())
        .to_ascii_lowercase()
        .replace([' ', '-'], "_");
    Intent::from_label(&normalized).unwrap_or(Intent::General)
}

#[async_trait]
impl IntentClassifier for ModelClassifier {
    fn name(&self) -> &str {
        "model"
    }

    async fn classify(
        &self,
        turn: &Message,
        ctx: &HandlerContext,
    ) -> Result<Intent, ProviderError> {
        let recent = ctx.history.len().saturating_sub(CLASSIFIER_HISTORY);
        let mut messages = Vec::with_capacity(CLASSIFIER_HISTORY + 2);
        messages.push(Message::system(Self::instruction(ctx.previous)));
        messages.extend(ctx.history[recent..].iter().cloned());
        messages.push(turn.clone());

        let request = ProviderRequest::new(self.model.clone(), messages)
            .with_temperature(0.0)
            .with_max_tokens(Some(16));

        let response = self.provider.complete(request).await?;
        let intent = parse_label(&response.message.content);
        debug!(
            raw = %response.message.content,
            %intent,
            history = ctx.history.len() - recent,
            "Model classification"
        );
        Ok(intent)
    }
}

// --- Keyword rules ---

/// Phrases asking for a worksheet to be answered.
///
/// Kept apart from a bare "answer" so that "short answer questions" still
/// reads as a request to make a worksheet.
const ANSWER_CUES: &[&str] = &[
    "solve",
    "answer the",
    "answer this",
    "answers for",
    "answers to",
    "answer key",
    "solution to",
    "solution for",
    "solutions to",
    "solutions for",
];

struct Rule {
    intent: Intent,
    any: &'static [&'static str],
    /// When non-empty, one of these must appear as well.
    requires: &'static [&'static str],
    unless: &'static [&'static str],
}

impl Rule {
    fn matches(&self, text: &str) -> bool {
        let has = |words: &[&str]| words.iter().any(|w| text.contains(w));
        has(self.any)
            && (self.requires.is_empty() || has(self.requires))
            && !has(self.unless)
    }
}

const RULES: [Rule; 6] = [
    Rule {
        intent: Intent::ThoughtOfDay,
        any: &[
            "thought of the day",
            "thought for the day",
            "quote of the day",
            "quote for the day",
            "special about today",
            "today's speciality",
        ],
        requires: &[],
        unless: &[],
    },
    Rule {
        intent: Intent::LessonPlanner,
        any: &[
            "calendar",
            "schedule",
            "lesson plan",
            "timetable",
            "extra class",
            "appointment",
            "meeting",
            "weekly plan",
        ],
        requires: &[],
        unless: &[],
    },
    Rule {
        intent: Intent::ResourceScout,
        any: &[
            "resource",
            "video",
            "youtube",
            "article",
            "study material",
            "reading material",
        ],
        requires: &[],
        unless: &[],
    },
    Rule {
        intent: Intent::Worksheet,
        any: &["worksheet", "question paper", "practice questions"],
        requires: &[],
        unless: ANSWER_CUES,
    },
    Rule {
        intent: Intent::Answering,
        any: ANSWER_CUES,
        requires: &["worksheet", "question paper", "sheet"],
        unless: &[],
    },
    Rule {
        intent: Intent::ConceptSimplifier,
        any: &[
            "simplify",
            "explain",
            "describe",
            "in simple words",
            "help me understand",
        ],
        requires: &[],
        unless: &[],
    },
];

/// Deterministic rule evaluation, for offline use and tests.
///
/// A turn carrying only an attachment goes to the concept simplifier. A turn
/// that matches no rule stays with the previous handler when that handler
/// holds the conversation.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn classify_text(text: &str, has_attachment: bool) -> Intent {
        let text = text.to_lowercase();
        if let Some(rule) = RULES.iter().find(|r| r.matches(&text)) {
            return rule.intent;
        }
        if has_attachment && text.trim().is_empty() {
            return Intent::ConceptSimplifier;
        }
        Intent::General
    }
}

#[async_trait]
impl IntentClassifier for KeywordClassifier {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn classify(
        &self,
        turn: &Message,
        ctx: &HandlerContext,
    ) -> Result<Intent, ProviderError> {
        let intent = Self::classify_text(&turn.content, !turn.attachments.is_empty());
        match ctx.previous {
            Some(previous) if intent == Intent::General && previous.holds_conversation() => {
                debug!(%previous, "Follow-up stays with the previous handler");
                Ok(previous)
            }
            _ => Ok(intent),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::SequentialMockProvider;
    use sahayak_core::identity::{SessionId, UserId};

    fn ctx() -> HandlerContext {
        HandlerContext::new(UserId::from("t1"), SessionId::from("s1"))
    }

    #[test]
    fn labels_round_trip() {
        for intent in Intent::ROUTED.into_iter().chain([Intent::General]) {
            assert_eq!(Intent::from_label(intent.label()), Some(intent));
        }
        assert_eq!(Intent::from_label("manager"), None);
    }

    #[test]
    fn model_output_is_normalized() {
        assert_eq!(parse_label("worksheet"), Intent::Worksheet);
        assert_eq!(parse_label("  `Lesson_Planner`.\n"), Intent::LessonPlanner);
        assert_eq!(parse_label("concept simplifier"), Intent::ConceptSimplifier);
        assert_eq!(parse_label("Thought-of-day"), Intent::ThoughtOfDay);
    }

    #[test]
    fn unknown_model_output_is_general() {
        assert_eq!(parse_label(""), Intent::General);
        assert_eq!(parse_label("I think this is about worksheets"), Intent::General);
        assert_eq!(parse_label("attendance"), Intent::General);
    }

    #[test]
    fn keyword_rules_follow_order() {
        let cases = [
            ("Give me the thought of the day", Intent::ThoughtOfDay),
            ("Schedule an extra class on Friday at 10", Intent::LessonPlanner),
            ("Find videos on photosynthesis for class 7", Intent::ResourceScout),
            ("Create a worksheet on fractions for class 5 CBSE", Intent::Worksheet),
            ("Please solve this worksheet", Intent::Answering),
            ("Answer the questions in this worksheet", Intent::Answering),
            ("Give me the answer key for this question paper", Intent::Answering),
            (
                "Create a worksheet with short answer questions on plants for class 5 CBSE",
                Intent::Worksheet,
            ),
            ("Make a question paper with one-word answers", Intent::Worksheet),
            ("Explain Newton's third law to class 8", Intent::ConceptSimplifier),
            ("Hello, how are you?", Intent::General),
        ];
        for (text, expected) in cases {
            assert_eq!(KeywordClassifier::classify_text(text, false), expected, "{text}");
        }
    }

    #[test]
    fn earlier_rule_wins_when_several_match() {
        // Mentions both a schedule and a worksheet; the calendar rule comes first.
        assert_eq!(
            KeywordClassifier::classify_text("Schedule time to create a worksheet", false),
            Intent::LessonPlanner
        );
    }

    #[test]
    fn bare_answer_request_is_not_answering() {
        assert_eq!(
            KeywordClassifier::classify_text("Can you answer a quick question?", false),
            Intent::General
        );
    }

    #[test]
    fn attachment_only_goes_to_simplifier() {
        assert_eq!(KeywordClassifier::classify_text("", true), Intent::ConceptSimplifier);
        assert_eq!(KeywordClassifier::classify_text("", false), Intent::General);
    }

    #[tokio::test]
    async fn follow_up_stays_with_previous_handler() {
        let ctx = ctx().with_previous(Some(Intent::Worksheet));
        let intent = KeywordClassifier
            .classify(&Message::user("Class 5, CBSE"), &ctx)
            .await
            .unwrap();
        assert_eq!(intent, Intent::Worksheet);
    }

    #[tokio::test]
    async fn new_request_overrides_previous_handler() {
        let ctx = ctx().with_previous(Some(Intent::Worksheet));
        let intent = KeywordClassifier
            .classify(&Message::user("Schedule an extra class on Monday"), &ctx)
            .await
            .unwrap();
        assert_eq!(intent, Intent::LessonPlanner);
    }

    #[tokio::test]
    async fn one_shot_handlers_do_not_hold_the_conversation() {
        for previous in [Intent::ThoughtOfDay, Intent::General] {
            let ctx = ctx().with_previous(Some(previous));
            let intent = KeywordClassifier
                .classify(&Message::user("thanks!"), &ctx)
                .await
                .unwrap();
            assert_eq!(intent, Intent::General, "{previous}");
        }
    }

    #[tokio::test]
    async fn model_classifier_sees_recent_history() {
        let provider = Arc::new(SequentialMockProvider::single_text("worksheet"));
        let classifier = ModelClassifier::new(provider.clone(), "mock-model");
        let history: Vec<Message> = (0..10)
            .map(|i| {
                if i % 2 == 0 {
                    Message::user(format!("turn {i}"))
                } else {
                    Message::assistant(format!("reply {i}"))
                }
            })
            .collect();
        let ctx = ctx()
            .with_history(history)
            .with_previous(Some(Intent::Worksheet));

        let intent = classifier
            .classify(&Message::user("Class 5, CBSE"), &ctx)
            .await
            .unwrap();
        assert_eq!(intent, Intent::Worksheet);

        let request = provider.last_request().unwrap();
        assert_eq!(request.messages.len(), CLASSIFIER_HISTORY + 2);
        assert!(
            request.messages[0]
                .content
                .contains("The previous reply came from worksheet")
        );
        assert_eq!(request.messages[1].content, "turn 4");
        assert_eq!(request.messages[CLASSIFIER_HISTORY].content, "reply 9");
        assert_eq!(request.messages.last().unwrap().content, "Class 5, CBSE");
    }

    #[tokio::test]
    async fn model_classifier_sends_rules_and_turn() {
        let provider = Arc::new(SequentialMockProvider::single_text("resource_scout"));
        let classifier = ModelClassifier::new(provider.clone(), "mock-model");

        let intent = classifier
            .classify(&Message::user("videos about volcanoes please"), &ctx())
            .await
            .unwrap();
        assert_eq!(intent, Intent::ResourceScout);

        let request = provider.last_request().unwrap();
        assert_eq!(request.messages.len(), 2);
        assert!(request.messages[0].content.contains("1. anything about a thought"));
        assert!(request.messages[0].content.contains("-> concept_simplifier"));
        assert!(!request.messages[0].content.contains("previous reply"));
        assert_eq!(request.messages[1].content, "videos about volcanoes please");
    }
}

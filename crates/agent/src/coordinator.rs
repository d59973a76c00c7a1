//! The dispatcher: classify a turn, then hand it to exactly one handler.
//!
//! ```text
//! Idle → Classifying → Delegated(intent) ─┐
//!                    → DirectReply ───────┴→ Streaming → Done
//! ```
//!
//! Delegation is one-shot: the chosen handler's fragments are the turn's
//! reply. The handler always receives the caller's context unchanged.

use sahayak_config::AppConfig;
use sahayak_core::message::Message;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::event::HandlerStream;
use crate::handler::{Handler, HandlerContext};
use crate::intent::{Intent, IntentClassifier, KeywordClassifier, ModelClassifier};
use crate::specialists::{self, HandlerDeps};

/// Phases of one turn, logged as the turn moves through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Idle,
    Classifying,
    Delegated(Intent),
    DirectReply,
    Streaming,
    Done,
}

fn enter(phase: TurnPhase, ctx: &HandlerContext) {
    debug!(?phase, user_id = %ctx.user_id, session_id = %ctx.session_id, "Turn phase");
}

/// A routed turn: who got it and the stream of its reply.
pub struct Dispatch {
    pub intent: Intent,
    pub handler: String,
    pub stream: HandlerStream,
}

pub struct Coordinator {
    classifier: Arc<dyn IntentClassifier>,
    handlers: HashMap<Intent, Arc<dyn Handler>>,
    direct: Arc<dyn Handler>,
}

impl Coordinator {
    /// `direct` answers general conversation and any intent without a handler.
    pub fn new(classifier: Arc<dyn IntentClassifier>, direct: Arc<dyn Handler>) -> Self {
        Self {
            classifier,
            handlers: HashMap::new(),
            direct,
        }
    }

    pub fn with_handler(mut self, intent: Intent, handler: Arc<dyn Handler>) -> Self {
        self.handlers.insert(intent, handler);
        self
    }

    pub fn with_handlers(mut self, handlers: HashMap<Intent, Arc<dyn Handler>>) -> Self {
        self.handlers.extend(handlers);
        self
    }

    /// The full dispatcher: configured classifier, six specialists and the
    /// direct reply.
    pub fn from_config(config: &AppConfig, deps: &HandlerDeps) -> Self {
        let classifier: Arc<dyn IntentClassifier> = match config.routing.classifier.as_str() {
            "keyword" => Arc::new(KeywordClassifier),
            _ => {
                let (model, _) = config.handler_model("classifier");
                Arc::new(ModelClassifier::new(deps.provider.clone(), model))
            }
        };
        info!(classifier = classifier.name(), "Dispatcher ready");
        Self::new(classifier, Arc::new(specialists::general(config, deps)))
            .with_handlers(specialists::build_handlers(config, deps))
    }

    pub fn classifier_name(&self) -> &str {
        self.classifier.name()
    }

    /// Classify a turn against its session context. A classifier failure
    /// counts as general conversation.
    pub async fn route(&self, turn: &Message, ctx: &HandlerContext) -> Intent {
        match self.classifier.classify(turn, ctx).await {
            Ok(intent) => intent,
            Err(e) => {
                warn!(classifier = self.classifier.name(), error = %e, "Classification failed, answering directly");
                Intent::General
            }
        }
    }

    fn handler_for(&self, intent: Intent) -> Option<&Arc<dyn Handler>> {
        match intent {
            Intent::General => None,
            routed => self.handlers.get(&routed),
        }
    }

    /// Route one turn and start its handler.
    ///
    /// Returns as soon as the handler is running; the reply arrives on the
    /// returned stream, which ends when the handler finishes.
    pub async fn dispatch(&self, turn: Message, ctx: HandlerContext) -> Dispatch {
        enter(TurnPhase::Idle, &ctx);
        enter(TurnPhase::Classifying, &ctx);
        let intent = self.route(&turn, &ctx).await;

        let handler = match self.handler_for(intent) {
            Some(handler) => {
                enter(TurnPhase::Delegated(intent), &ctx);
                handler.clone()
            }
            None => {
                if intent != Intent::General {
                    warn!(%intent, "No handler registered, answering directly");
                }
                enter(TurnPhase::DirectReply, &ctx);
                self.direct.clone()
            }
        };
        info!(
            user_id = %ctx.user_id,
            session_id = %ctx.session_id,
            %intent,
            handler = handler.name(),
            "Turn routed"
        );

        let name = handler.name().to_string();
        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(async move {
            enter(TurnPhase::Streaming, &ctx);
            let done_ctx = ctx.clone();
            handler.handle(turn, ctx, tx).await;
            enter(TurnPhase::Done, &done_ctx);
        });

        Dispatch {
            intent,
            handler: name,
            stream: rx,
        }
    }
}

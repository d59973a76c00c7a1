//! The six specialized handlers and the coordinator's own direct reply.
//!
//! Every specialist is the same machine: an [`AgentLoop`] with its own
//! instruction and tool set, plus a [`Finish`] rule that shapes the final
//! text. What differs per handler is data, assembled in [`build_handlers`].

mod thought;

pub use thought::ThoughtOfDay;

use async_trait::async_trait;
use sahayak_config::AppConfig;
use sahayak_core::message::Message;
use sahayak_core::provider::Provider;
use sahayak_core::storage::ObjectStore;
use sahayak_core::tool::{ToolRegistry, ToolResult};
use sahayak_tools::{
    Calendar, ClockTool, CreateEventTool, DeleteEventTool, DocumentKind, DocumentRenderer,
    EditEventTool, ListEventsTool, PublishDocumentTool, TodaySpecialityTool, VideoSearchTool,
    WebSearchTool, offset_from_minutes,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::event::HandlerEvent;
use crate::handler::{Handler, HandlerContext};
use crate::intent::Intent;
use crate::loop_runner::AgentLoop;

/// Fragment sent when the model itself cannot be reached.
pub const PROVIDER_FAILURE_REPLY: &str =
    "Sorry, I am unable to help with that right now. Please try again in a little while.";

const COORDINATOR: &str = include_str!("../../prompts/coordinator.md");
const THOUGHT_OF_DAY: &str = include_str!("../../prompts/thought_of_day.md");
const LESSON_PLANNER: &str = include_str!("../../prompts/lesson_planner.md");
const RESOURCE_SCOUT: &str = include_str!("../../prompts/resource_scout.md");
const WORKSHEET: &str = include_str!("../../prompts/worksheet.md");
const ANSWERING: &str = include_str!("../../prompts/answering.md");
const CONCEPT_SIMPLIFIER: &str = include_str!("../../prompts/concept_simplifier.md");

/// How a specialist turns its loop outcome into the reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finish {
    /// The model's answer as written.
    Reply,
    /// Once a document was published, the reply is the lead text and its one
    /// link, whatever the model wrote. Before that (clarifying questions) the
    /// model's answer stands.
    DownloadLink { lead: &'static str },
    /// Normalize the first matching JSON object into a [`ThoughtOfDay`].
    ThoughtRecord,
}

impl Finish {
    fn shape(self, answer: String, observations: &[ToolResult]) -> String {
        match self {
            Self::Reply => answer,
            Self::DownloadLink { lead } => match published_link(observations) {
                Some(link) => format!("{lead} {link}"),
                None => answer,
            },
            Self::ThoughtRecord => ThoughtOfDay::parse(&answer)
                .and_then(|record| serde_json::to_string_pretty(&record).ok())
                .unwrap_or(answer),
        }
    }
}

fn published_link(observations: &[ToolResult]) -> Option<&str> {
    observations
        .iter()
        .rev()
        .filter(|o| o.success)
        .find_map(|o| o.data.as_ref()?.get("link")?.as_str())
}

/// A bounded single-purpose responder built on the tool loop.
pub struct Specialist {
    name: String,
    agent: AgentLoop,
    finish: Finish,
}

impl Specialist {
    pub fn new(name: impl Into<String>, agent: AgentLoop, finish: Finish) -> Self {
        Self {
            name: name.into(),
            agent,
            finish,
        }
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.agent.tools().names()
    }
}

/// Send `text` as line-sized fragments. Concatenating them restores `text`.
async fn emit(events: &mpsc::Sender<HandlerEvent>, text: &str) {
    for piece in text.split_inclusive('\n') {
        if events.send(HandlerEvent::chunk(piece)).await.is_err() {
            debug!("Handler stream receiver dropped");
            return;
        }
    }
}

#[async_trait]
impl Handler for Specialist {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, turn: Message, ctx: HandlerContext, events: mpsc::Sender<HandlerEvent>) {
        let (text, iterations, tool_calls_made) = match self.agent.run(&turn, &ctx, &events).await {
            Ok(outcome) => (
                self.finish.shape(outcome.answer, &outcome.observations),
                outcome.iterations,
                outcome.tool_calls_made,
            ),
            Err(e) => {
                warn!(handler = %self.name, user_id = %ctx.user_id, error = %e, "Handler model call failed");
                (PROVIDER_FAILURE_REPLY.to_string(), 0, 0)
            }
        };

        emit(&events, &text).await;
        let _ = events
            .send(HandlerEvent::Done {
                handler: self.name.clone(),
                iterations,
                tool_calls_made,
            })
            .await;
    }
}

/// Everything the specialists' tools need from the process context.
#[derive(Clone)]
pub struct HandlerDeps {
    pub provider: Arc<dyn Provider>,
    pub store: Arc<dyn ObjectStore>,
    pub renderer: Arc<dyn DocumentRenderer>,
    pub calendar: Calendar,
}

fn agent_for(config: &AppConfig, name: &str, instruction: &str, deps: &HandlerDeps) -> AgentLoop {
    let (model, temperature) = config.handler_model(name);
    AgentLoop::new(deps.provider.clone(), model, instruction)
        .with_temperature(temperature)
        .with_max_tokens(config.model.max_tokens)
        .with_max_iterations(config.routing.max_tool_iterations)
}

/// The coordinator's direct reply for general conversation.
pub fn general(config: &AppConfig, deps: &HandlerDeps) -> Specialist {
    let name = Intent::General.label();
    Specialist::new(name, agent_for(config, name, COORDINATOR, deps), Finish::Reply)
}

/// The specialist for one routed intent. `General` yields the direct reply.
pub fn specialist(intent: Intent, config: &AppConfig, deps: &HandlerDeps) -> Specialist {
    let name = intent.label();
    let offset = offset_from_minutes(config.tools.utc_offset_minutes);
    let tools = &config.tools;

    let (instruction, registry, finish) = match intent {
        Intent::ThoughtOfDay => (
            THOUGHT_OF_DAY,
            ToolRegistry::new()
                .with(Box::new(TodaySpecialityTool::new(&tools.speciality_url)))
                .with(Box::new(ClockTool::new(offset))),
            Finish::ThoughtRecord,
        ),
        Intent::LessonPlanner => (
            LESSON_PLANNER,
            ToolRegistry::new()
                .with(Box::new(ListEventsTool::new(deps.calendar.clone())))
                .with(Box::new(CreateEventTool::new(deps.calendar.clone())))
                .with(Box::new(EditEventTool::new(deps.calendar.clone())))
                .with(Box::new(DeleteEventTool::new(deps.calendar.clone())))
                .with(Box::new(ClockTool::new(offset))),
            Finish::Reply,
        ),
        Intent::ResourceScout => (
            RESOURCE_SCOUT,
            ToolRegistry::new()
                .with(Box::new(WebSearchTool::new(&tools.duckduckgo_url, tools.search_results)))
                .with(Box::new(VideoSearchTool::new(
                    &tools.youtube_url,
                    tools.youtube_api_key.clone(),
                    tools.search_results,
                ))),
            Finish::Reply,
        ),
        Intent::Worksheet => (
            WORKSHEET,
            ToolRegistry::new().with(Box::new(PublishDocumentTool::new(
                DocumentKind::Worksheet,
                deps.store.clone(),
                deps.renderer.clone(),
                offset,
            ))),
            Finish::DownloadLink {
                lead: "Your worksheet is ready. Download it here:",
            },
        ),
        Intent::Answering => (
            ANSWERING,
            ToolRegistry::new().with(Box::new(PublishDocumentTool::new(
                DocumentKind::Answers,
                deps.store.clone(),
                deps.renderer.clone(),
                offset,
            ))),
            Finish::DownloadLink {
                lead: "Your worksheet has been solved. The answers are available for download here:",
            },
        ),
        Intent::ConceptSimplifier => (CONCEPT_SIMPLIFIER, ToolRegistry::new(), Finish::Reply),
        Intent::General => return general(config, deps),
    };

    Specialist::new(
        name,
        agent_for(config, name, instruction, deps).with_tools(registry),
        finish,
    )
}

/// One handler per routed intent.
pub fn build_handlers(config: &AppConfig, deps: &HandlerDeps) -> HashMap<Intent, Arc<dyn Handler>> {
    Intent::ROUTED
        .into_iter()
        .map(|intent| {
            let handler: Arc<dyn Handler> = Arc::new(specialist(intent, config, deps));
            (intent, handler)
        })
        .collect()
}

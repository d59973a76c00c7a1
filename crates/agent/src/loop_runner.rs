//! The tool-calling loop every handler runs on.
//!
//! 1. Build the request: composed instruction, session history, the turn
//! 2. Send it to the provider
//! 3. If tool calls come back: execute them, append the results, go to 2
//! 4. If text comes back: that is the answer
//!
//! Tool failures are fed back to the model as `Error: ...` observations so
//! it can recover or apologise. Provider failures end the loop with `Err`.

use sahayak_core::error::ProviderError;
use sahayak_core::message::Message;
use sahayak_core::provider::{Provider, ProviderRequest};
use sahayak_core::tool::{ToolCall, ToolRegistry, ToolResult};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::event::HandlerEvent;
use crate::handler::HandlerContext;
use crate::policy;

/// Reply used when the model keeps calling tools past the iteration limit.
pub const ITERATION_LIMIT_REPLY: &str =
    "I could not finish this request. Could you rephrase it or break it into smaller steps?";

/// What a finished loop produced.
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    /// The model's final text.
    pub answer: String,
    /// Results of tool calls that executed, in call order.
    pub observations: Vec<ToolResult>,
    pub iterations: usize,
    pub tool_calls_made: usize,
}

pub struct AgentLoop {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    tools: Arc<ToolRegistry>,
    instruction: String,
    max_iterations: usize,
}

impl AgentLoop {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        instruction: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
            tools: Arc::new(ToolRegistry::new()),
            instruction: instruction.into(),
            max_iterations: 8,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = Arc::new(tools);
        self
    }

    /// Set the maximum number of model round trips per turn.
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// The instruction with the shared conduct policies appended.
    pub fn system_prompt(&self) -> String {
        policy::compose(&self.instruction)
    }

    pub async fn run(
        &self,
        turn: &Message,
        ctx: &HandlerContext,
        events: &mpsc::Sender<HandlerEvent>,
    ) -> Result<LoopOutcome, ProviderError> {
        let mut messages = Vec::with_capacity(ctx.history.len() + 2);
        messages.push(Message::system(self.system_prompt()));
        messages.extend(ctx.history.iter().cloned());
        messages.push(turn.clone());

        let tool_definitions = self.tools.definitions();
        let tool_ctx = ctx.tool_context();
        let mut observations = Vec::new();
        let mut tool_calls_made = 0;

        for iteration in 1..=self.max_iterations {
            debug!(session_id = %ctx.session_id, iteration, "Handler loop iteration");

            let request = ProviderRequest::new(self.model.clone(), messages.clone())
                .with_temperature(self.temperature)
                .with_max_tokens(self.max_tokens)
                .with_tools(tool_definitions.clone());

            let response = self.provider.complete(request).await?;

            if response.message.tool_calls.is_empty() {
                return Ok(LoopOutcome {
                    answer: response.message.content,
                    observations,
                    iterations: iteration,
                    tool_calls_made,
                });
            }

            debug!(
                tool_count = response.message.tool_calls.len(),
                "Executing tool calls"
            );

            let tool_calls = response.message.tool_calls.clone();
            messages.push(response.message);

            for tc in &tool_calls {
                tool_calls_made += 1;
                let call = ToolCall {
                    id: tc.id.clone(),
                    name: tc.name.clone(),
                    arguments: serde_json::from_str(&tc.arguments).unwrap_or_default(),
                };
                let _ = events
                    .send(HandlerEvent::ToolCall {
                        id: tc.id.clone(),
                        name: tc.name.clone(),
                    })
                    .await;

                let (output, success) = match self.tools.execute(&call, &tool_ctx).await {
                    Ok(result) => {
                        let reply = (result.output.clone(), result.success);
                        observations.push(result);
                        reply
                    }
                    Err(e) => {
                        warn!(tool = %tc.name, error = %e, "Tool execution failed");
                        (format!("Error: {e}"), false)
                    }
                };

                let _ = events
                    .send(HandlerEvent::ToolResult {
                        id: tc.id.clone(),
                        name: tc.name.clone(),
                        success,
                    })
                    .await;
                messages.push(Message::tool_result(&tc.id, output).with_tool_name(&tc.name));
            }
        }

        warn!(
            session_id = %ctx.session_id,
            max_iterations = self.max_iterations,
            "Max tool iterations reached"
        );
        Ok(LoopOutcome {
            answer: ITERATION_LIMIT_REPLY.into(),
            observations,
            iterations: self.max_iterations,
            tool_calls_made,
        })
    }
}

//! Routing and handlers for Sahayak.
//!
//! One turn flows through here as:
//!
//! 1. **Classify** the turn into an [`Intent`] (model-backed or keyword rules)
//! 2. **Dispatch** it to exactly one specialist, or answer directly
//! 3. **Run** the specialist's tool loop: model call, tool calls, observations
//! 4. **Stream** the reply back as [`HandlerEvent::Chunk`] fragments
//!
//! Every handler prompt carries the school guardrails and the
//! language-mirroring policy from [`policy`].

pub mod coordinator;
pub mod event;
pub mod handler;
pub mod intent;
pub mod loop_runner;
pub mod policy;
pub mod specialists;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use coordinator::{Coordinator, Dispatch, TurnPhase};
pub use event::{HandlerEvent, HandlerStream, collect_text};
pub use handler::{Handler, HandlerContext};
pub use intent::{Intent, IntentClassifier, KeywordClassifier, ModelClassifier};
pub use loop_runner::{AgentLoop, LoopOutcome};
pub use specialists::{Finish, HandlerDeps, Specialist, ThoughtOfDay};

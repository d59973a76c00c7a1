//! # Sahayak Runtime
//!
//! Where a turn meets an agent engine:
//!
//! - [`local`]: the dispatcher in this process over an in-memory session service
//! - [`vertex`]: deployed reasoning engines over REST
//! - [`DeploymentManager`]: the one active deployment of the process
//! - [`SessionManager`]: the session store adapter
//! - [`Assistant`]: relocate, build the envelope, stream, aggregate
//! - [`AppContext`]: all of the above, built once at startup

pub mod assistant;
pub mod context;
pub mod deployment;
pub mod local;
pub mod sessions;
pub mod vertex;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use assistant::{AttachmentSource, Assistant, QueryReply, QueryRequest, ReplyAttachments};
pub use context::AppContext;
pub use deployment::{ActiveDeployment, DeploymentManager, DeploymentStatus};
pub use local::{InMemorySessionService, LocalEngine, LocalRegistry};
pub use sessions::SessionManager;
pub use vertex::{VertexEngine, VertexRegistry};

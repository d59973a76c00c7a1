//! The process-wide context, built once at startup and passed explicitly.

use sahayak_agent::{Coordinator, HandlerDeps};
use sahayak_config::AppConfig;
use sahayak_core::engine::DeploymentRegistry;
use sahayak_core::session::InitialState;
use sahayak_core::storage::ObjectStore;
use sahayak_core::{Error, Result};
use sahayak_google::AuthorizedClient;
use sahayak_storage::AttachmentRelocator;
use sahayak_tools::{Calendar, PlainTextRenderer};
use std::sync::Arc;
use tracing::info;

use crate::assistant::Assistant;
use crate::deployment::DeploymentManager;
use crate::local::LocalRegistry;
use crate::sessions::SessionManager;
use crate::vertex::VertexRegistry;

pub struct AppContext {
    pub config: AppConfig,
    pub store: Arc<dyn ObjectStore>,
    pub calendar: Calendar,
    pub deployments: Arc<DeploymentManager>,
    pub sessions: Arc<SessionManager>,
    pub assistant: Arc<Assistant>,
}

impl AppContext {
    /// Build every collaborator named by `config`.
    ///
    /// Nothing remote is contacted here; call [`start`](Self::start) to
    /// resolve the deployment.
    pub fn from_config(config: AppConfig) -> Result<Self> {
        config.validate().map_err(|e| Error::Config {
            message: e.to_string(),
        })?;

        let tokens = sahayak_google::token_source_from_config(&config.auth);
        let provider = sahayak_providers::build_from_config(&config, tokens.clone())
            .default()
            .ok_or_else(|| Error::Config {
                message: format!("no provider registered for '{}'", config.model.provider),
            })?;
        let store = sahayak_storage::store_from_config(&config.storage, tokens.clone())?;
        let calendar = sahayak_tools::calendar_from_config(&config.tools, tokens.clone());

        let deps = HandlerDeps {
            provider,
            store,
            renderer: Arc::new(PlainTextRenderer),
            calendar,
        };

        let registry: Arc<dyn DeploymentRegistry> = match config.engine.backend.as_str() {
            "vertex" => {
                info!(
                    project = %config.engine.project,
                    location = %config.engine.location,
                    "Using Vertex reasoning engines"
                );
                Arc::new(VertexRegistry::new(AuthorizedClient::new(tokens), &config.engine))
            }
            _ => {
                info!(classifier = %config.routing.classifier, "Using in-process agent engine");
                let coordinator = Arc::new(Coordinator::from_config(&config, &deps));
                Arc::new(LocalRegistry::new(config.app_name.clone(), coordinator))
            }
        };

        Ok(Self::with_parts(config, deps, registry))
    }

    /// Assemble the context from already built parts.
    pub fn with_parts(config: AppConfig, deps: HandlerDeps, registry: Arc<dyn DeploymentRegistry>) -> Self {
        let deployments = Arc::new(DeploymentManager::new(registry));
        let initial_state = InitialState::with_user_name(config.session.initial_user_name.clone());
        let sessions = Arc::new(SessionManager::new(deployments.clone(), initial_state));
        let assistant = Arc::new(Assistant::new(
            deployments.clone(),
            sessions.clone(),
            AttachmentRelocator::new(deps.store.clone()),
        ));
        Self {
            config,
            store: deps.store,
            calendar: deps.calendar,
            deployments,
            sessions,
            assistant,
        }
    }

    /// Adopt or create the deployment every request will use.
    pub async fn start(&self) -> Result<String> {
        let id = self.deployments.ensure_active().await?;
        info!(
            registry = self.deployments.registry_name(),
            resource_id = %id,
            "Deployment ready"
        );
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::keyword_config;
    use sahayak_core::{ErrorKind, UserId};

    #[tokio::test]
    async fn local_context_starts_without_network() {
        let mut config = keyword_config();
        config.auth.access_token = Some("ya29.test".into());
        config.session.initial_user_name = "Meera".into();

        let ctx = AppContext::from_config(config).unwrap();
        let id = ctx.start().await.unwrap();
        assert_eq!(ctx.deployments.get().await.resource_id, id);
        assert_eq!(ctx.sessions.initial_state().user_name, "Meera");
        assert_eq!(ctx.store.bucket(), "sahayak-local");

        let sessions = ctx.sessions.list(&UserId::from("t1")).await.unwrap();
        assert_eq!(sessions.len(), 1);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = keyword_config();
        config.engine.backend = "vertex".into();
        config.engine.project = String::new();
        let err = AppContext::from_config(config).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(err.to_string().contains("engine.project"));
    }
}

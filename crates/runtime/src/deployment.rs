//! Deployment lifecycle: one active engine deployment per process.
//!
//! The handle is read by every request and written only by `ensure_active`,
//! `create` and `delete`. Neither lock on the handle is held across a
//! registry call: readers clone the engine `Arc` and let go, writers do the
//! remote work first and swap the handle afterwards. The writers themselves
//! are serialized by a separate lifecycle lock that readers never touch.

use sahayak_core::engine::{AgentEngine, DeploymentRecord, DeploymentRegistry};
use sahayak_core::{Error, Result};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

/// The tracked deployment and an open handle to its engine.
#[derive(Clone)]
pub struct ActiveDeployment {
    pub record: DeploymentRecord,
    pub engine: Arc<dyn AgentEngine>,
}

/// Admin-facing outcome of a lifecycle operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentStatus {
    pub message: String,
    /// Empty when there is no deployment.
    pub resource_id: String,
}

impl DeploymentStatus {
    fn new(message: impl Into<String>, resource_id: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            resource_id: resource_id.into(),
        }
    }
}

pub struct DeploymentManager {
    registry: Arc<dyn DeploymentRegistry>,
    active: RwLock<Option<ActiveDeployment>>,
    /// Held by `ensure_active`, `create` and `delete` for their whole run.
    lifecycle: Mutex<()>,
}

impl DeploymentManager {
    pub fn new(registry: Arc<dyn DeploymentRegistry>) -> Self {
        Self {
            registry,
            active: RwLock::new(None),
            lifecycle: Mutex::new(()),
        }
    }

    pub fn registry_name(&self) -> &str {
        self.registry.name()
    }

    async fn open(&self, record: DeploymentRecord) -> Result<ActiveDeployment> {
        let engine = self
            .registry
            .open(&record)
            .await
            .map_err(|e| Error::upstream("deployment.open", &record.resource_name, e))?;
        Ok(ActiveDeployment { record, engine })
    }

    async fn create_new(&self) -> Result<ActiveDeployment> {
        let record = self
            .registry
            .create()
            .await
            .map_err(|e| Error::upstream("deployment.create", self.registry.name(), e))?;
        self.open(record).await
    }

    /// Adopt the first existing deployment, or create one when there is none.
    ///
    /// An already tracked deployment is returned as is.
    pub async fn ensure_active(&self) -> Result<String> {
        if let Some(id) = self.tracked_id().await {
            return Ok(id);
        }

        let _lifecycle = self.lifecycle.lock().await;
        if let Some(id) = self.tracked_id().await {
            return Ok(id);
        }

        let existing = self.list().await?;
        let active = match existing.into_iter().next() {
            Some(record) => {
                info!(resource_id = record.resource_id(), "Existing deployment adopted");
                self.open(record).await?
            }
            None => {
                info!(registry = self.registry.name(), "No deployment found, creating one");
                self.create_new().await?
            }
        };
        let id = active.record.resource_id().to_string();
        *self.active.write().await = Some(active);
        Ok(id)
    }

    async fn tracked_id(&self) -> Option<String> {
        self.active
            .read()
            .await
            .as_ref()
            .map(|active| active.record.resource_id().to_string())
    }

    /// Always create a new deployment and track it instead of the current one.
    pub async fn create(&self) -> Result<DeploymentStatus> {
        let _lifecycle = self.lifecycle.lock().await;
        let active = self.create_new().await?;
        let id = active.record.resource_id().to_string();
        if let Some(previous) = self.active.write().await.replace(active) {
            info!(
                previous = previous.record.resource_id(),
                resource_id = %id,
                "Tracking new deployment; the previous one is left running"
            );
        }
        Ok(DeploymentStatus::new("New deployment Created!", id))
    }

    pub async fn get(&self) -> DeploymentStatus {
        match self.active.read().await.as_ref() {
            Some(active) => DeploymentStatus::new("Deployment available", active.record.resource_id()),
            None => DeploymentStatus::new("No deployment available.", ""),
        }
    }

    /// Force-delete the tracked deployment and stop tracking it.
    ///
    /// The handle is kept when the registry refuses the delete.
    pub async fn delete(&self) -> Result<DeploymentStatus> {
        let _lifecycle = self.lifecycle.lock().await;
        let Some(active) = self.active().await else {
            return Err(Error::not_found("active deployment"));
        };

        self.registry
            .delete(&active.record, true)
            .await
            .map_err(|e| {
                warn!(resource_id = active.record.resource_id(), error = %e, "Deployment delete failed");
                Error::upstream("deployment.delete", &active.record.resource_name, e)
            })?;

        let id = active.record.resource_id().to_string();
        *self.active.write().await = None;
        info!(resource_id = %id, "Deployment deleted");
        Ok(DeploymentStatus::new(format!("Resource {id} deleted successfully."), id))
    }

    /// The engine of the tracked deployment.
    pub async fn engine(&self) -> Result<Arc<dyn AgentEngine>> {
        self.active
            .read()
            .await
            .as_ref()
            .map(|active| active.engine.clone())
            .ok_or_else(|| Error::not_found("active deployment"))
    }

    pub async fn active(&self) -> Option<ActiveDeployment> {
        self.active.read().await.clone()
    }

    /// Every deployment the registry knows, tracked or not.
    pub async fn list(&self) -> Result<Vec<DeploymentRecord>> {
        self.registry
            .list()
            .await
            .map_err(|e| Error::upstream("deployment.list", self.registry.name(), e))
    }
}

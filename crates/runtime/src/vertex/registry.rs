//! The `reasoningEngines` collection of one project/location.

use async_trait::async_trait;
use sahayak_config::{EngineConfig, EnginePackageConfig};
use sahayak_core::engine::{AgentEngine, DeploymentRecord, DeploymentRegistry};
use sahayak_core::error::EngineError;
use sahayak_google::AuthorizedClient;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::{VertexEngine, api_base, check, malformed};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_MAX_POLLS: u32 = 360;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    reasoning_engines: Vec<DeploymentRecord>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// A long-running operation as returned by create.
#[derive(Debug, Deserialize)]
struct Operation {
    name: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<OperationError>,
    #[serde(default)]
    response: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct OperationError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

/// `projects/p/locations/l/reasoningEngines/1/operations/2` → the engine name.
fn engine_from_operation(operation: &str) -> &str {
    operation
        .split_once("/operations/")
        .map(|(engine, _)| engine)
        .unwrap_or(operation)
}

pub struct VertexRegistry {
    client: AuthorizedClient,
    api_url: String,
    parent: String,
    display_name: String,
    package: EnginePackageConfig,
    poll_interval: Duration,
    max_polls: u32,
}

impl VertexRegistry {
    pub fn new(client: AuthorizedClient, config: &EngineConfig) -> Self {
        Self {
            client,
            api_url: api_base(config.api_url.as_deref(), &config.location),
            parent: format!("projects/{}/locations/{}", config.project, config.location),
            display_name: config.display_name.clone(),
            package: config.package.clone(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_polls: DEFAULT_MAX_POLLS,
        }
    }

    /// How often and how many times to poll a pending create.
    pub fn with_polling(mut self, interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls.max(1);
        self
    }

    fn collection_url(&self) -> String {
        format!("{}/v1/{}/reasoningEngines", self.api_url, self.parent)
    }

    fn create_body(&self) -> Result<Value, EngineError> {
        if self.package.pickle_object_gcs_uri.is_empty() {
            return Err(EngineError::NotConfigured(
                "engine.package.pickle_object_gcs_uri is empty".into(),
            ));
        }
        let mut package = json!({
            "pickleObjectGcsUri": self.package.pickle_object_gcs_uri,
            "pythonVersion": self.package.python_version,
        });
        if !self.package.dependency_files_gcs_uri.is_empty() {
            package["dependencyFilesGcsUri"] = json!(self.package.dependency_files_gcs_uri);
        }
        if !self.package.requirements_gcs_uri.is_empty() {
            package["requirementsGcsUri"] = json!(self.package.requirements_gcs_uri);
        }
        Ok(json!({
            "displayName": self.display_name,
            "spec": { "packageSpec": package },
        }))
    }

    async fn wait(&self, mut operation: Operation) -> Result<DeploymentRecord, EngineError> {
        let mut polls = 0;
        while !operation.done {
            if polls >= self.max_polls {
                return Err(EngineError::Api {
                    status_code: 504,
                    message: format!("{} still running after {polls} polls", operation.name),
                });
            }
            tokio::time::sleep(self.poll_interval).await;
            polls += 1;

            let url = format!("{}/v1/{}", self.api_url, operation.name);
            let response = self.client.send(|c| c.get(&url)).await?;
            let response = check(response, &operation.name).await?;
            operation = response.json().await.map_err(|e| malformed("operation", e))?;
            debug!(operation = %operation.name, done = operation.done, "Polled deployment operation");
        }

        if let Some(error) = operation.error {
            return Err(EngineError::Api {
                status_code: u16::try_from(error.code).unwrap_or(500),
                message: error.message,
            });
        }
        let record = operation
            .response
            .and_then(|r| serde_json::from_value::<DeploymentRecord>(r).ok())
            .unwrap_or_else(|| DeploymentRecord::new(engine_from_operation(&operation.name)));
        Ok(record)
    }
}

#[async_trait]
impl DeploymentRegistry for VertexRegistry {
    fn name(&self) -> &str {
        "vertex"
    }

    async fn list(&self) -> Result<Vec<DeploymentRecord>, EngineError> {
        let url = self.collection_url();
        let mut records = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let response = self
                .client
                .send(|c| {
                    let request = c.get(&url);
                    match &page_token {
                        Some(token) => request.query(&[("pageToken", token)]),
                        None => request,
                    }
                })
                .await?;
            let page: ListResponse = check(response, &self.parent)
                .await?
                .json()
                .await
                .map_err(|e| malformed("list", e))?;
            records.extend(page.reasoning_engines);
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        Ok(records)
    }

    async fn create(&self) -> Result<DeploymentRecord, EngineError> {
        let body = self.create_body()?;
        let url = self.collection_url();
        info!(parent = %self.parent, display_name = %self.display_name, "Creating reasoning engine");

        let response = self.client.send(|c| c.post(&url).json(&body)).await?;
        let operation: Operation = check(response, &self.parent)
            .await?
            .json()
            .await
            .map_err(|e| malformed("create", e))?;
        let record = self.wait(operation).await?;
        info!(resource_id = record.resource_id(), "Reasoning engine ready");
        Ok(record)
    }

    async fn open(&self, record: &DeploymentRecord) -> Result<Arc<dyn AgentEngine>, EngineError> {
        Ok(Arc::new(VertexEngine::new(
            self.client.clone(),
            self.api_url.clone(),
            record.resource_name.clone(),
        )))
    }

    async fn delete(&self, record: &DeploymentRecord, force: bool) -> Result<(), EngineError> {
        let url = format!("{}/v1/{}", self.api_url, record.resource_name);
        let response = self
            .client
            .send(|c| c.delete(&url).query(&[("force", force)]))
            .await?;
        check(response, &record.resource_name).await?;
        info!(resource_id = record.resource_id(), force, "Reasoning engine deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{spawn_mock, static_client};
    use axum::extract::{Query, State};
    use axum::http::{Method, Uri};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Mock {
        polls: AtomicU32,
        calls: Mutex<Vec<String>>,
    }

    async fn registry_handler(
        State(mock): State<Arc<Mock>>,
        method: Method,
        uri: Uri,
        Query(query): Query<HashMap<String, String>>,
    ) -> String {
        let path = uri.path().to_string();
        mock.calls.lock().unwrap().push(format!("{method} {}", uri));
        const COLLECTION: &str = "/v1/projects/p/locations/l/reasoningEngines";
        match (method.as_str(), path.as_str()) {
            ("GET", COLLECTION) if query.get("pageToken").is_none() => json!({
                "reasoningEngines": [{"name": "projects/p/locations/l/reasoningEngines/1", "displayName": "sahayak"}],
                "nextPageToken": "page-2"
            })
            .to_string(),
            ("GET", COLLECTION) => json!({
                "reasoningEngines": [{"name": "projects/p/locations/l/reasoningEngines/2"}]
            })
            .to_string(),
            ("POST", COLLECTION) => json!({
                "name": "projects/p/locations/l/reasoningEngines/3/operations/99",
                "done": false
            })
            .to_string(),
            ("GET", p) if p.contains("/operations/") => {
                let done = mock.polls.fetch_add(1, Ordering::SeqCst) >= 1;
                json!({ "name": "projects/p/locations/l/reasoningEngines/3/operations/99", "done": done })
                    .to_string()
            }
            _ => "{}".to_string(),
        }
    }

    fn config(packaged: bool) -> EngineConfig {
        let mut config = EngineConfig {
            project: "p".into(),
            location: "l".into(),
            ..EngineConfig::default()
        };
        if packaged {
            config.package.pickle_object_gcs_uri = "gs://staging/agent.pkl".into();
        }
        config
    }

    async fn registry(packaged: bool) -> (VertexRegistry, Arc<Mock>) {
        let mock = Arc::new(Mock::default());
        let app = axum::Router::new().fallback(registry_handler).with_state(mock.clone());
        let addr = spawn_mock(app).await;
        let mut config = config(packaged);
        config.api_url = Some(format!("http://{addr}"));
        let registry =
            VertexRegistry::new(static_client(), &config).with_polling(Duration::from_millis(1), 10);
        (registry, mock)
    }

    #[test]
    fn operation_name_maps_to_engine() {
        assert_eq!(
            engine_from_operation("projects/p/locations/l/reasoningEngines/3/operations/99"),
            "projects/p/locations/l/reasoningEngines/3"
        );
    }

    #[test]
    fn create_requires_a_staged_package() {
        let registry = VertexRegistry::new(static_client(), &config(false));
        assert!(matches!(registry.create_body(), Err(EngineError::NotConfigured(_))));

        let body = VertexRegistry::new(static_client(), &config(true)).create_body().unwrap();
        assert_eq!(body["spec"]["packageSpec"]["pickleObjectGcsUri"], "gs://staging/agent.pkl");
        assert!(body["spec"]["packageSpec"].get("requirementsGcsUri").is_none());
    }

    #[tokio::test]
    async fn list_follows_pages() {
        let (registry, _mock) = registry(true).await;
        let records = registry.list().await.unwrap();
        let ids: Vec<&str> = records.iter().map(|r| r.resource_id()).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn create_polls_until_done() {
        let (registry, mock) = registry(true).await;
        let record = registry.create().await.unwrap();
        assert_eq!(record.resource_id(), "3");
        assert_eq!(mock.polls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn delete_forces() {
        let (registry, mock) = registry(true).await;
        registry
            .delete(&DeploymentRecord::new("projects/p/locations/l/reasoningEngines/1"), true)
            .await
            .unwrap();
        let calls = mock.calls.lock().unwrap();
        assert_eq!(
            calls.last().unwrap(),
            "DELETE /v1/projects/p/locations/l/reasoningEngines/1?force=true"
        );
    }
}

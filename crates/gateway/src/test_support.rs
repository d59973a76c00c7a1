//! Routers over a local engine with a scripted model.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use sahayak_agent::{Coordinator, HandlerDeps};
use sahayak_config::AppConfig;
use sahayak_core::error::ProviderError;
use sahayak_core::message::Message;
use sahayak_core::provider::{Provider, ProviderRequest, ProviderResponse};
use sahayak_runtime::{AppContext, LocalRegistry};
use sahayak_storage::InMemoryObjectStore;
use sahayak_tools::{Calendar, InMemoryCalendar, PlainTextRenderer, offset_from_minutes};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::build_router;

struct CannedProvider(Mutex<VecDeque<String>>);

#[async_trait]
impl Provider for CannedProvider {
    fn name(&self) -> &str {
        "canned"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let text = self.0.lock().unwrap().pop_front().ok_or(ProviderError::ApiError {
            status_code: 500,
            message: "no more replies".into(),
        })?;
        Ok(ProviderResponse {
            message: Message::assistant(text),
            usage: None,
            model: "canned".into(),
        })
    }
}

pub fn keyword_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.routing.classifier = "keyword".into();
    config
}

async fn build(config: AppConfig, replies: &[&str]) -> (Router, Arc<InMemoryObjectStore>) {
    let provider = Arc::new(CannedProvider(Mutex::new(
        replies.iter().map(|r| r.to_string()).collect(),
    )));
    let store = Arc::new(InMemoryObjectStore::new("sahayak-test"));
    let deps = HandlerDeps {
        provider,
        store: store.clone(),
        renderer: Arc::new(PlainTextRenderer),
        calendar: Calendar::new(Arc::new(InMemoryCalendar::new()), offset_from_minutes(330)),
    };
    let coordinator = Arc::new(Coordinator::from_config(&config, &deps));
    let registry = Arc::new(LocalRegistry::new("sahayak", coordinator));
    let ctx = AppContext::with_parts(config, deps, registry);
    ctx.start().await.unwrap();
    (build_router(Arc::new(ctx)), store)
}

pub async fn context(replies: &[&str]) -> (Router, Arc<InMemoryObjectStore>) {
    build(keyword_config(), replies).await
}

pub async fn context_with(config: AppConfig, replies: &[&str]) -> Router {
    build(config, replies).await.0
}

pub fn request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri);
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

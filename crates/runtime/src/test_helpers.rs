//! Fakes shared by the runtime tests.

use sahayak_agent::{Coordinator, HandlerDeps};
use sahayak_config::AppConfig;
use sahayak_core::error::ProviderError;
use sahayak_core::message::{Message, MessageToolCall};
use sahayak_core::provider::{Provider, ProviderRequest, ProviderResponse};
use sahayak_core::TokenSource;
use sahayak_google::{AuthorizedClient, StaticTokenSource};
use sahayak_storage::InMemoryObjectStore;
use sahayak_tools::{Calendar, InMemoryCalendar, PlainTextRenderer, offset_from_minutes};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

/// Replies from a script, in order. Runs dry with a 500.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<ProviderResponse>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

pub fn text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: None,
        model: "scripted".into(),
    }
}

pub fn tool_response(name: &str, args: serde_json::Value) -> ProviderResponse {
    let mut message = Message::assistant("");
    message.tool_calls.push(MessageToolCall {
        id: format!("call_{name}"),
        name: name.into(),
        arguments: args.to_string(),
    });
    ProviderResponse {
        message,
        usage: None,
        model: "scripted".into(),
    }
}

impl ScriptedProvider {
    pub fn new(script: Vec<ProviderResponse>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| text_response(t)).collect())
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ProviderError::ApiError {
                status_code: 500,
                message: "script exhausted".into(),
            })
    }
}

pub fn keyword_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.routing.classifier = "keyword".into();
    config
}

pub fn deps(provider: Arc<dyn Provider>) -> (HandlerDeps, Arc<InMemoryObjectStore>) {
    let store = Arc::new(InMemoryObjectStore::new("sahayak-test"));
    let deps = HandlerDeps {
        provider,
        store: store.clone(),
        renderer: Arc::new(PlainTextRenderer),
        calendar: Calendar::new(Arc::new(InMemoryCalendar::new()), offset_from_minutes(330)),
    };
    (deps, store)
}

/// The full dispatcher with the keyword classifier over in-memory fakes.
pub fn keyword_coordinator(provider: Arc<dyn Provider>) -> (Arc<Coordinator>, Arc<InMemoryObjectStore>) {
    let (deps, store) = deps(provider);
    (Arc::new(Coordinator::from_config(&keyword_config(), &deps)), store)
}

pub fn static_client() -> AuthorizedClient {
    let tokens: Arc<dyn TokenSource> = Arc::new(StaticTokenSource::new("ya29.test"));
    AuthorizedClient::new(tokens)
}

/// Serve `app` on an ephemeral port.
pub async fn spawn_mock(app: axum::Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind mock server");
    let addr = listener.local_addr().expect("mock server address");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

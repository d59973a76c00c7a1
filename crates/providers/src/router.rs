//! Provider router: builds the configured model backend and hands it out.

use std::collections::HashMap;
use std::sync::Arc;

use sahayak_core::TokenSource;
use sahayak_core::provider::Provider;
use sahayak_google::AuthorizedClient;
use tracing::info;

use crate::gemini::GeminiProvider;
use crate::openai_compat::OpenAiCompatProvider;

/// Holds named providers and remembers which one is the default.
pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn Provider>>,
    default_provider: String,
}

impl ProviderRouter {
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider.into(),
        }
    }

    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(name.into(), provider);
    }

    pub fn default(&self) -> Option<Arc<dyn Provider>> {
        self.providers.get(&self.default_provider).cloned()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    /// List all registered provider names.
    pub fn list(&self) -> Vec<&str> {
        self.providers.keys().map(|s| s.as_str()).collect()
    }
}

/// Build the router from `[model]` config.
///
/// Gemini uses the API key when one is configured and bearer tokens from
/// `tokens` otherwise. Any other provider name is treated as an
/// OpenAI-compatible endpoint.
pub fn build_from_config(
    config: &sahayak_config::AppConfig,
    tokens: Arc<dyn TokenSource>,
) -> ProviderRouter {
    let model = &config.model;
    let mut router = ProviderRouter::new(&model.provider);

    let provider: Arc<dyn Provider> = match (model.provider.as_str(), model.api_key.as_deref()) {
        ("gemini", Some(key)) => {
            info!("Gemini provider using API key");
            Arc::new(GeminiProvider::with_api_key(key, model.api_url.as_deref()))
        }
        ("gemini", None) => {
            info!(source = tokens.name(), "Gemini provider using bearer tokens");
            Arc::new(GeminiProvider::with_token(
                AuthorizedClient::new(tokens),
                model.api_url.as_deref(),
            ))
        }
        (name, key) => {
            let base_url = model
                .api_url
                .clone()
                .unwrap_or_else(|| default_base_url(name));
            info!(provider = name, base_url = %base_url, "OpenAI-compatible provider");
            Arc::new(OpenAiCompatProvider::new(name, base_url, key.unwrap_or_default()))
        }
    };

    router.register(model.provider.clone(), provider);
    router
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openai" => "https://api.openai.com/v1".into(),
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        "gemini_openai" => "https://generativelanguage.googleapis.com/v1beta/openai".into(),
        _ => "http://localhost:8080/v1".into(),
    }
}

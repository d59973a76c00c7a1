//! Configuration loading, validation, and management for Sahayak.
//!
//! Loads configuration from `~/.sahayak/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.sahayak/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application name reported to the agent runtime
    #[serde(default = "default_app_name")]
    pub app_name: String,

    #[serde(default)]
    pub model: ModelConfig,

    /// Per-handler model overrides, keyed by handler name
    #[serde(default)]
    pub handlers: HashMap<String, HandlerConfig>,

    #[serde(default)]
    pub routing: RoutingConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_app_name() -> String {
    "sahayak".into()
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("app_name", &self.app_name)
            .field("model", &self.model)
            .field("handlers", &self.handlers)
            .field("routing", &self.routing)
            .field("storage", &self.storage)
            .field("engine", &self.engine)
            .field("session", &self.session)
            .field("tools", &self.tools)
            .field("auth", &self.auth)
            .field("gateway", &self.gateway)
            .field("logging", &self.logging)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// `gemini` or `openai_compat`
    #[serde(default = "default_provider")]
    pub provider: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

fn default_provider() -> String {
    "gemini".into()
}
fn default_model() -> String {
    "gemini-2.0-flash".into()
}
fn default_temperature() -> f32 {
    0.7
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: None,
            api_key: None,
            api_url: None,
        }
    }
}

impl std::fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// Model override for one handler.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HandlerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// `model` (ask the model for a label) or `keyword` (offline rules)
    #[serde(default = "default_classifier")]
    pub classifier: String,

    /// Upper bound on model/tool round trips inside one handler turn
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: usize,
}

fn default_classifier() -> String {
    "model".into()
}
fn default_max_tool_iterations() -> usize {
    8
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            classifier: default_classifier(),
            max_tool_iterations: default_max_tool_iterations(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// `memory` or `gcs`
    #[serde(default = "default_storage_backend")]
    pub backend: String,

    #[serde(default)]
    pub bucket: String,

    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    /// JSON API endpoint (overridable for emulators)
    #[serde(default = "default_storage_api_url")]
    pub api_url: String,
}

fn default_storage_backend() -> String {
    "memory".into()
}
fn default_public_base_url() -> String {
    "https://storage.googleapis.com".into()
}
fn default_storage_api_url() -> String {
    "https://storage.googleapis.com".into()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            bucket: String::new(),
            public_base_url: default_public_base_url(),
            api_url: default_storage_api_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// `local` (in-process) or `vertex` (reasoning engines)
    #[serde(default = "default_engine_backend")]
    pub backend: String,

    #[serde(default)]
    pub project: String,

    #[serde(default = "default_location")]
    pub location: String,

    #[serde(default = "default_display_name")]
    pub display_name: String,

    /// Overrides `https://{location}-aiplatform.googleapis.com`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default)]
    pub package: EnginePackageConfig,
}

fn default_engine_backend() -> String {
    "local".into()
}
fn default_location() -> String {
    "us-central1".into()
}
fn default_display_name() -> String {
    "sahayak".into()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend: default_engine_backend(),
            project: String::new(),
            location: default_location(),
            display_name: default_display_name(),
            api_url: None,
            package: EnginePackageConfig::default(),
        }
    }
}

/// Staged package used when creating a remote deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnginePackageConfig {
    #[serde(default)]
    pub pickle_object_gcs_uri: String,

    #[serde(default)]
    pub dependency_files_gcs_uri: String,

    #[serde(default)]
    pub requirements_gcs_uri: String,

    #[serde(default = "default_python_version")]
    pub python_version: String,
}

fn default_python_version() -> String {
    "3.12".into()
}

impl Default for EnginePackageConfig {
    fn default() -> Self {
        Self {
            pickle_object_gcs_uri: String::new(),
            dependency_files_gcs_uri: String::new(),
            requirements_gcs_uri: String::new(),
            python_version: default_python_version(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Display-name placeholder written into every new session's state
    #[serde(default = "default_initial_user_name")]
    pub initial_user_name: String,
}

fn default_initial_user_name() -> String {
    "user".into()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            initial_user_name: default_initial_user_name(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub youtube_api_key: Option<String>,

    /// Top-N results kept from each search source
    #[serde(default = "default_search_results")]
    pub search_results: usize,

    #[serde(default = "default_duckduckgo_url")]
    pub duckduckgo_url: String,

    #[serde(default = "default_youtube_url")]
    pub youtube_url: String,

    #[serde(default = "default_speciality_url")]
    pub speciality_url: String,

    /// `memory` or `google`
    #[serde(default = "default_calendar_backend")]
    pub calendar_backend: String,

    #[serde(default = "default_calendar_id")]
    pub calendar_id: String,

    #[serde(default = "default_calendar_api_url")]
    pub calendar_api_url: String,

    /// Offset applied to "today" and to naive calendar times
    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,
}

fn default_search_results() -> usize {
    5
}
fn default_duckduckgo_url() -> String {
    "https://html.duckduckgo.com/html/".into()
}
fn default_youtube_url() -> String {
    "https://www.googleapis.com/youtube/v3/search".into()
}
fn default_speciality_url() -> String {
    "https://www.indianage.com/".into()
}
fn default_calendar_backend() -> String {
    "memory".into()
}
fn default_calendar_id() -> String {
    "primary".into()
}
fn default_calendar_api_url() -> String {
    "https://www.googleapis.com/calendar/v3".into()
}
fn default_utc_offset_minutes() -> i32 {
    330
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            youtube_api_key: None,
            search_results: default_search_results(),
            duckduckgo_url: default_duckduckgo_url(),
            youtube_url: default_youtube_url(),
            speciality_url: default_speciality_url(),
            calendar_backend: default_calendar_backend(),
            calendar_id: default_calendar_id(),
            calendar_api_url: default_calendar_api_url(),
            utc_offset_minutes: default_utc_offset_minutes(),
        }
    }
}

impl std::fmt::Debug for ToolsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolsConfig")
            .field("youtube_api_key", &redact(&self.youtube_api_key))
            .field("search_results", &self.search_results)
            .field("duckduckgo_url", &self.duckduckgo_url)
            .field("youtube_url", &self.youtube_url)
            .field("speciality_url", &self.speciality_url)
            .field("calendar_backend", &self.calendar_backend)
            .field("calendar_id", &self.calendar_id)
            .field("calendar_api_url", &self.calendar_api_url)
            .field("utc_offset_minutes", &self.utc_offset_minutes)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Static bearer token. When absent the metadata server is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    #[serde(default = "default_metadata_server")]
    pub metadata_server: String,
}

fn default_metadata_server() -> String {
    "http://metadata.google.internal".into()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            metadata_server: default_metadata_server(),
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("access_token", &redact(&self.access_token))
            .field("metadata_server", &self.metadata_server)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Largest accepted multipart upload, in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_max_upload_bytes() -> usize {
    20 * 1024 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of the human formatter
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.sahayak/config.toml),
    /// then apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup`.
    ///
    /// - `SAHAYAK_PROVIDER`, `SAHAYAK_MODEL`
    /// - `GEMINI_API_KEY`, then `GOOGLE_API_KEY` (only when no key is configured)
    /// - `GCS_BUCKET_NAME`, `YOUTUBE_API_KEY`, `GOOGLE_ACCESS_TOKEN`
    /// - `GOOGLE_CLOUD_PROJECT`, `GOOGLE_CLOUD_LOCATION`
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(provider) = non_empty("SAHAYAK_PROVIDER") {
            self.model.provider = provider;
        }
        if let Some(model) = non_empty("SAHAYAK_MODEL") {
            self.model.model = model;
        }
        if self.model.api_key.is_none() {
            self.model.api_key = non_empty("GEMINI_API_KEY").or_else(|| non_empty("GOOGLE_API_KEY"));
        }
        if let Some(bucket) = non_empty("GCS_BUCKET_NAME") {
            self.storage.bucket = bucket;
        }
        if let Some(key) = non_empty("YOUTUBE_API_KEY") {
            self.tools.youtube_api_key = Some(key);
        }
        if let Some(token) = non_empty("GOOGLE_ACCESS_TOKEN") {
            self.auth.access_token = Some(token);
        }
        if let Some(project) = non_empty("GOOGLE_CLOUD_PROJECT") {
            self.engine.project = project;
        }
        if let Some(location) = non_empty("GOOGLE_CLOUD_LOCATION") {
            self.engine.location = location;
        }
    }

    pub fn config_dir() -> PathBuf {
        dirs_home().join(".sahayak")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.model.temperature) {
            return Err(ConfigError::ValidationError(
                "model.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        for (name, handler) in &self.handlers {
            if let Some(t) = handler.temperature
                && !(0.0..=2.0).contains(&t)
            {
                return Err(ConfigError::ValidationError(format!(
                    "handlers.{name}.temperature must be between 0.0 and 2.0"
                )));
            }
        }

        match self.storage.backend.as_str() {
            "memory" => {}
            "gcs" if self.storage.bucket.is_empty() => {
                return Err(ConfigError::ValidationError(
                    "storage.bucket is required when storage.backend = \"gcs\"".into(),
                ));
            }
            "gcs" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "unknown storage.backend '{other}' (expected memory or gcs)"
                )));
            }
        }

        match self.engine.backend.as_str() {
            "local" => {}
            "vertex" if self.engine.project.is_empty() => {
                return Err(ConfigError::ValidationError(
                    "engine.project is required when engine.backend = \"vertex\"".into(),
                ));
            }
            "vertex" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "unknown engine.backend '{other}' (expected local or vertex)"
                )));
            }
        }

        if !matches!(self.routing.classifier.as_str(), "model" | "keyword") {
            return Err(ConfigError::ValidationError(format!(
                "unknown routing.classifier '{}' (expected model or keyword)",
                self.routing.classifier
            )));
        }

        if self.routing.max_tool_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "routing.max_tool_iterations must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Model and temperature for a handler, falling back to the defaults.
    pub fn handler_model(&self, handler: &str) -> (String, f32) {
        let over = self.handlers.get(handler);
        let model = over
            .and_then(|h| h.model.clone())
            .unwrap_or_else(|| self.model.model.clone());
        let temperature = over
            .and_then(|h| h.temperature)
            .unwrap_or(self.model.temperature);
        (model, temperature)
    }

    /// Generate a default config TOML string (for the `config` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            model: ModelConfig::default(),
            handlers: HashMap::new(),
            routing: RoutingConfig::default(),
            storage: StorageConfig::default(),
            engine: EngineConfig::default(),
            session: SessionConfig::default(),
            tools: ToolsConfig::default(),
            auth: AuthConfig::default(),
            gateway: GatewayConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for sahayak_core::Error {
    fn from(err: ConfigError) -> Self {
        sahayak_core::Error::Config {
            message: err.to_string(),
        }
    }
}

//! Google Gemini provider (`generateContent`).
//!
//! Supports:
//! - API key auth (`?key=`) or bearer tokens through [`AuthorizedClient`]
//! - Inline binary parts for attachments
//! - Native function calling (function declarations, `functionCall` /
//!   `functionResponse` parts)

use async_trait::async_trait;
use sahayak_core::error::ProviderError;
use sahayak_core::message::{Message, MessageToolCall, Role};
use sahayak_core::provider::*;
use sahayak_google::AuthorizedClient;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::http::status_error;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

enum GeminiAuth {
    ApiKey(String),
    Token(AuthorizedClient),
}

pub struct GeminiProvider {
    base_url: String,
    auth: GeminiAuth,
    client: reqwest::Client,
}

impl GeminiProvider {
    /// Provider authenticated by API key.
    pub fn with_api_key(api_key: impl Into<String>, base_url: Option<&str>) -> Self {
        Self {
            base_url: Self::normalize_base(base_url),
            auth: GeminiAuth::ApiKey(api_key.into()),
            client: Self::http_client(),
        }
    }

    /// Provider authenticated by bearer tokens (service account, metadata server).
    pub fn with_token(client: AuthorizedClient, base_url: Option<&str>) -> Self {
        Self {
            base_url: Self::normalize_base(base_url),
            auth: GeminiAuth::Token(client),
            client: Self::http_client(),
        }
    }

    fn http_client() -> reqwest::Client {
        reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new())
    }

    fn normalize_base(base_url: Option<&str>) -> String {
        base_url
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string()
    }

    fn endpoint(&self, model: &str) -> String {
        let model_path = if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{model}")
        };
        format!("{}/{model_path}:generateContent", self.base_url)
    }

    /// Split messages into the system instruction and the `contents` list.
    ///
    /// Consecutive tool results are merged into one turn, as Gemini expects
    /// all responses to a batch of calls together.
    fn to_api_contents(messages: &[Message]) -> (Option<ApiContent>, Vec<ApiContent>) {
        let mut system_parts: Vec<ApiPart> = Vec::new();
        let mut contents: Vec<ApiContent> = Vec::new();

        for msg in messages {
            match msg.role {
                Role::System => system_parts.push(ApiPart::text(&msg.content)),
                Role::User => {
                    let mut parts = Vec::new();
                    if !msg.content.is_empty() {
                        parts.push(ApiPart::text(&msg.content));
                    }
                    for att in &msg.attachments {
                        parts.push(ApiPart {
                            inline_data: Some(ApiInlineData {
                                mime_type: att.mime_type.clone(),
                                data: att.data.clone(),
                            }),
                            ..ApiPart::default()
                        });
                    }
                    if parts.is_empty() {
                        continue;
                    }
                    contents.push(ApiContent {
                        role: Some("user".into()),
                        parts,
                    });
                }
                Role::Assistant => {
                    let mut parts = Vec::new();
                    if !msg.content.is_empty() {
                        parts.push(ApiPart::text(&msg.content));
                    }
                    for tc in &msg.tool_calls {
                        let args = serde_json::from_str(&tc.arguments)
                            .unwrap_or_else(|_| serde_json::json!({}));
                        parts.push(ApiPart {
                            function_call: Some(ApiFunctionCall {
                                name: tc.name.clone(),
                                args: Some(args),
                            }),
                            ..ApiPart::default()
                        });
                    }
                    if parts.is_empty() {
                        continue;
                    }
                    contents.push(ApiContent {
                        role: Some("model".into()),
                        parts,
                    });
                }
                Role::Tool => {
                    let part = ApiPart {
                        function_response: Some(ApiFunctionResponse {
                            name: msg.tool_name.clone().unwrap_or_default(),
                            response: serde_json::json!({ "content": msg.content }),
                        }),
                        ..ApiPart::default()
                    };
                    match contents.last_mut() {
                        Some(last)
                            if last.role.as_deref() == Some("user")
                                && last.parts.iter().all(|p| p.function_response.is_some()) =>
                        {
                            last.parts.push(part);
                        }
                        _ => contents.push(ApiContent {
                            role: Some("user".into()),
                            parts: vec![part],
                        }),
                    }
                }
            }
        }

        let system = (!system_parts.is_empty()).then(|| ApiContent {
            role: None,
            parts: system_parts,
        });
        (system, contents)
    }

    fn to_api_tools(tools: &[ToolDefinition]) -> Option<Vec<ApiTool>> {
        if tools.is_empty() {
            return None;
        }
        Some(vec![ApiTool {
            function_declarations: tools
                .iter()
                .map(|t| ApiFunctionDeclaration {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                })
                .collect(),
        }])
    }

    fn parse_response(body: ApiResponse, model: &str) -> Result<ProviderResponse, ProviderError> {
        if let Some(err) = body.error {
            return Err(ProviderError::ApiError {
                status_code: 200,
                message: err.message,
            });
        }

        let candidate = body
            .candidates
            .unwrap_or_default()
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::ApiError {
                status_code: 200,
                message: "No candidates in response".into(),
            })?;

        let mut text = String::new();
        let mut tool_calls = Vec::new();
        for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
            if part.thought.unwrap_or(false) {
                continue;
            }
            if let Some(t) = part.text {
                text.push_str(&t);
            }
            if let Some(call) = part.function_call {
                tool_calls.push(MessageToolCall {
                    id: format!("call_{}", uuid::Uuid::new_v4().simple()),
                    name: call.name,
                    arguments: call
                        .args
                        .unwrap_or_else(|| serde_json::json!({}))
                        .to_string(),
                });
            }
        }

        let mut message = Message::assistant(text);
        message.tool_calls = tool_calls;

        let usage = body.usage_metadata.map(|u| Usage {
            prompt_tokens: u.prompt_token_count,
            completion_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
        });

        Ok(ProviderResponse {
            message,
            usage,
            model: body.model_version.unwrap_or_else(|| model.to_string()),
        })
    }
}

#[async_trait]
impl sahayak_core::Provider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let (system_instruction, contents) = Self::to_api_contents(&request.messages);
        let body = ApiRequest {
            contents,
            system_instruction,
            generation_config: ApiGenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            },
            tools: Self::to_api_tools(&request.tools),
        };

        let url = self.endpoint(&request.model);
        debug!(model = %request.model, tools = request.tools.len(), "Sending generateContent request");

        let response = match &self.auth {
            GeminiAuth::ApiKey(key) => self
                .client
                .post(&url)
                .query(&[("key", key.as_str())])
                .json(&body)
                .send()
                .await
                .map_err(|e| ProviderError::Network(e.to_string()))?,
            GeminiAuth::Token(client) => client.send(|c| c.post(&url).json(&body)).await?,
        };

        let status = response.status().as_u16();
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Gemini returned error");
            return Err(status_error(status, error_body));
        }

        let parsed: ApiResponse = response.json().await.map_err(|e| ProviderError::ApiError {
            status_code: 200,
            message: format!("Failed to parse response: {e}"),
        })?;

        Self::parse_response(parsed, &request.model)
    }
}

// --- Gemini API types (internal) ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiRequest {
    contents: Vec<ApiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<ApiContent>,
    generation_config: ApiGenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ApiTool>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<ApiPart>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<ApiInlineData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<ApiFunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<ApiFunctionResponse>,
    #[serde(default, skip_serializing)]
    thought: Option<bool>,
}

impl ApiPart {
    fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunctionCall {
    name: String,
    #[serde(default)]
    args: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunctionResponse {
    name: String,
    response: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiTool {
    function_declarations: Vec<ApiFunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct ApiFunctionDeclaration {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiGenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse {
    #[serde(default)]
    candidates: Option<Vec<ApiCandidate>>,
    #[serde(default)]
    usage_metadata: Option<ApiUsage>,
    #[serde(default)]
    model_version: Option<String>,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ApiCandidate {
    #[serde(default)]
    content: Option<ApiContent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiUsage {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use sahayak_core::content::InlineData;

    #[test]
    fn endpoint_adds_models_prefix() {
        let p = GeminiProvider::with_api_key("k", None);
        assert_eq!(
            p.endpoint("gemini-2.0-flash"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent"
        );
        assert!(p.endpoint("models/gemini-2.5-flash").ends_with("models/gemini-2.5-flash:generateContent"));
    }

    #[test]
    fn system_and_attachment_conversion() {
        let mut user = Message::user("what is in this picture?");
        user.attachments.push(InlineData {
            data: "iVBORw0=".into(),
            mime_type: "image/png".into(),
        });
        let (system, contents) =
            GeminiProvider::to_api_contents(&[Message::system("be kind"), user]);

        let system = system.unwrap();
        assert_eq!(system.parts[0].text.as_deref(), Some("be kind"));
        assert_eq!(contents.len(), 1);
        assert_eq!(contents[0].parts.len(), 2);
        assert!(contents[0].parts[0].text.is_some());
        assert_eq!(
            contents[0].parts[1].inline_data.as_ref().unwrap().mime_type,
            "image/png"
        );

        let json = serde_json::to_value(&contents[0]).unwrap();
        assert_eq!(json["parts"][1]["inlineData"]["mimeType"], "image/png");
    }

    #[test]
    fn tool_round_trip_conversion() {
        let mut call = Message::assistant("");
        call.tool_calls = vec![
            MessageToolCall { id: "c1".into(), name: "web_search".into(), arguments: r#"{"query":"fractions"}"#.into() },
            MessageToolCall { id: "c2".into(), name: "video_search".into(), arguments: r#"{"query":"fractions"}"#.into() },
        ];
        let messages = vec![
            Message::user("find fraction videos"),
            call,
            Message::tool_result("c1", "[]").with_tool_name("web_search"),
            Message::tool_result("c2", "[]").with_tool_name("video_search"),
        ];
        let (_, contents) = GeminiProvider::to_api_contents(&messages);
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[1].role.as_deref(), Some("model"));
        assert_eq!(contents[1].parts.len(), 2);
        assert_eq!(contents[2].parts.len(), 2);
        assert_eq!(
            contents[2].parts[1].function_response.as_ref().unwrap().name,
            "video_search"
        );
    }

    #[test]
    fn parse_text_and_function_call() {
        let body: ApiResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{"content": {"role": "model", "parts": [
                {"text": "thinking", "thought": true},
                {"text": "Let me check."},
                {"functionCall": {"name": "list_events", "args": {"date": "2025-07-26"}}}
            ]}}],
            "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 4, "totalTokenCount": 16}
        }))
        .unwrap();
        let resp = GeminiProvider::parse_response(body, "gemini-2.0-flash").unwrap();
        assert_eq!(resp.message.content, "Let me check.");
        assert_eq!(resp.message.tool_calls.len(), 1);
        assert_eq!(resp.message.tool_calls[0].name, "list_events");
        assert!(resp.message.tool_calls[0].arguments.contains("2025-07-26"));
        assert_eq!(resp.usage.unwrap().total_tokens, 16);
        assert_eq!(resp.model, "gemini-2.0-flash");
    }

    #[test]
    fn empty_candidates_is_error() {
        let body: ApiResponse = serde_json::from_value(serde_json::json!({"candidates": []})).unwrap();
        assert!(GeminiProvider::parse_response(body, "m").is_err());
    }

    #[test]
    fn tools_become_function_declarations() {
        let tools = vec![ToolDefinition {
            name: "get_today_speciality".into(),
            description: "What is special about today".into(),
            parameters: serde_json::json!({"type": "object", "properties": {}}),
        }];
        let json = serde_json::to_value(GeminiProvider::to_api_tools(&tools).unwrap()).unwrap();
        assert_eq!(json[0]["functionDeclarations"][0]["name"], "get_today_speciality");
        assert!(GeminiProvider::to_api_tools(&[]).is_none());
    }
    async fn spawn_gemini() -> String {
        use axum::extract::{Path, Query};
        use axum::routing::post;
        use std::collections::HashMap;

        let app = axum::Router::new().route(
            "/models/{call}",
            post(
                |Path(call): Path<String>,
                 Query(q): Query<HashMap<String, String>>,
                 axum::Json(body): axum::Json<serde_json::Value>| async move {
                    if q.get("key").map(String::as_str) != Some("test-key") {
                        return (axum::http::StatusCode::FORBIDDEN, axum::Json(serde_json::json!({})));
                    }
                    let asked = body["contents"][0]["parts"][0]["text"].as_str().unwrap_or("").to_string();
                    let system = body["systemInstruction"]["parts"][0]["text"].as_str().unwrap_or("").to_string();
                    (
                        axum::http::StatusCode::OK,
                        axum::Json(serde_json::json!({
                            "candidates": [{"content": {"role": "model", "parts": [
                                {"text": format!("{call}|{system}|{asked}")}
                            ]}}]
                        })),
                    )
                },
            ),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind mock server");
        let addr = listener.local_addr().expect("mock server address");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn complete_against_mock_server() {
        use sahayak_core::Provider;

        let base = spawn_gemini().await;
        let provider = GeminiProvider::with_api_key("test-key", Some(&base));
        let request = ProviderRequest::new(
            "gemini-2.0-flash",
            vec![Message::system("sys"), Message::user("hello")],
        );
        let resp = provider.complete(request).await.unwrap();
        assert_eq!(resp.message.content, "gemini-2.0-flash:generateContent|sys|hello");

        let bad = GeminiProvider::with_api_key("wrong", Some(&base));
        let err = bad
            .complete(ProviderRequest::new("gemini-2.0-flash", vec![Message::user("x")]))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::AuthenticationFailed(_)));
    }
}

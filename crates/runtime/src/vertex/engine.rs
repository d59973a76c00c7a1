//! A deployed reasoning engine, addressed by its resource name.

use async_trait::async_trait;
use futures::StreamExt;
use sahayak_core::content::Envelope;
use sahayak_core::engine::{AgentEngine, EngineChunk, EngineStream};
use sahayak_core::error::EngineError;
use sahayak_core::session::{InitialState, Session};
use sahayak_core::{SessionId, UserId};
use sahayak_google::AuthorizedClient;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{check, malformed};

pub struct VertexEngine {
    client: AuthorizedClient,
    api_url: String,
    resource_name: String,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    output: Value,
}

#[derive(Debug, Default, Deserialize)]
struct SessionList {
    #[serde(default)]
    sessions: Vec<Session>,
}

/// Parse one line of a `:streamQuery` body.
///
/// Blank lines yield nothing. An `{"error": ...}` line or malformed JSON
/// ends the stream with an error.
pub fn parse_stream_line(line: &str) -> Option<Result<EngineChunk, EngineError>> {
    let line = line.trim();
    let line = line.strip_prefix("data:").map(str::trim).unwrap_or(line);
    if line.is_empty() {
        return None;
    }

    let value: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => return Some(Err(EngineError::StreamInterrupted(format!("malformed chunk: {e}")))),
    };
    if let Some(error) = value.get("error") {
        let status_code = error["code"].as_u64().and_then(|c| u16::try_from(c).ok()).unwrap_or(500);
        let message = error["message"]
            .as_str()
            .map(String::from)
            .unwrap_or_else(|| error.to_string());
        return Some(Err(EngineError::Api { status_code, message }));
    }
    Some(serde_json::from_value(value).map_err(|e| EngineError::StreamInterrupted(format!("malformed chunk: {e}"))))
}

impl VertexEngine {
    pub fn new(client: AuthorizedClient, api_url: impl Into<String>, resource_name: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into(),
            resource_name: resource_name.into(),
        }
    }

    pub fn resource_name(&self) -> &str {
        &self.resource_name
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/v1/{}:{method}", self.api_url, self.resource_name)
    }

    /// Call one class method through `:query` and return its `output`.
    async fn query(&self, class_method: &str, input: Value, what: &str) -> Result<Value, EngineError> {
        let url = self.method_url("query");
        let body = json!({ "classMethod": class_method, "input": input });
        debug!(class_method, resource = %self.resource_name, "Reasoning engine query");

        let response = self.client.send(|c| c.post(&url).json(&body)).await?;
        let response = check(response, what).await?;
        let parsed: QueryResponse = response.json().await.map_err(|e| malformed(class_method, e))?;
        Ok(parsed.output)
    }
}

#[async_trait]
impl AgentEngine for VertexEngine {
    fn name(&self) -> &str {
        "vertex"
    }

    async fn create_session(&self, user_id: &UserId, state: &InitialState) -> Result<Session, EngineError> {
        let output = self
            .query(
                "create_session",
                json!({ "user_id": user_id, "state": state }),
                "create_session",
            )
            .await?;
        serde_json::from_value(output).map_err(|e| malformed("create_session", e))
    }

    async fn list_sessions(&self, user_id: &UserId) -> Result<Vec<Session>, EngineError> {
        let output = self
            .query("list_sessions", json!({ "user_id": user_id }), "list_sessions")
            .await?;
        if output.is_null() {
            return Ok(Vec::new());
        }
        let list: SessionList = serde_json::from_value(output).map_err(|e| malformed("list_sessions", e))?;
        Ok(list.sessions)
    }

    async fn get_session(&self, user_id: &UserId, session_id: &SessionId) -> Result<Session, EngineError> {
        let what = format!("session {session_id} of user {user_id}");
        let output = self
            .query(
                "get_session",
                json!({ "user_id": user_id, "session_id": session_id }),
                &what,
            )
            .await?;
        if output.is_null() {
            return Err(EngineError::NotFound(what));
        }
        serde_json::from_value(output).map_err(|e| malformed("get_session", e))
    }

    async fn delete_session(&self, user_id: &UserId, session_id: &SessionId) -> Result<(), EngineError> {
        let what = format!("session {session_id} of user {user_id}");
        self.query(
            "delete_session",
            json!({ "user_id": user_id, "session_id": session_id }),
            &what,
        )
        .await?;
        Ok(())
    }

    async fn stream_query(
        &self,
        user_id: &UserId,
        session_id: &SessionId,
        envelope: Envelope,
    ) -> Result<EngineStream, EngineError> {
        let url = self.method_url("streamQuery");
        let body = json!({
            "classMethod": "stream_query",
            "input": { "user_id": user_id, "session_id": session_id, "message": envelope },
        });
        let what = format!("session {session_id} of user {user_id}");
        let response = self.client.send(|c| c.post(&url).json(&body)).await?;
        let response = check(response, &what).await?;

        let (tx, rx) = mpsc::channel(64);
        let mut bytes = response.bytes_stream();
        tokio::spawn(async move {
            let mut buffer: Vec<u8> = Vec::new();
            while let Some(next) = bytes.next().await {
                match next {
                    Ok(data) => buffer.extend_from_slice(&data),
                    Err(e) => {
                        let _ = tx.send(Err(EngineError::StreamInterrupted(e.to_string()))).await;
                        return;
                    }
                }
                while let Some(end) = buffer.iter().position(|b| *b == b'\n') {
                    let line: Vec<u8> = buffer.drain(..=end).collect();
                    if !forward(&tx, &String::from_utf8_lossy(&line)).await {
                        return;
                    }
                }
            }
            if !buffer.is_empty() {
                forward(&tx, &String::from_utf8_lossy(&buffer)).await;
            }
        });
        Ok(rx)
    }
}

/// Send one parsed line on. Returns false once the stream should stop.
async fn forward(tx: &mpsc::Sender<Result<EngineChunk, EngineError>>, line: &str) -> bool {
    match parse_stream_line(line) {
        None => true,
        Some(Ok(chunk)) => tx.send(Ok(chunk)).await.is_ok(),
        Some(Err(e)) => {
            warn!(error = %e, "Reasoning engine stream failed");
            let _ = tx.send(Err(e)).await;
            false
        }
    }
}

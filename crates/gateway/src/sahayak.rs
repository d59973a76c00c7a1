//! `/sahayak` routes: deployment admin, sessions, answers and uploads.
//!
//! - `GET    /sahayak/ping`
//! - `POST   /sahayak/create_deployment`
//! - `GET    /sahayak/get_deployment`
//! - `DELETE /sahayak/delete_deployment`
//! - `POST   /sahayak/create_session?user_id=`
//! - `GET    /sahayak/get_sessions?user_id=`
//! - `GET    /sahayak/get_session_message?user_id=&session_id=`
//! - `DELETE /sahayak/delete_session?user_id=&session_id=`
//! - `POST   /sahayak/get_answer` (JSON)
//! - `POST   /sahayak/upload_file` (multipart: `user_id`, `session_id`, `file`)

use axum::extract::{Multipart, Query, State};
use axum::response::Json;
use axum::routing::{delete, get, post};
use axum::Router;
use sahayak_core::content::QueryHints;
use sahayak_core::session::{SessionMessage, SessionOverview};
use sahayak_core::{SessionId, UserId};
use sahayak_runtime::{AttachmentSource, DeploymentStatus, QueryReply, QueryRequest};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::error::ApiError;
use crate::SharedContext;

pub fn router() -> Router<SharedContext> {
    Router::new()
        .route("/ping", get(ping))
        .route("/create_deployment", post(create_deployment))
        .route("/get_deployment", get(get_deployment))
        .route("/delete_deployment", delete(delete_deployment))
        .route("/create_session", post(create_session))
        .route("/get_sessions", get(get_sessions))
        .route("/get_session_message", get(get_session_message))
        .route("/delete_session", delete(delete_session))
        .route("/get_answer", post(get_answer))
        .route("/upload_file", post(upload_file))
}

#[derive(Debug, Deserialize)]
struct UserQuery {
    user_id: String,
}

#[derive(Debug, Deserialize)]
struct SessionQuery {
    user_id: String,
    session_id: String,
}

async fn ping() -> Json<Value> {
    Json(json!({ "message": "Sahayak API is working." }))
}

async fn create_deployment(State(ctx): State<SharedContext>) -> Result<Json<DeploymentStatus>, ApiError> {
    Ok(Json(ctx.deployments.create().await?))
}

async fn get_deployment(State(ctx): State<SharedContext>) -> Json<DeploymentStatus> {
    Json(ctx.deployments.get().await)
}

async fn delete_deployment(State(ctx): State<SharedContext>) -> Result<Json<DeploymentStatus>, ApiError> {
    Ok(Json(ctx.deployments.delete().await?))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub session_id: SessionId,
}

async fn create_session(
    State(ctx): State<SharedContext>,
    Query(query): Query<UserQuery>,
) -> Result<Json<CreateSessionResponse>, ApiError> {
    let session_id = ctx.sessions.create(&UserId::from(query.user_id)).await?;
    Ok(Json(CreateSessionResponse { session_id }))
}

async fn get_sessions(
    State(ctx): State<SharedContext>,
    Query(query): Query<UserQuery>,
) -> Result<Json<SessionOverview>, ApiError> {
    let overview = ctx
        .sessions
        .list_with_latest_messages(&UserId::from(query.user_id))
        .await?;
    Ok(Json(overview))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessagesResponse {
    pub messages: Vec<SessionMessage>,
}

async fn get_session_message(
    State(ctx): State<SharedContext>,
    Query(query): Query<SessionQuery>,
) -> Result<Json<MessagesResponse>, ApiError> {
    let messages = ctx
        .sessions
        .get_messages(&UserId::from(query.user_id), &SessionId::from(query.session_id))
        .await?;
    Ok(Json(MessagesResponse { messages }))
}

async fn delete_session(State(ctx): State<SharedContext>, Query(query): Query<SessionQuery>) -> Json<Value> {
    let outcome = ctx
        .sessions
        .delete(&UserId::from(query.user_id), &SessionId::from(query.session_id))
        .await;
    Json(json!({ "message": outcome.message() }))
}

/// Body of `get_answer`. `attachment` names a file uploaded earlier.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRequest {
    #[serde(rename = "user_id")]
    pub user_id: String,
    #[serde(rename = "session_id", default)]
    pub session_id: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub attachment: Option<String>,
    #[serde(default)]
    pub target_audience: Option<Vec<String>>,
    #[serde(default)]
    pub response_tone: Option<String>,
    #[serde(default)]
    pub complexity_level: Option<String>,
}

impl AnswerRequest {
    fn into_query(self) -> QueryRequest {
        QueryRequest {
            user_id: UserId::from(self.user_id),
            session_id: SessionId::from(self.session_id),
            message: self.message,
            attachment: self
                .attachment
                .filter(|name| !name.is_empty())
                .map(AttachmentSource::Stored),
            hints: QueryHints {
                target_audience: self.target_audience.unwrap_or_default(),
                response_tone: self.response_tone,
                complexity_level: self.complexity_level,
            },
        }
    }
}

async fn get_answer(
    State(ctx): State<SharedContext>,
    Json(body): Json<AnswerRequest>,
) -> Result<Json<QueryReply>, ApiError> {
    debug!(user_id = %body.user_id, session_id = %body.session_id, "Answer requested");
    Ok(Json(ctx.assistant.send_query(body.into_query()).await?))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    pub filename: String,
    pub gcs_uri: String,
}

async fn upload_file(
    State(ctx): State<SharedContext>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut user_id: Option<String> = None;
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("invalid multipart body: {e}")))?
    {
        match field.name() {
            Some("user_id") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("invalid user_id field: {e}")))?;
                user_id = Some(value);
            }
            Some("file") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("invalid file field: {e}")))?;
                file = Some((filename, bytes.to_vec()));
            }
            // session_id travels with the form but storage is per user.
            _ => {}
        }
    }

    let user_id = user_id
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::bad_request("missing user_id field"))?;
    let (filename, bytes) = file.ok_or_else(|| ApiError::bad_request("missing file field"))?;

    let size = bytes.len();
    let stored = ctx
        .assistant
        .upload_attachment(&UserId::from(user_id), &filename, bytes)
        .await?;
    info!(object = %stored.name, size, "Upload stored");
    Ok(Json(UploadResponse {
        success: true,
        filename,
        gcs_uri: stored.uri,
    }))
}

#[cfg(test)]
mod tests {
    use crate::test_support::{body_json, context, request};
    use axum::http::StatusCode;
    use serde_json::json;
    use tower::ServiceExt;

    #[tokio::test]
    async fn ping_responds() {
        let (app, _) = context(&[]).await;
        let response = app.oneshot(request("GET", "/sahayak/ping", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["message"], "Sahayak API is working.");
    }

    #[tokio::test]
    async fn deployment_admin_cycle() {
        let (app, _) = context(&[]).await;

        let got = body_json(
            app.clone()
                .oneshot(request("GET", "/sahayak/get_deployment", None))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(got["message"], "Deployment available");
        let id = got["resource_id"].as_str().unwrap().to_string();

        let deleted = app
            .clone()
            .oneshot(request("DELETE", "/sahayak/delete_deployment", None))
            .await
            .unwrap();
        assert_eq!(deleted.status(), StatusCode::OK);
        assert_eq!(
            body_json(deleted).await["message"],
            format!("Resource {id} deleted successfully.")
        );

        let none = body_json(
            app.clone()
                .oneshot(request("GET", "/sahayak/get_deployment", None))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(none["message"], "No deployment available.");
        assert_eq!(none["resource_id"], "");

        let again = app
            .clone()
            .oneshot(request("DELETE", "/sahayak/delete_deployment", None))
            .await
            .unwrap();
        assert_eq!(again.status(), StatusCode::NOT_FOUND);

        let created = body_json(
            app.oneshot(request("POST", "/sahayak/create_deployment", None))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(created["message"], "New deployment Created!");
    }

    #[tokio::test]
    async fn sessions_over_http() {
        let (app, _) = context(&["Hello teacher!"]).await;

        let overview = body_json(
            app.clone()
                .oneshot(request("GET", "/sahayak/get_sessions?user_id=t1", None))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(overview["sessions"].as_array().unwrap().len(), 1);
        let session_id = overview["sessions"][0]["id"].as_str().unwrap().to_string();

        let answer = app
            .clone()
            .oneshot(request(
                "POST",
                "/sahayak/get_answer",
                Some(json!({ "user_id": "t1", "session_id": session_id, "message": "hello" })),
            ))
            .await
            .unwrap();
        assert_eq!(answer.status(), StatusCode::OK);
        let answer = body_json(answer).await;
        assert_eq!(answer["message"], "Hello teacher!");
        assert_eq!(answer["role"], "model");
        assert_eq!(answer["attachments"], json!({ "video_links": [], "articles": [] }));

        let uri = format!("/sahayak/get_session_message?user_id=t1&session_id={session_id}");
        let messages = body_json(app.clone().oneshot(request("GET", &uri, None)).await.unwrap()).await;
        assert_eq!(messages["messages"].as_array().unwrap().len(), 2);

        let uri = format!("/sahayak/delete_session?user_id=t1&session_id={session_id}");
        let deleted = body_json(app.clone().oneshot(request("DELETE", &uri, None)).await.unwrap()).await;
        assert_eq!(deleted["message"], "session deleted");
        let deleted = body_json(app.oneshot(request("DELETE", &uri, None)).await.unwrap()).await;
        assert_eq!(deleted["message"], "incorrect session details");
    }

    #[tokio::test]
    async fn empty_answer_is_bad_request() {
        let (app, _) = context(&[]).await;
        let response = app
            .oneshot(request(
                "POST",
                "/sahayak/get_answer",
                Some(json!({ "user_id": "t1", "session_id": "", "message": "" })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["error"].as_str().unwrap().contains("Empty input"));
    }

    #[tokio::test]
    async fn missing_attachment_is_not_found() {
        let (app, _) = context(&["never"]).await;
        let response = app
            .oneshot(request(
                "POST",
                "/sahayak/get_answer",
                Some(json!({ "user_id": "t1", "session_id": "", "message": "hello", "attachment": "ghost.pdf" })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn upload_file_stores_under_user() {
        let (app, store) = context(&[]).await;
        let boundary = "sahayakboundary";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"user_id\"\r\n\r\nt1\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"session_id\"\r\n\r\ns1\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"leaf.png\"\r\n\
             Content-Type: image/png\r\n\r\nPNGDATA\r\n--{b}--\r\n",
            b = boundary
        );
        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/sahayak/upload_file")
            .header("content-type", format!("multipart/form-data; boundary={boundary}"))
            .body(axum::body::Body::from(body))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["filename"], "leaf.png");
        assert_eq!(json["gcs_uri"], "gs://sahayak-test/t1/chat/uploaded/leaf.png");

        let names = store.object_names().await;
        assert!(names.contains(&"t1/chat/uploaded/leaf.png".to_string()));
        assert!(names.contains(&"t1/generated/.keep".to_string()));
    }

    #[tokio::test]
    async fn missing_query_parameter_is_rejected() {
        let (app, _) = context(&[]).await;
        let response = app
            .oneshot(request("POST", "/sahayak/create_session", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

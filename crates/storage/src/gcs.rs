//! Google Cloud Storage backend over the JSON API.

use async_trait::async_trait;
use reqwest::{Response, Url};
use sahayak_core::error::StorageError;
use sahayak_core::storage::{ObjectStore, RewriteProgress, StoredObject};
use sahayak_google::AuthorizedClient;
use serde::Deserialize;
use tracing::{debug, warn};

pub struct GcsObjectStore {
    bucket: String,
    api_url: Url,
    public_base_url: String,
    client: AuthorizedClient,
}

impl GcsObjectStore {
    pub fn new(
        client: AuthorizedClient,
        bucket: impl Into<String>,
        api_url: &str,
        public_base_url: &str,
    ) -> Result<Self, StorageError> {
        let api_url = Url::parse(api_url).map_err(|e| StorageError::Api {
            status_code: 0,
            message: format!("invalid storage api_url '{api_url}': {e}"),
        })?;
        Ok(Self {
            bucket: bucket.into(),
            api_url,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Build `{api}/{segments...}` with every segment percent-encoded, so
    /// object names keep their slashes inside one segment.
    fn url(&self, segments: &[&str]) -> Result<Url, StorageError> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| StorageError::Api {
                status_code: 0,
                message: format!("storage api_url '{}' cannot be a base", self.api_url),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn object_url(&self, name: &str, suffix: &[&str]) -> Result<Url, StorageError> {
        let mut segments = vec!["storage", "v1", "b", self.bucket.as_str(), "o", name];
        segments.extend_from_slice(suffix);
        self.url(&segments)
    }

    async fn check(response: Response, name: &str) -> Result<Response, StorageError> {
        let status = response.status().as_u16();
        if response.status().is_success() {
            return Ok(response);
        }
        if status == 404 {
            return Err(StorageError::NotFound(name.to_string()));
        }
        let body = response.text().await.unwrap_or_default();
        warn!(status, object = name, body = %body, "Storage request failed");
        Err(StorageError::Api {
            status_code: status,
            message: body,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RewriteResponse {
    #[serde(default)]
    total_bytes_rewritten: Option<String>,
    #[serde(default)]
    object_size: Option<String>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    rewrite_token: Option<String>,
}

fn parse_count(value: Option<String>) -> u64 {
    value.and_then(|v| v.parse().ok()).unwrap_or(0)
}

#[async_trait]
impl ObjectStore for GcsObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn exists(&self, name: &str) -> Result<bool, StorageError> {
        let url = self.object_url(name, &[])?;
        let response = self.client.send(|c| c.get(url.clone())).await?;
        match Self::check(response, name).await {
            Ok(_) => Ok(true),
            Err(StorageError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn rewrite(
        &self,
        source: &str,
        destination: &str,
        rewrite_token: Option<&str>,
    ) -> Result<RewriteProgress, StorageError> {
        let mut url = self.object_url(source, &["rewriteTo", "b", self.bucket.as_str(), "o", destination])?;
        if let Some(token) = rewrite_token {
            url.query_pairs_mut().append_pair("rewriteToken", token);
        }

        let response = self
            .client
            .send(|c| c.post(url.clone()).json(&serde_json::json!({})))
            .await?;
        let body: RewriteResponse = Self::check(response, source)
            .await?
            .json()
            .await
            .map_err(|e| StorageError::Network(e.to_string()))?;

        let progress = RewriteProgress {
            rewrite_token: if body.done { None } else { body.rewrite_token },
            bytes_rewritten: parse_count(body.total_bytes_rewritten),
            object_size: parse_count(body.object_size),
        };
        if !body.done && progress.rewrite_token.is_none() {
            return Err(StorageError::Api {
                status_code: 200,
                message: "rewrite not done but no rewriteToken returned".into(),
            });
        }
        debug!(
            source,
            destination,
            bytes = progress.bytes_rewritten,
            size = progress.object_size,
            done = body.done,
            "Rewrite round trip"
        );
        Ok(progress)
    }

    async fn delete(&self, name: &str) -> Result<(), StorageError> {
        let url = self.object_url(name, &[])?;
        let response = self.client.send(|c| c.delete(url.clone())).await?;
        Self::check(response, name).await.map(|_| ())
    }

    async fn upload(
        &self,
        name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<StoredObject, StorageError> {
        let mut url = self.url(&["upload", "storage", "v1", "b", self.bucket.as_str(), "o"])?;
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("name", name);

        let response = self
            .client
            .send(|c| {
                c.post(url.clone())
                    .header(reqwest::header::CONTENT_TYPE, content_type)
                    .body(bytes.clone())
            })
            .await?;
        Self::check(response, name).await?;
        Ok(StoredObject {
            name: name.to_string(),
            uri: format!("gs://{}/{name}", self.bucket),
        })
    }

    async fn download(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        let mut url = self.object_url(name, &[])?;
        url.query_pairs_mut().append_pair("alt", "media");
        let response = self.client.send(|c| c.get(url.clone())).await?;
        let bytes = Self::check(response, name)
            .await?
            .bytes()
            .await
            .map_err(|e| StorageError::Network(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn make_public(&self, name: &str) -> Result<(), StorageError> {
        let url = self.object_url(name, &["acl"])?;
        let body = serde_json::json!({ "entity": "allUsers", "role": "READER" });
        let response = self.client.send(|c| c.post(url.clone()).json(&body)).await?;
        Self::check(response, name).await.map(|_| ())
    }

    fn public_url(&self, name: &str) -> String {
        crate::public_object_url(&self.public_base_url, &self.bucket, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::extract::{Path, Query, State};
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use sahayak_google::StaticTokenSource;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct FakeGcs {
        objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
        rewrite_calls: Arc<Mutex<Vec<Option<String>>>>,
    }

    async fn spawn_gcs(fake: FakeGcs) -> String {
        let app = Router::new()
            .route(
                "/storage/v1/b/{bucket}/o/{name}",
                get(
                    |State(f): State<FakeGcs>,
                     Path((_b, name)): Path<(String, String)>,
                     Query(q): Query<HashMap<String, String>>| async move {
                        let objects = f.objects.lock().unwrap();
                        match objects.get(&name) {
                            None => (StatusCode::NOT_FOUND, Vec::new()),
                            Some(bytes) if q.get("alt").map(String::as_str) == Some("media") => {
                                (StatusCode::OK, bytes.clone())
                            }
                            Some(_) => (StatusCode::OK, br#"{"name":"x"}"#.to_vec()),
                        }
                    },
                )
                .delete(
                    |State(f): State<FakeGcs>, Path((_b, name)): Path<(String, String)>| async move {
                        match f.objects.lock().unwrap().remove(&name) {
                            Some(_) => StatusCode::NO_CONTENT,
                            None => StatusCode::NOT_FOUND,
                        }
                    },
                ),
            )
            .route(
                "/storage/v1/b/{bucket}/o/{src}/rewriteTo/b/{dbucket}/o/{dst}",
                post(
                    |State(f): State<FakeGcs>,
                     Path((_b, src, _db, dst)): Path<(String, String, String, String)>,
                     Query(q): Query<HashMap<String, String>>| async move {
                        let token = q.get("rewriteToken").cloned();
                        f.rewrite_calls.lock().unwrap().push(token.clone());
                        let mut objects = f.objects.lock().unwrap();
                        let Some(bytes) = objects.get(&src).cloned() else {
                            return (StatusCode::NOT_FOUND, axum::Json(serde_json::json!({})));
                        };
                        if token.is_none() {
                            return (
                                StatusCode::OK,
                                axum::Json(serde_json::json!({
                                    "totalBytesRewritten": "1", "objectSize": bytes.len().to_string(),
                                    "done": false, "rewriteToken": "tok-1"
                                })),
                            );
                        }
                        objects.insert(dst, bytes.clone());
                        (
                            StatusCode::OK,
                            axum::Json(serde_json::json!({
                                "totalBytesRewritten": bytes.len().to_string(),
                                "objectSize": bytes.len().to_string(), "done": true
                            })),
                        )
                    },
                ),
            )
            .route(
                "/upload/storage/v1/b/{bucket}/o",
                post(
                    |State(f): State<FakeGcs>,
                     Query(q): Query<HashMap<String, String>>,
                     body: axum::body::Bytes| async move {
                        let name = q.get("name").cloned().unwrap_or_default();
                        f.objects.lock().unwrap().insert(name, body.to_vec());
                        StatusCode::OK
                    },
                ),
            )
            .with_state(fake);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind mock server");
        let addr = listener.local_addr().expect("mock server address");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{addr}")
    }

    fn store(base: &str) -> GcsObjectStore {
        let client = AuthorizedClient::new(Arc::new(StaticTokenSource::new("t")));
        GcsObjectStore::new(client, "bkt", base, "https://storage.googleapis.com").unwrap()
    }

    #[test]
    fn object_names_are_single_encoded_segments() {
        let s = store("https://storage.googleapis.com");
        let url = s.object_url("u 1/chat/uploaded/a.png", &["acl"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://storage.googleapis.com/storage/v1/b/bkt/o/u%201%2Fchat%2Fuploaded%2Fa.png/acl"
        );
        assert_eq!(
            s.public_url("u/generated/w.txt"),
            "https://storage.googleapis.com/bkt/u/generated/w.txt"
        );
        assert_eq!(
            s.public_url("Class 5B #2/generated/worksheet_1.txt"),
            "https://storage.googleapis.com/bkt/Class%205B%20%232/generated/worksheet_1.txt"
        );
    }

    #[tokio::test]
    async fn rewrite_follows_token_and_round_trips() {
        let fake = FakeGcs::default();
        let base = spawn_gcs(fake.clone()).await;
        let s = store(&base);

        s.upload("u/chat/uploaded/a.png", b"png!".to_vec(), "image/png").await.unwrap();
        assert!(s.exists("u/chat/uploaded/a.png").await.unwrap());
        assert!(!s.exists("u/chat/uploaded/none.png").await.unwrap());

        let first = s.rewrite("u/chat/uploaded/a.png", "u/chat/processed/a.png", None).await.unwrap();
        assert_eq!(first.rewrite_token.as_deref(), Some("tok-1"));
        let second = s
            .rewrite("u/chat/uploaded/a.png", "u/chat/processed/a.png", first.rewrite_token.as_deref())
            .await
            .unwrap();
        assert!(second.is_done());
        assert_eq!(second.object_size, 4);

        assert_eq!(s.download("u/chat/processed/a.png").await.unwrap(), b"png!");
        s.delete("u/chat/uploaded/a.png").await.unwrap();
        assert!(matches!(
            s.delete("u/chat/uploaded/a.png").await,
            Err(StorageError::NotFound(_))
        ));
        assert_eq!(
            *fake.rewrite_calls.lock().unwrap(),
            vec![None, Some("tok-1".to_string())]
        );
    }
}

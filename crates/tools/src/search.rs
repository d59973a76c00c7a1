//! Resource discovery tools: web articles and videos.
//!
//! Both return `[{title, link}]` so the handler can merge them without
//! knowing (or telling the user) which source produced a result.

use async_trait::async_trait;
use regex_lite::Regex;
use reqwest::Url;
use sahayak_core::error::ToolError;
use sahayak_core::tool::{Tool, ToolContext, ToolResult};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::debug;

use crate::http::{client, failed, get_text, strip_tags};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub link: String,
}

fn query_arg(arguments: &serde_json::Value) -> Result<&str, ToolError> {
    arguments["query"]
        .as_str()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))
}

fn hits_result(hits: Vec<SearchHit>) -> ToolResult {
    let output = serde_json::to_string_pretty(&hits).unwrap_or_else(|_| "[]".into());
    ToolResult::ok(output).with_data(serde_json::to_value(&hits).unwrap_or_default())
}

fn query_schema(description: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "query": { "type": "string", "description": description }
        },
        "required": ["query"]
    })
}

// --- Web search ---

static RESULT_ANCHOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<a\s([^>]*class="[^"]*result__a[^"]*"[^>]*)>(.*?)</a>"#)
        .expect("valid result anchor pattern")
});

static HREF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"href="([^"]+)""#).expect("valid href pattern")
});

/// Resolve a result href: DuckDuckGo wraps targets as `//duckduckgo.com/l/?uddg=...`.
fn resolve_href(href: &str) -> Option<String> {
    let href = href.replace("&amp;", "&");
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href
    };
    let url = Url::parse(&absolute).ok()?;
    if let Some((_, target)) = url.query_pairs().find(|(k, _)| k == "uddg") {
        return Some(target.into_owned());
    }
    Some(absolute)
}

/// Extract the first `limit` result links from a DuckDuckGo HTML page.
/// Only `http(s)` targets are kept.
pub fn parse_duckduckgo(html: &str, limit: usize) -> Vec<SearchHit> {
    RESULT_ANCHOR
        .captures_iter(html)
        .filter_map(|cap| {
            let attrs = cap.get(1)?.as_str();
            let href = HREF.captures(attrs)?.get(1)?.as_str();
            let link = resolve_href(href)?;
            if !link.starts_with("http") {
                return None;
            }
            let title = strip_tags(cap.get(2)?.as_str());
            Some(SearchHit { title, link })
        })
        .take(limit)
        .collect()
}

/// Web article search over the DuckDuckGo HTML endpoint.
pub struct WebSearchTool {
    endpoint: String,
    limit: usize,
    client: reqwest::Client,
}

impl WebSearchTool {
    pub fn new(endpoint: impl Into<String>, limit: usize) -> Self {
        Self {
            endpoint: endpoint.into(),
            limit: limit.max(1),
            client: client(),
        }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for teaching articles on a topic. Returns titles and links."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        query_schema("Search query including class, syllabus and topic")
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        _ctx: &ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let query = query_arg(&arguments)?;
        debug!(query, "Web search");
        let html = get_text(
            self.name(),
            self.client.get(&self.endpoint).query(&[("q", query)]),
        )
        .await?;
        Ok(hits_result(parse_duckduckgo(&html, self.limit)))
    }
}

// --- Video search ---

#[derive(Debug, Deserialize)]
struct YoutubeResponse {
    #[serde(default)]
    items: Vec<YoutubeItem>,
}

#[derive(Debug, Deserialize)]
struct YoutubeItem {
    #[serde(default)]
    id: YoutubeId,
    #[serde(default)]
    snippet: Option<YoutubeSnippet>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YoutubeId {
    #[serde(default)]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct YoutubeSnippet {
    #[serde(default)]
    title: String,
}

fn youtube_hits(body: YoutubeResponse, limit: usize) -> Vec<SearchHit> {
    body.items
        .into_iter()
        .filter_map(|item| {
            let id = item.id.video_id?;
            Some(SearchHit {
                title: item.snippet.map(|s| s.title).unwrap_or_default(),
                link: format!("https://www.youtube.com/watch?v={id}"),
            })
        })
        .take(limit)
        .collect()
}

/// Educational video search over the YouTube Data API v3.
pub struct VideoSearchTool {
    endpoint: String,
    api_key: Option<String>,
    limit: usize,
    client: reqwest::Client,
}

impl VideoSearchTool {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>, limit: usize) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.filter(|k| !k.is_empty()),
            limit: limit.max(1),
            client: client(),
        }
    }
}

#[async_trait]
impl Tool for VideoSearchTool {
    fn name(&self) -> &str {
        "video_search"
    }

    fn description(&self) -> &str {
        "Search for educational videos on a topic. Returns titles and links."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        query_schema("Search query including class, syllabus and topic")
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        _ctx: &ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let query = query_arg(&arguments)?;
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| failed(self.name(), "video search is not configured"))?;
        debug!(query, "Video search");

        let max = self.limit.to_string();
        let body = get_text(
            self.name(),
            self.client.get(&self.endpoint).query(&[
                ("part", "snippet"),
                ("type", "video"),
                ("maxResults", max.as_str()),
                ("q", query),
                ("key", key),
            ]),
        )
        .await?;
        let parsed: YoutubeResponse =
            serde_json::from_str(&body).map_err(|e| failed(self.name(), e))?;
        Ok(hits_result(youtube_hits(parsed, self.limit)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sahayak_core::{SessionId, UserId};

    const DDG_PAGE: &str = r#"
        <div class="result">
          <a rel="nofollow" class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.org%2Fphotosynthesis&amp;rut=abc">Photosynthesis <b>for</b> Class 7</a>
        </div>
        <div class="result">
          <a class="result__a" href="https://www.khanacademy.org/science/biology">Khan Academy</a>
        </div>
        <div class="result">
          <a class="result__a" href="/relative/ad">Sponsored</a>
        </div>
        <div class="result">
          <a class="result__a" href="https://third.example.com/">Third</a>
        </div>
    "#;

    fn ctx() -> ToolContext {
        ToolContext::new(UserId::from("u"), SessionId::from("s"))
    }

    #[test]
    fn duckduckgo_links_are_resolved_and_limited() {
        let hits = parse_duckduckgo(DDG_PAGE, 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].link, "https://example.org/photosynthesis");
        assert_eq!(hits[0].title, "Photosynthesis for Class 7");
        assert_eq!(hits[1].link, "https://www.khanacademy.org/science/biology");
    }

    #[test]
    fn non_http_links_are_skipped() {
        let hits = parse_duckduckgo(DDG_PAGE, 10);
        assert_eq!(hits.len(), 3);
        assert!(hits.iter().all(|h| h.link.starts_with("http")));
    }

    #[test]
    fn youtube_items_become_watch_links() {
        let body: YoutubeResponse = serde_json::from_value(serde_json::json!({
            "items": [
                {"id": {"kind": "youtube#video", "videoId": "abc123"}, "snippet": {"title": "Fractions made easy"}},
                {"id": {"kind": "youtube#channel"}, "snippet": {"title": "A channel"}},
                {"id": {"videoId": "def456"}, "snippet": {"title": "Adding fractions"}}
            ]
        }))
        .unwrap();
        let hits = youtube_hits(body, 5);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].link, "https://www.youtube.com/watch?v=abc123");
        assert_eq!(hits[1].title, "Adding fractions");
    }

    #[tokio::test]
    async fn video_search_without_key_fails_cleanly() {
        let tool = VideoSearchTool::new("http://127.0.0.1:9", None, 5);
        let err = tool
            .execute(serde_json::json!({"query": "fractions"}), &ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { .. }));
    }

    #[tokio::test]
    async fn missing_query_is_invalid() {
        let tool = WebSearchTool::new("http://127.0.0.1:9", 5);
        let result = tool.execute(serde_json::json!({"query": "  "}), &ctx()).await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }

    #[tokio::test]
    async fn web_search_against_mock_page() {
        let app = axum::Router::new().route("/html/", axum::routing::get(|| async { DDG_PAGE }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind mock server");
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let tool = WebSearchTool::new(format!("http://{addr}/html/"), 5);
        let result = tool
            .execute(serde_json::json!({"query": "photosynthesis class 7"}), &ctx())
            .await
            .unwrap();
        let hits: Vec<SearchHit> = serde_json::from_value(result.data.unwrap()).unwrap();
        assert_eq!(hits.len(), 3);
    }
}

//! Shared HTTP client for the scraping and search tools.

use sahayak_core::error::ToolError;

const USER_AGENT: &str = concat!("sahayak/", env!("CARGO_PKG_VERSION"));

pub(crate) fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

pub(crate) fn failed(tool_name: &str, reason: impl std::fmt::Display) -> ToolError {
    ToolError::ExecutionFailed {
        tool_name: tool_name.to_string(),
        reason: reason.to_string(),
    }
}

/// Send a request and read the body as text, mapping transport and status failures to `ToolError`.
pub(crate) async fn get_text(
    tool_name: &str,
    request: reqwest::RequestBuilder,
) -> Result<String, ToolError> {
    let response = request.send().await.map_err(|e| failed(tool_name, e))?;
    let status = response.status();
    if !status.is_success() {
        return Err(failed(tool_name, format!("HTTP {}", status.as_u16())));
    }
    response.text().await.map_err(|e| failed(tool_name, e))
}

/// Remove tags and collapse whitespace.
pub(crate) fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                out.push(' ');
            }
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    decode_entities(&out.split_whitespace().collect::<Vec<_>>().join(" "))
}

fn decode_entities(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
}

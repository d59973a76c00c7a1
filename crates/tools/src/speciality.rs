//! "What is special about today" lookup for the thought-of-the-day handler.

use async_trait::async_trait;
use regex_lite::Regex;
use sahayak_core::error::ToolError;
use sahayak_core::tool::{Tool, ToolContext, ToolResult};
use std::sync::LazyLock;
use tracing::warn;

use crate::http::{client, get_text, strip_tags};

static TODAY_LIST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<ul[^>]*class="[^"]*\btoday\b[^"]*"[^>]*>(.*?)</ul>"#)
        .expect("valid today list pattern")
});

static LIST_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<li[^>]*>(.*?)</li>").expect("valid list item pattern"));

/// Items of the first `<ul class="today">` on the page, tags stripped.
pub fn parse_today(html: &str) -> Vec<String> {
    let Some(list) = TODAY_LIST.captures(html).and_then(|c| c.get(1)) else {
        return Vec::new();
    };
    LIST_ITEM
        .captures_iter(list.as_str())
        .filter_map(|c| c.get(1))
        .map(|m| strip_tags(m.as_str()))
        .filter(|s| !s.is_empty())
        .collect()
}

pub struct TodaySpecialityTool {
    url: String,
    client: reqwest::Client,
}

impl TodaySpecialityTool {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: client(),
        }
    }
}

#[async_trait]
impl Tool for TodaySpecialityTool {
    fn name(&self) -> &str {
        "get_today_speciality"
    }

    fn description(&self) -> &str {
        "Find out what is special about today: observances, anniversaries and notable events."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    /// Lookup failures come back as a descriptive result, not an error.
    async fn execute(
        &self,
        _arguments: serde_json::Value,
        _ctx: &ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let html = match get_text(self.name(), self.client.get(&self.url)).await {
            Ok(html) => html,
            Err(e) => {
                warn!(error = %e, "Speciality lookup failed");
                return Ok(ToolResult::ok(format!(
                    "Could not fetch today's speciality right now ({e})."
                )));
            }
        };

        let items = parse_today(&html);
        if items.is_empty() {
            return Ok(ToolResult::ok(
                "No special day information was found for today.",
            ));
        }
        Ok(ToolResult::ok(items.join("\n")).with_data(serde_json::json!(items)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sahayak_core::{SessionId, UserId};

    #[test]
    fn parses_today_items() {
        let html = r#"
            <ul class="menu"><li>Home</li></ul>
            <ul class="today">
              <li><a href="/kargil">Kargil Vijay Diwas</a></li>
              <li>Birthday of <b>someone</b></li>
              <li> </li>
            </ul>"#;
        assert_eq!(
            parse_today(html),
            vec!["Kargil Vijay Diwas".to_string(), "Birthday of someone".to_string()]
        );
    }

    #[test]
    fn page_without_list_is_empty() {
        assert!(parse_today("<html><body>nothing</body></html>").is_empty());
    }

    #[tokio::test]
    async fn unreachable_site_is_a_message_not_an_error() {
        let tool = TodaySpecialityTool::new("http://127.0.0.1:9/");
        let ctx = ToolContext::new(UserId::from("u"), SessionId::from("s"));
        let result = tool.execute(serde_json::json!({}), &ctx).await.unwrap();
        assert!(result.success);
        assert!(result.output.starts_with("Could not fetch"));
    }
}

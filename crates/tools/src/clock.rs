//! Current date and time in the configured local offset.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Offset, Utc};
use sahayak_core::error::ToolError;
use sahayak_core::tool::{Tool, ToolContext, ToolResult};

/// A fixed UTC offset; falls back to UTC for out-of-range minutes.
pub fn offset_from_minutes(minutes: i32) -> FixedOffset {
    FixedOffset::east_opt(minutes.saturating_mul(60)).unwrap_or_else(|| Utc.fix())
}

pub struct ClockTool {
    offset: FixedOffset,
}

impl ClockTool {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.offset)
    }
}

pub fn describe(now: DateTime<FixedOffset>) -> String {
    now.format("%A, %d %B %Y, %H:%M (UTC%:z)").to_string()
}

#[async_trait]
impl Tool for ClockTool {
    fn name(&self) -> &str {
        "get_current_datetime"
    }

    fn description(&self) -> &str {
        "Get today's date, weekday and current local time."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    async fn execute(
        &self,
        _arguments: serde_json::Value,
        _ctx: &ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let now = self.now();
        Ok(ToolResult::ok(describe(now)).with_data(serde_json::json!({
            "date": now.format("%Y-%m-%d").to_string(),
            "time": now.format("%H:%M").to_string(),
            "iso": now.to_rfc3339(),
        })))
    }
}

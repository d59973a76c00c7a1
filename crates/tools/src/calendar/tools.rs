//! Calendar tools exposed to the lesson planner.
//!
//! Listing hands event ids to the model so it can address events in later
//! calls. The user-facing text produced by create/edit never contains them.

use async_trait::async_trait;
use sahayak_core::error::ToolError;
use sahayak_core::tool::{Tool, ToolContext, ToolResult};

use super::{Calendar, CalendarEvent, EventDraft, Schedule, invalid};

fn str_arg<'a>(arguments: &'a serde_json::Value, key: &str) -> Result<&'a str, ToolError> {
    arguments[key]
        .as_str()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| invalid(format!("Missing '{key}' argument")))
}

fn describe(calendar: &Calendar, event: &CalendarEvent) -> String {
    format!(
        "\"{}\" on {} from {} to {}",
        event.summary,
        event.start.with_timezone(&calendar.offset()).format("%d %B %Y"),
        calendar.clock(event.start),
        calendar.clock(event.end)
    )
}

fn schedule_result(calendar: &Calendar, outcome: Schedule, verb: &str) -> ToolResult {
    match outcome {
        Schedule::Booked(event) => ToolResult::ok(format!("{verb} {}.", describe(calendar, &event)))
            .with_data(serde_json::json!({ "status": "booked" })),
        Schedule::Conflict(existing) => ToolResult {
            call_id: String::new(),
            success: false,
            output: format!(
                "Conflict: {} is already scheduled. Nothing was changed; suggest a different time.",
                describe(calendar, &existing)
            ),
            data: Some(serde_json::json!({
                "status": "conflict",
                "conflict": {
                    "summary": existing.summary,
                    "start": calendar.clock(existing.start),
                    "end": calendar.clock(existing.end),
                }
            })),
        },
    }
}

fn draft_from(calendar: &Calendar, arguments: &serde_json::Value) -> Result<EventDraft, ToolError> {
    Ok(EventDraft {
        summary: str_arg(arguments, "summary")?.to_string(),
        description: arguments["description"].as_str().map(String::from),
        start: calendar.parse_time(str_arg(arguments, "start")?)?,
        end: calendar.parse_time(str_arg(arguments, "end")?)?,
    })
}

fn event_schema(with_id: bool) -> serde_json::Value {
    let mut schema = serde_json::json!({
        "type": "object",
        "properties": {
            "summary": { "type": "string", "description": "Title of the class or event" },
            "description": { "type": "string", "description": "Optional notes" },
            "start": { "type": "string", "description": "Start, YYYY-MM-DD HH:MM local time" },
            "end": { "type": "string", "description": "End, YYYY-MM-DD HH:MM local time" }
        },
        "required": ["summary", "start", "end"]
    });
    if with_id {
        schema["properties"]["event_id"] =
            serde_json::json!({ "type": "string", "description": "Id from list_events" });
        schema["required"] = serde_json::json!(["event_id", "summary", "start", "end"]);
    }
    schema
}

pub struct ListEventsTool {
    calendar: Calendar,
}

impl ListEventsTool {
    pub fn new(calendar: Calendar) -> Self {
        Self { calendar }
    }
}

#[async_trait]
impl Tool for ListEventsTool {
    fn name(&self) -> &str {
        "list_events"
    }

    fn description(&self) -> &str {
        "List the calendar events of one day. Ids are for later calls only; never show them to the user."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "date": { "type": "string", "description": "Day to list, YYYY-MM-DD (default today)" }
            }
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        _ctx: &ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let date = match arguments["date"].as_str().filter(|d| !d.is_empty()) {
            Some(d) => self.calendar.parse_date(d)?,
            None => self.calendar.today(),
        };
        let events = self.calendar.events_on(date).await?;
        if events.is_empty() {
            return Ok(ToolResult::ok(format!("No events on {date}.")));
        }
        let rows: Vec<serde_json::Value> = events
            .iter()
            .map(|e| {
                serde_json::json!({
                    "event_id": e.id,
                    "summary": e.summary,
                    "start": self.calendar.clock(e.start),
                    "end": self.calendar.clock(e.end),
                })
            })
            .collect();
        let output = serde_json::to_string_pretty(&rows).unwrap_or_default();
        Ok(ToolResult::ok(output).with_data(serde_json::json!(rows)))
    }
}

pub struct CreateEventTool {
    calendar: Calendar,
}

impl CreateEventTool {
    pub fn new(calendar: Calendar) -> Self {
        Self { calendar }
    }
}

#[async_trait]
impl Tool for CreateEventTool {
    fn name(&self) -> &str {
        "create_event"
    }

    fn description(&self) -> &str {
        "Schedule a class or event. Refuses when it overlaps an existing event."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        event_schema(false)
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        _ctx: &ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let draft = draft_from(&self.calendar, &arguments)?;
        let outcome = self.calendar.create_checked(draft).await?;
        Ok(schedule_result(&self.calendar, outcome, "Scheduled"))
    }
}

pub struct EditEventTool {
    calendar: Calendar,
}

impl EditEventTool {
    pub fn new(calendar: Calendar) -> Self {
        Self { calendar }
    }
}

#[async_trait]
impl Tool for EditEventTool {
    fn name(&self) -> &str {
        "edit_event"
    }

    fn description(&self) -> &str {
        "Reschedule or rename an existing event. Refuses when the new time overlaps another event."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        event_schema(true)
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        _ctx: &ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let id = str_arg(&arguments, "event_id")?;
        let draft = draft_from(&self.calendar, &arguments)?;
        let outcome = self.calendar.reschedule_checked(id, draft).await?;
        Ok(schedule_result(&self.calendar, outcome, "Updated"))
    }
}

pub struct DeleteEventTool {
    calendar: Calendar,
}

impl DeleteEventTool {
    pub fn new(calendar: Calendar) -> Self {
        Self { calendar }
    }
}

#[async_trait]
impl Tool for DeleteEventTool {
    fn name(&self) -> &str {
        "delete_event"
    }

    fn description(&self) -> &str {
        "Remove an event from the calendar."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "event_id": { "type": "string", "description": "Id from list_events" }
            },
            "required": ["event_id"]
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        _ctx: &ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let id = str_arg(&arguments, "event_id")?;
        self.calendar.delete(id).await?;
        Ok(ToolResult::ok("The event was removed."))
    }
}

//! Calendar access for the lesson planner.
//!
//! Backends only store events. Overlap checking lives in [`Calendar`] so
//! both the planner's tools and the HTTP surface refuse double bookings the
//! same way.

pub mod google;
pub mod memory;
pub mod tools;

pub use google::GoogleCalendar;
pub use memory::InMemoryCalendar;
pub use tools::{CreateEventTool, DeleteEventTool, EditEventTool, ListEventsTool};

use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use sahayak_core::error::ToolError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

impl CalendarEvent {
    /// Half-open overlap: touching end-to-start is not a conflict.
    pub fn overlaps(&self, start: DateTime<FixedOffset>, end: DateTime<FixedOffset>) -> bool {
        self.start < end && start < self.end
    }
}

/// Fields of an event to create or replace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDraft {
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

#[async_trait]
pub trait CalendarBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Events intersecting `[from, to)`, ordered by start time.
    async fn list(
        &self,
        from: DateTime<FixedOffset>,
        to: DateTime<FixedOffset>,
    ) -> Result<Vec<CalendarEvent>, ToolError>;

    async fn create(&self, draft: EventDraft) -> Result<CalendarEvent, ToolError>;

    async fn update(&self, id: &str, draft: EventDraft) -> Result<CalendarEvent, ToolError>;

    async fn delete(&self, id: &str) -> Result<(), ToolError>;
}

/// Result of a checked create or reschedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schedule {
    Booked(CalendarEvent),
    /// Nothing was written; this existing event is in the way.
    Conflict(CalendarEvent),
}

pub(crate) fn invalid(reason: impl Into<String>) -> ToolError {
    ToolError::InvalidArguments(reason.into())
}

/// Overlap-checked calendar operations in one local offset.
#[derive(Clone)]
pub struct Calendar {
    backend: Arc<dyn CalendarBackend>,
    offset: FixedOffset,
}

impl Calendar {
    pub fn new(backend: Arc<dyn CalendarBackend>, offset: FixedOffset) -> Self {
        Self { backend, offset }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Parse RFC 3339, or a naive `YYYY-MM-DD HH:MM[:SS]` / `YYYY-MM-DDTHH:MM[:SS]`
    /// taken in the calendar's offset.
    pub fn parse_time(&self, value: &str) -> Result<DateTime<FixedOffset>, ToolError> {
        let value = value.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
            return Ok(dt);
        }
        const FORMATS: [&str; 4] = [
            "%Y-%m-%dT%H:%M:%S",
            "%Y-%m-%dT%H:%M",
            "%Y-%m-%d %H:%M:%S",
            "%Y-%m-%d %H:%M",
        ];
        FORMATS
            .iter()
            .find_map(|f| NaiveDateTime::parse_from_str(value, f).ok())
            .and_then(|naive| self.offset.from_local_datetime(&naive).single())
            .ok_or_else(|| invalid(format!("unrecognised date-time '{value}'")))
    }

    pub fn parse_date(&self, value: &str) -> Result<NaiveDate, ToolError> {
        NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
            .map_err(|_| invalid(format!("unrecognised date '{value}' (expected YYYY-MM-DD)")))
    }

    fn day_bounds(&self, date: NaiveDate) -> Result<(DateTime<FixedOffset>, DateTime<FixedOffset>), ToolError> {
        let start = self
            .offset
            .from_local_datetime(&date.and_time(NaiveTime::MIN))
            .single()
            .ok_or_else(|| invalid(format!("invalid day {date}")))?;
        Ok((start, start + Duration::days(1)))
    }

    pub async fn events_on(&self, date: NaiveDate) -> Result<Vec<CalendarEvent>, ToolError> {
        let (from, to) = self.day_bounds(date)?;
        self.backend.list(from, to).await
    }

    async fn first_conflict(
        &self,
        draft: &EventDraft,
        ignore: Option<&str>,
    ) -> Result<Option<CalendarEvent>, ToolError> {
        if draft.end <= draft.start {
            return Err(invalid("end time must be after start time"));
        }
        let (from, _) = self.day_bounds(draft.start.with_timezone(&self.offset).date_naive())?;
        let (_, to) = self.day_bounds(draft.end.with_timezone(&self.offset).date_naive())?;
        let existing = self.backend.list(from, to).await?;
        Ok(existing
            .into_iter()
            .filter(|e| Some(e.id.as_str()) != ignore)
            .find(|e| e.overlaps(draft.start, draft.end)))
    }

    /// Create the event unless it overlaps an existing one.
    pub async fn create_checked(&self, draft: EventDraft) -> Result<Schedule, ToolError> {
        if let Some(conflict) = self.first_conflict(&draft, None).await? {
            info!(conflict = %conflict.summary, "Calendar create blocked by overlap");
            return Ok(Schedule::Conflict(conflict));
        }
        let created = self.backend.create(draft).await?;
        info!(summary = %created.summary, start = %created.start, "Calendar event created");
        Ok(Schedule::Booked(created))
    }

    /// Replace an event unless the new time overlaps another event.
    pub async fn reschedule_checked(&self, id: &str, draft: EventDraft) -> Result<Schedule, ToolError> {
        if let Some(conflict) = self.first_conflict(&draft, Some(id)).await? {
            info!(conflict = %conflict.summary, "Calendar reschedule blocked by overlap");
            return Ok(Schedule::Conflict(conflict));
        }
        let updated = self.backend.update(id, draft).await?;
        info!(summary = %updated.summary, start = %updated.start, "Calendar event updated");
        Ok(Schedule::Booked(updated))
    }

    pub async fn delete(&self, id: &str) -> Result<(), ToolError> {
        self.backend.delete(id).await
    }

    /// Current date in the calendar's offset.
    pub fn today(&self) -> NaiveDate {
        chrono::Utc::now().with_timezone(&self.offset).date_naive()
    }

    /// `HH:MM` in the calendar's offset.
    pub fn clock(&self, at: DateTime<FixedOffset>) -> String {
        at.with_timezone(&self.offset).format("%H:%M").to_string()
    }
}

/// Build the calendar selected by `tools.calendar_backend`.
pub fn calendar_from_config(
    config: &sahayak_config::ToolsConfig,
    tokens: Arc<dyn sahayak_core::TokenSource>,
) -> Calendar {
    let offset = crate::clock::offset_from_minutes(config.utc_offset_minutes);
    let backend: Arc<dyn CalendarBackend> = match config.calendar_backend.as_str() {
        "google" => {
            info!(calendar = %config.calendar_id, "Using Google Calendar backend");
            Arc::new(GoogleCalendar::new(
                sahayak_google::AuthorizedClient::new(tokens),
                &config.calendar_api_url,
                &config.calendar_id,
            ))
        }
        _ => Arc::new(InMemoryCalendar::new()),
    };
    Calendar::new(backend, offset)
}

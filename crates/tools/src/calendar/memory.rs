//! In-memory calendar, used locally and in tests.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use sahayak_core::error::ToolError;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CalendarBackend, CalendarEvent, EventDraft};

#[derive(Default)]
pub struct InMemoryCalendar {
    events: RwLock<BTreeMap<String, CalendarEvent>>,
}

impl InMemoryCalendar {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CalendarBackend for InMemoryCalendar {
    fn name(&self) -> &str {
        "memory"
    }

    async fn list(
        &self,
        from: DateTime<FixedOffset>,
        to: DateTime<FixedOffset>,
    ) -> Result<Vec<CalendarEvent>, ToolError> {
        let mut events: Vec<CalendarEvent> = self
            .events
            .read()
            .await
            .values()
            .filter(|e| e.overlaps(from, to))
            .cloned()
            .collect();
        events.sort_by_key(|e| e.start);
        Ok(events)
    }

    async fn create(&self, draft: EventDraft) -> Result<CalendarEvent, ToolError> {
        let event = CalendarEvent {
            id: Uuid::new_v4().simple().to_string(),
            summary: draft.summary,
            description: draft.description,
            start: draft.start,
            end: draft.end,
        };
        self.events
            .write()
            .await
            .insert(event.id.clone(), event.clone());
        Ok(event)
    }

    async fn update(&self, id: &str, draft: EventDraft) -> Result<CalendarEvent, ToolError> {
        let mut events = self.events.write().await;
        let event = events
            .get_mut(id)
            .ok_or_else(|| ToolError::NotFound(format!("calendar event {id}")))?;
        event.summary = draft.summary;
        event.description = draft.description;
        event.start = draft.start;
        event.end = draft.end;
        Ok(event.clone())
    }

    async fn delete(&self, id: &str) -> Result<(), ToolError> {
        self.events
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| ToolError::NotFound(format!("calendar event {id}")))
    }
}

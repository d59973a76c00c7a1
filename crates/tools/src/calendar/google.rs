//! Google Calendar REST backend (`calendars/{id}/events`).

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use reqwest::{Response, Url};
use sahayak_core::error::ToolError;
use sahayak_google::AuthorizedClient;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{CalendarBackend, CalendarEvent, EventDraft};

const TOOL: &str = "calendar";

pub struct GoogleCalendar {
    client: AuthorizedClient,
    api_url: String,
    calendar_id: String,
}

impl GoogleCalendar {
    pub fn new(client: AuthorizedClient, api_url: &str, calendar_id: &str) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            calendar_id: calendar_id.to_string(),
        }
    }

    fn events_url(&self, event_id: Option<&str>) -> Result<Url, ToolError> {
        let mut url = Url::parse(&self.api_url).map_err(failed)?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| failed("calendar api_url cannot be a base"))?;
            segments
                .pop_if_empty()
                .extend(["calendars", self.calendar_id.as_str(), "events"]);
            if let Some(id) = event_id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    async fn check(response: Response, what: &str) -> Result<Response, ToolError> {
        let status = response.status().as_u16();
        if response.status().is_success() {
            return Ok(response);
        }
        if status == 404 || status == 410 {
            return Err(ToolError::NotFound(what.to_string()));
        }
        let body = response.text().await.unwrap_or_default();
        warn!(status, body = %body, "Calendar request failed");
        Err(failed(format!("HTTP {status}: {body}")))
    }
}

fn failed(reason: impl std::fmt::Display) -> ToolError {
    ToolError::ExecutionFailed {
        tool_name: TOOL.into(),
        reason: reason.to_string(),
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    date_time: Option<DateTime<FixedOffset>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default)]
    summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    start: ApiTime,
    end: ApiTime,
}

#[derive(Debug, Deserialize)]
struct ApiEventList {
    #[serde(default)]
    items: Vec<ApiEvent>,
}

impl From<&EventDraft> for ApiEvent {
    fn from(draft: &EventDraft) -> Self {
        Self {
            id: None,
            summary: draft.summary.clone(),
            description: draft.description.clone(),
            start: ApiTime { date_time: Some(draft.start) },
            end: ApiTime { date_time: Some(draft.end) },
        }
    }
}

impl ApiEvent {
    /// All-day events carry `date` rather than `dateTime` and are skipped.
    fn into_event(self) -> Option<CalendarEvent> {
        Some(CalendarEvent {
            id: self.id?,
            summary: self.summary,
            description: self.description,
            start: self.start.date_time?,
            end: self.end.date_time?,
        })
    }
}

#[async_trait]
impl CalendarBackend for GoogleCalendar {
    fn name(&self) -> &str {
        "google"
    }

    async fn list(
        &self,
        from: DateTime<FixedOffset>,
        to: DateTime<FixedOffset>,
    ) -> Result<Vec<CalendarEvent>, ToolError> {
        let mut url = self.events_url(None)?;
        url.query_pairs_mut()
            .append_pair("timeMin", &from.to_rfc3339())
            .append_pair("timeMax", &to.to_rfc3339())
            .append_pair("singleEvents", "true")
            .append_pair("orderBy", "startTime");

        let response = self
            .client
            .send(|c| c.get(url.clone()))
            .await
            .map_err(failed)?;
        let body: ApiEventList = Self::check(response, "calendar")
            .await?
            .json()
            .await
            .map_err(failed)?;
        Ok(body.items.into_iter().filter_map(ApiEvent::into_event).collect())
    }

    async fn create(&self, draft: EventDraft) -> Result<CalendarEvent, ToolError> {
        let url = self.events_url(None)?;
        let body = ApiEvent::from(&draft);
        let response = self
            .client
            .send(|c| c.post(url.clone()).json(&body))
            .await
            .map_err(failed)?;
        let created: ApiEvent = Self::check(response, "calendar")
            .await?
            .json()
            .await
            .map_err(failed)?;
        created
            .into_event()
            .ok_or_else(|| failed("created event is missing id or times"))
    }

    async fn update(&self, id: &str, draft: EventDraft) -> Result<CalendarEvent, ToolError> {
        let url = self.events_url(Some(id))?;
        let body = ApiEvent::from(&draft);
        let response = self
            .client
            .send(|c| c.patch(url.clone()).json(&body))
            .await
            .map_err(failed)?;
        let updated: ApiEvent = Self::check(response, &format!("calendar event {id}"))
            .await?
            .json()
            .await
            .map_err(failed)?;
        updated
            .into_event()
            .ok_or_else(|| failed("updated event is missing id or times"))
    }

    async fn delete(&self, id: &str) -> Result<(), ToolError> {
        let url = self.events_url(Some(id))?;
        let response = self
            .client
            .send(|c| c.delete(url.clone()))
            .await
            .map_err(failed)?;
        Self::check(response, &format!("calendar event {id}")).await.map(|_| ())
    }
}

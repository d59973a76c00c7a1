//! `/calendar` routes over the same overlap-checked calendar the lesson
//! planner uses.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post, put};
use axum::Router;
use sahayak_core::Error;
use sahayak_core::error::ToolError;
use sahayak_tools::{CalendarEvent, EventDraft, Schedule};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::ApiError;
use crate::SharedContext;

pub fn router() -> Router<SharedContext> {
    Router::new()
        .route("/ping", get(ping))
        .route("/fetch_events", get(fetch_events))
        .route("/add_event", post(add_event))
        .route("/modify_event", put(modify_event))
}

fn calendar_error(operation: &str, err: ToolError) -> ApiError {
    match err {
        ToolError::InvalidArguments(reason) => ApiError::bad_request(reason),
        ToolError::NotFound(what) => Error::not_found(what).into(),
        other => Error::upstream(operation, "calendar", other).into(),
    }
}

fn conflict(with: CalendarEvent) -> (StatusCode, Json<Value>) {
    (
        StatusCode::CONFLICT,
        Json(json!({
            "message": format!("The requested time overlaps with '{}'", with.summary),
            "conflict": with,
        })),
    )
}

async fn ping() -> Json<Value> {
    Json(json!({ "message": "Calendar API is working." }))
}

#[derive(Debug, Deserialize)]
struct FetchQuery {
    /// `YYYY-MM-DD`; today when absent.
    date: Option<String>,
}

async fn fetch_events(
    State(ctx): State<SharedContext>,
    Query(query): Query<FetchQuery>,
) -> Result<Json<Value>, ApiError> {
    let calendar = &ctx.calendar;
    let date = match query.date.as_deref().filter(|d| !d.is_empty()) {
        Some(value) => calendar.parse_date(value).map_err(|e| calendar_error("calendar.list", e))?,
        None => calendar.today(),
    };
    let items = calendar
        .events_on(date)
        .await
        .map_err(|e| calendar_error("calendar.list", e))?;
    Ok(Json(json!({ "date": date.to_string(), "items": items })))
}

#[derive(Debug, Deserialize)]
struct EventInput {
    summary: String,
    #[serde(default)]
    description: Option<String>,
    start: String,
    end: String,
}

async fn add_event(
    State(ctx): State<SharedContext>,
    Json(input): Json<EventInput>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let calendar = &ctx.calendar;
    let draft = EventDraft {
        summary: input.summary,
        description: input.description,
        start: calendar.parse_time(&input.start).map_err(|e| calendar_error("calendar.create", e))?,
        end: calendar.parse_time(&input.end).map_err(|e| calendar_error("calendar.create", e))?,
    };
    match calendar
        .create_checked(draft)
        .await
        .map_err(|e| calendar_error("calendar.create", e))?
    {
        Schedule::Booked(event) => Ok((
            StatusCode::OK,
            Json(json!({ "message": "Event added successfully", "event": event })),
        )),
        Schedule::Conflict(with) => Ok(conflict(with)),
    }
}

#[derive(Debug, Deserialize)]
struct EventUpdate {
    event_id: String,
    summary: Option<String>,
    #[serde(default)]
    description: Option<String>,
    start: Option<String>,
    end: Option<String>,
}

async fn modify_event(
    State(ctx): State<SharedContext>,
    Json(update): Json<EventUpdate>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let calendar = &ctx.calendar;
    let (Some(summary), Some(start), Some(end)) = (update.summary, update.start, update.end) else {
        return Err(ApiError::bad_request("summary, start and end are required"));
    };
    let draft = EventDraft {
        summary,
        description: update.description,
        start: calendar.parse_time(&start).map_err(|e| calendar_error("calendar.update", e))?,
        end: calendar.parse_time(&end).map_err(|e| calendar_error("calendar.update", e))?,
    };
    match calendar
        .reschedule_checked(&update.event_id, draft)
        .await
        .map_err(|e| calendar_error("calendar.update", e))?
    {
        Schedule::Booked(event) => Ok((
            StatusCode::OK,
            Json(json!({ "message": "Event modified successfully", "event": event })),
        )),
        Schedule::Conflict(with) => Ok(conflict(with)),
    }
}

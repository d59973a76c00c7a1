//! Handler tools for Sahayak.
//!
//! Tools give the handlers the ability to act:
//! - search the web and look up videos (resource discovery)
//! - find what is special about today (thought of the day)
//! - read the clock and manage the calendar (lesson planning)
//! - publish worksheets and answer sheets as downloadable documents

pub mod calendar;
pub mod clock;
pub mod documents;
mod http;
pub mod search;
pub mod speciality;

pub use calendar::{
    Calendar, CalendarBackend, CalendarEvent, CreateEventTool, DeleteEventTool, EditEventTool,
    EventDraft, GoogleCalendar, InMemoryCalendar, ListEventsTool, Schedule, calendar_from_config,
};
pub use clock::{ClockTool, offset_from_minutes};
pub use documents::{DocumentKind, DocumentRenderer, PlainTextRenderer, PublishDocumentTool};
pub use search::{SearchHit, VideoSearchTool, WebSearchTool};
pub use speciality::TodaySpecialityTool;

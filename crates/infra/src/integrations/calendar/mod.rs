//! Calendar integration
//!
//! Google Calendar adapter and the calendar list cache in front of it.

pub mod cache;
pub mod google;
mod types;

pub use cache::CalendarListCache;
pub use google::GoogleCalendarClient;

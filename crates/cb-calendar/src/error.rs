//! Error types for cb-calendar

use std::sync::Arc;

use thiserror::Error;

use crate::models::CalendarEvent;

/// cb-calendar error type
#[derive(Error, Debug)]
pub enum CalendarError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("CalDAV error: {0}")]
    CaldavError(String),

    #[error("HTTP error: {0}")]
    HttpError(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("XML parsing error: {0}")]
    XmlParseError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Unknown calendar type: {0}")]
    UnknownKind(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A named calendar failed; used by `CombinedSource` to say which one.
    #[error("calendar '{calendar}': {source}")]
    Source {
        calendar: String,
        #[source]
        source: Box<CalendarError>,
    },

    /// Some sources failed but `events` were still gathered.
    #[error("{source} ({count} events recovered)", count = .events.len())]
    Partial {
        events: Vec<Arc<CalendarEvent>>,
        #[source]
        source: Box<CalendarError>,
    },
}

impl CalendarError {
    /// Wrap an error with the name of the calendar it came from
    pub fn in_calendar(self, calendar: impl Into<String>) -> Self {
        Self::Source {
            calendar: calendar.into(),
            source: Box::new(self),
        }
    }

    /// Events that were gathered before the failure, if any
    pub fn partial_events(&self) -> &[Arc<CalendarEvent>] {
        match self {
            Self::Partial { events, .. } => events,
            _ => &[],
        }
    }

    /// Name of the calendar that failed, when known
    pub fn calendar(&self) -> Option<&str> {
        match self {
            Self::Source { calendar, .. } => Some(calendar),
            Self::Partial { source, .. } => source.calendar(),
            _ => None,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, CalendarError>;

//! The calendar source capability
//!
//! Every backend (iCalendar document, CalDAV collection) and every
//! decorator (`CachedSource`, `CombinedSource`) implements [`CalendarSource`].

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::caldav::CaldavSource;
use crate::error::{CalendarError, Result};
use crate::ical::IcalSource;
use crate::models::CalendarEvent;

/// Calendar source trait
///
/// Implement this trait to plug a new calendar backend into the reminder
/// pipeline.
#[async_trait]
pub trait CalendarSource: Send + Sync {
    /// Get every event whose interval intersects `[from, to)`
    ///
    /// Backend failures (network, parse) are returned, never swallowed.
    async fn events(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<Arc<CalendarEvent>>>;
}

/// Backend kind of a configured calendar
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// iCalendar document (local file or HTTP URL)
    Ical,
    /// CalDAV collection
    Caldav,
}

impl SourceKind {
    /// Tag used in persistence and chat commands
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ical => "ical",
            Self::Caldav => "caldav",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = CalendarError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ical" | "ics" => Ok(Self::Ical),
            "caldav" => Ok(Self::Caldav),
            other => Err(CalendarError::UnknownKind(other.to_string())),
        }
    }
}

/// Construct the concrete source for a calendar entry
///
/// Construction does no I/O; the locator is only validated.
pub fn open_source(kind: SourceKind, locator: &str) -> Result<Arc<dyn CalendarSource>> {
    let source: Arc<dyn CalendarSource> = match kind {
        SourceKind::Ical => Arc::new(IcalSource::new(locator)?),
        SourceKind::Caldav => Arc::new(CaldavSource::new(locator)?),
    };
    Ok(source)
}

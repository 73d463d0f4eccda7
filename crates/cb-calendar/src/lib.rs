//! cb-calendar: Calendar sources for cb-gateway
//!
//! This crate turns one or more live calendars into a stream of events
//! that the reminder scheduler can consume.
//!
//! ## Features
//!
//! - `CalendarSource` capability: events overlapping a time range
//! - iCalendar (file or HTTP) and CalDAV leaf sources
//! - `CachedSource`: TTL memoizing wrapper for slow backends
//! - `CombinedSource`: merges several sources, keeping partial results on failure
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cb_calendar::{open_source, CachedSource, CalendarSource, CombinedSource, SourceKind};
//!
//! let work = open_source(SourceKind::Caldav, "https://user:pw@dav.example.com/cal/work/")?;
//! let home = open_source(SourceKind::Ical, "/home/me/home.ics")?;
//!
//! let mut combined = CombinedSource::new();
//! combined.push("work", Arc::new(CachedSource::new(work, Duration::from_secs(300))));
//! combined.push("home", home);
//!
//! let now = chrono::Utc::now();
//! let events = combined.events(now, now + chrono::Duration::days(1)).await?;
//! ```

pub mod cached;
pub mod caldav;
pub mod combined;
pub mod error;
pub mod ical;
pub mod ics;
pub mod models;
pub mod source;

pub use cached::CachedSource;
pub use caldav::CaldavSource;
pub use combined::CombinedSource;
pub use error::{CalendarError, Result};
pub use ical::IcalSource;
pub use models::CalendarEvent;
pub use source::{CalendarSource, SourceKind, open_source};

/// Re-export the common types for easy use
pub mod prelude {
    pub use super::{CachedSource, CalendarEvent, CalendarSource, CombinedSource, SourceKind};
}

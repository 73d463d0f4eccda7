//! A user's configured calendar

use std::sync::{Arc, Mutex};
use std::time::Duration;

use cb_calendar::{CachedSource, CalendarSource, SourceKind, open_source};

use crate::store::CalendarRecord;
use crate::{Error, Result};

/// Lazily constructed backend of a calendar entry
enum SourceSlot {
    Unbuilt,
    Built(Arc<dyn CalendarSource>),
}

/// A named calendar owned by one user
pub struct UserCalendar {
    /// Database row id
    pub id: i64,
    /// Owning user
    pub user_id: String,
    /// Display name, unique per user
    pub name: String,
    pub kind: SourceKind,
    /// File path or URL
    pub uri: String,
    slot: Mutex<SourceSlot>,
}

impl UserCalendar {
    /// Entry whose backend is built on first use
    pub fn new(id: i64, user_id: impl Into<String>, name: impl Into<String>, kind: SourceKind, uri: impl Into<String>) -> Self {
        Self {
            id,
            user_id: user_id.into(),
            name: name.into(),
            kind,
            uri: uri.into(),
            slot: Mutex::new(SourceSlot::Unbuilt),
        }
    }

    /// Entry for a row loaded from the datastore
    pub fn from_record(record: CalendarRecord) -> Self {
        Self::new(record.id, record.user_id, record.name, record.kind, record.uri)
    }

    /// Entry with an already built backend
    pub(crate) fn with_source(mut self, source: Arc<dyn CalendarSource>) -> Self {
        self.slot = Mutex::new(SourceSlot::Built(source));
        self
    }

    /// Build the cached backend for a kind and locator
    pub(crate) fn build_source(name: &str, kind: SourceKind, uri: &str, ttl: Duration) -> Result<Arc<dyn CalendarSource>> {
        let inner = open_source(kind, uri).map_err(|e| e.in_calendar(name))?;
        Ok(Arc::new(CachedSource::new(inner, ttl)))
    }

    /// The calendar's source, constructed once and wrapped in a cache
    pub fn source(&self, ttl: Duration) -> Result<Arc<dyn CalendarSource>> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| Error::Other(format!("calendar '{}' lock poisoned", self.name)))?;

        if let SourceSlot::Built(source) = &*slot {
            return Ok(Arc::clone(source));
        }

        let source = Self::build_source(&self.name, self.kind, &self.uri, ttl)?;
        *slot = SourceSlot::Built(Arc::clone(&source));
        Ok(source)
    }
}

impl std::fmt::Debug for UserCalendar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserCalendar")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("uri", &self.uri)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_is_memoized() {
        let calendar = UserCalendar::new(1, "@alice:example.org", "home", SourceKind::Ical, "/srv/home.ics");

        let first = calendar.source(Duration::from_secs(300)).unwrap();
        let second = calendar.source(Duration::from_secs(300)).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_bad_locator_names_calendar() {
        let calendar = UserCalendar::new(1, "@alice:example.org", "work", SourceKind::Caldav, "::nope::");

        let Err(err) = calendar.source(Duration::from_secs(300)) else {
            panic!("a malformed CalDAV locator should not build");
        };
        match err {
            Error::Calendar(e) => assert_eq!(e.calendar(), Some("work")),
            other => panic!("unexpected error: {other}"),
        }
    }
}

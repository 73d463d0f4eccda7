//! Merging several calendars into one

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::warn;

use crate::error::{CalendarError, Result};
use crate::models::CalendarEvent;
use crate::source::CalendarSource;

/// An ordered set of named sources queried as one calendar
///
/// Children are queried in insertion order and their events concatenated;
/// no ordering is imposed across children. When a child fails the query
/// stops and a [`CalendarError::Partial`] is returned that carries the
/// events gathered so far and names the failing calendar.
#[derive(Default, Clone)]
pub struct CombinedSource {
    sources: Vec<(String, Arc<dyn CalendarSource>)>,
}

impl CombinedSource {
    /// Create an empty combined source
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a named source
    pub fn push(&mut self, name: impl Into<String>, source: Arc<dyn CalendarSource>) {
        self.sources.push((name.into(), source));
    }

    /// Number of child sources
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[async_trait]
impl CalendarSource for CombinedSource {
    async fn events(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<Arc<CalendarEvent>>> {
        let mut events = Vec::new();

        for (name, calendar) in &self.sources {
            match calendar.events(from, to).await {
                Ok(found) => events.extend(found),
                Err(CalendarError::Partial { events: found, source }) => {
                    events.extend(found);
                    warn!(calendar = %name, "Calendar returned partial results: {}", source);
                    return Err(CalendarError::Partial {
                        events,
                        source: Box::new((*source).in_calendar(name.clone())),
                    });
                }
                Err(e) => {
                    warn!(calendar = %name, "Calendar fetch failed: {}", e);
                    return Err(CalendarError::Partial {
                        events,
                        source: Box::new(e.in_calendar(name.clone())),
                    });
                }
            }
        }

        Ok(events)
    }
}

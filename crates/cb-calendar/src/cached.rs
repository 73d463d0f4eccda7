//! TTL caching decorator for calendar sources
//!
//! The cache holds the *whole* result of the last successful fetch and
//! serves it for any range until the TTL runs out. Sources are queried with
//! one canonical horizon, so the cached set covers every later query; a
//! caller that suddenly asks for a wider range inside the TTL still gets the
//! narrower cached set.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use crate::error::Result;
use crate::models::CalendarEvent;
use crate::source::CalendarSource;

/// Default time-to-live for cached events
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

struct CacheEntry {
    events: Vec<Arc<CalendarEvent>>,
    fetched_at: Instant,
}

/// Memoizing wrapper around a slow or remote source
pub struct CachedSource {
    inner: Arc<dyn CalendarSource>,
    ttl: Duration,
    cache: RwLock<Option<CacheEntry>>,
}

impl CachedSource {
    /// Wrap `inner`, keeping fetched events for `ttl`
    pub fn new(inner: Arc<dyn CalendarSource>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            cache: RwLock::new(None),
        }
    }

    /// Wrap `inner` with the default five minute TTL
    pub fn with_default_ttl(inner: Arc<dyn CalendarSource>) -> Self {
        Self::new(inner, DEFAULT_TTL)
    }

    fn fresh(&self, entry: &Option<CacheEntry>) -> Option<Vec<Arc<CalendarEvent>>> {
        entry
            .as_ref()
            .filter(|e| e.fetched_at.elapsed() < self.ttl)
            .map(|e| e.events.clone())
    }
}

#[async_trait]
impl CalendarSource for CachedSource {
    async fn events(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<Arc<CalendarEvent>>> {
        if let Some(events) = self.fresh(&*self.cache.read().await) {
            return Ok(events);
        }

        // Population is serialized; whoever waited on the lock re-checks
        // before fetching so concurrent misses cost one backend call.
        let mut cache = self.cache.write().await;
        if let Some(events) = self.fresh(&cache) {
            return Ok(events);
        }

        debug!("Calendar cache miss, fetching from backend");
        let events = self.inner.events(from, to).await?;

        *cache = Some(CacheEntry {
            events: events.clone(),
            fetched_at: Instant::now(),
        });

        Ok(events)
    }
}

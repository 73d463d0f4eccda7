//! Reminder settings
//!
//! Read from the `[reminders]` table of the gateway configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use chrono::TimeDelta;

use crate::error::{Result, ScheduleError};
use crate::reminder::{DEFAULT_OFFSETS_MINUTES, ReminderOffset};

/// How reminders are computed and refreshed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReminderConfig {
    /// Minutes before an event's start at which to remind (0 = at start)
    #[serde(default = "default_offsets")]
    pub offsets_minutes: Vec<u32>,

    /// How far ahead reminders are computed
    #[serde(default = "default_horizon_hours")]
    pub horizon_hours: u32,

    /// How often every user's reminders are recomputed
    #[serde(default = "default_refresh_minutes")]
    pub refresh_minutes: u32,

    /// How long fetched calendar data is reused
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

fn default_offsets() -> Vec<u32> {
    DEFAULT_OFFSETS_MINUTES.to_vec()
}

fn default_horizon_hours() -> u32 {
    24
}

fn default_refresh_minutes() -> u32 {
    15
}

fn default_cache_ttl_secs() -> u64 {
    300
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            offsets_minutes: default_offsets(),
            horizon_hours: default_horizon_hours(),
            refresh_minutes: default_refresh_minutes(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl ReminderConfig {
    /// Reject settings that would make the scheduler spin or do nothing
    pub fn validate(&self) -> Result<()> {
        if self.offsets_minutes.is_empty() {
            return Err(ScheduleError::InvalidConfig("offsets_minutes is empty".to_string()));
        }
        if self.horizon_hours == 0 {
            return Err(ScheduleError::InvalidConfig("horizon_hours must be positive".to_string()));
        }
        if self.refresh_minutes == 0 {
            return Err(ScheduleError::InvalidConfig("refresh_minutes must be positive".to_string()));
        }
        Ok(())
    }

    /// Offsets in configuration order, duplicates removed
    pub fn offsets(&self) -> Vec<ReminderOffset> {
        let mut offsets: Vec<ReminderOffset> = Vec::with_capacity(self.offsets_minutes.len());
        for offset in self.offsets_minutes.iter().copied().map(ReminderOffset::from_minutes) {
            if !offsets.contains(&offset) {
                offsets.push(offset);
            }
        }
        offsets
    }

    /// Lookahead from "now" used when arming
    pub fn horizon(&self) -> TimeDelta {
        TimeDelta::hours(i64::from(self.horizon_hours))
    }

    /// Period of the re-arm job
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.refresh_minutes) * 60)
    }

    /// TTL for the calendar cache
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

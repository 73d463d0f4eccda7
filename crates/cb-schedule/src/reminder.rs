//! Reminder expansion
//!
//! Turns the events of a calendar into reminders: one per event and offset,
//! keeping only those still in the future.

use std::sync::Arc;

use cb_calendar::{CalendarEvent, CalendarSource};
use chrono::{DateTime, TimeDelta, Utc};
use tracing::debug;

use crate::error::{Result, ScheduleError};

/// Default offsets: at the start and half an hour before
pub const DEFAULT_OFFSETS_MINUTES: [u32; 2] = [0, 30];

/// How long before an event's start a reminder fires
///
/// Never negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReminderOffset(TimeDelta);

impl ReminderOffset {
    /// Fire at the event's start
    pub const AT_START: Self = Self(TimeDelta::zero());

    /// Offset of whole minutes
    pub fn from_minutes(minutes: u32) -> Self {
        Self(TimeDelta::minutes(i64::from(minutes)))
    }

    /// The offset as a signed chrono delta
    pub fn as_delta(&self) -> TimeDelta {
        self.0
    }

    /// The default offset set
    pub fn defaults() -> Vec<Self> {
        DEFAULT_OFFSETS_MINUTES.iter().copied().map(Self::from_minutes).collect()
    }
}

impl TryFrom<std::time::Duration> for ReminderOffset {
    type Error = ScheduleError;

    fn try_from(duration: std::time::Duration) -> Result<Self> {
        TimeDelta::from_std(duration)
            .map(Self)
            .map_err(|_| ScheduleError::OffsetOutOfRange(duration))
    }
}

/// A pending notification for one event at one offset
///
/// The trigger time is always `event.start - offset`; there is no way to
/// build a reminder with an independent trigger time.
#[derive(Debug, Clone)]
pub struct Reminder {
    trigger_at: DateTime<Utc>,
    offset: ReminderOffset,
    event: Arc<CalendarEvent>,
}

impl Reminder {
    /// Create the reminder for `event` fired `offset` before it starts
    pub fn new(event: Arc<CalendarEvent>, offset: ReminderOffset) -> Self {
        Self {
            trigger_at: event.start - offset.as_delta(),
            offset,
            event,
        }
    }

    /// When the reminder fires
    pub fn trigger_at(&self) -> DateTime<Utc> {
        self.trigger_at
    }

    /// The offset it was derived with
    pub fn offset(&self) -> ReminderOffset {
        self.offset
    }

    /// The event it reminds of
    pub fn event(&self) -> &Arc<CalendarEvent> {
        &self.event
    }
}

/// Expand the events in `[now, horizon)` into future reminders
///
/// The result is sorted ascending by trigger time. Equal trigger times keep
/// event-then-offset iteration order. Calendar failures are returned as-is.
pub async fn expand_reminders(
    source: &dyn CalendarSource,
    now: DateTime<Utc>,
    horizon: DateTime<Utc>,
    offsets: &[ReminderOffset],
) -> Result<Vec<Reminder>> {
    let events = source.events(now, horizon).await?;

    let mut reminders: Vec<Reminder> = events
        .iter()
        .flat_map(|event| offsets.iter().map(|offset| Reminder::new(Arc::clone(event), *offset)))
        .filter(|reminder| reminder.trigger_at() >= now)
        .collect();

    reminders.sort_by_key(Reminder::trigger_at);

    debug!(
        "Expanded {} events into {} reminders",
        events.len(),
        reminders.len()
    );

    Ok(reminders)
}

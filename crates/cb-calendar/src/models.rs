//! Data models for calendar events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single materialized calendar event
///
/// Events are handed around as `Arc<CalendarEvent>`; two reminders refer to
/// the same event when their `Arc`s point at the same allocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEvent {
    /// Event start time
    pub start: DateTime<Utc>,
    /// Event end time, never before `start`
    pub end: DateTime<Utc>,
    /// Event summary/title
    pub text: String,
}

impl CalendarEvent {
    /// Create a new calendar event
    ///
    /// An `end` earlier than `start` is clamped to `start`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, text: impl Into<String>) -> Self {
        Self {
            start,
            end: end.max(start),
            text: text.into(),
        }
    }

    /// Whether the event intersects the half-open range `[from, to)`
    ///
    /// Zero-length events count when their instant falls inside the range.
    pub fn overlaps(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
        if self.start == self.end {
            return self.start >= from && self.start < to;
        }
        self.start < to && self.end > from
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_end_is_clamped() {
        let event = CalendarEvent::new(at(10), at(9), "backwards");
        assert_eq!(event.end, event.start);
    }

    #[test]
    fn test_overlaps() {
        let event = CalendarEvent::new(at(10), at(12), "meeting");

        assert!(event.overlaps(at(9), at(11)));
        assert!(event.overlaps(at(11), at(13)));
        assert!(event.overlaps(at(8), at(14)));
        assert!(!event.overlaps(at(12), at(14)));
        assert!(!event.overlaps(at(8), at(10)));
    }

    #[test]
    fn test_zero_length_overlaps() {
        let event = CalendarEvent::new(at(10), at(10), "deadline");

        assert!(event.overlaps(at(10), at(11)));
        assert!(!event.overlaps(at(9), at(10)));
        assert!(event.overlaps(at(9), at(10) + Duration::seconds(1)));
    }
}

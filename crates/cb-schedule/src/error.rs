//! Error types for cb-schedule

use thiserror::Error;

/// cb-schedule error type
#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Calendar error: {0}")]
    Calendar(#[from] cb_calendar::CalendarError),

    #[error("Reminder offset out of range: {0:?}")]
    OffsetOutOfRange(std::time::Duration),

    #[error("Invalid reminder settings: {0}")]
    InvalidConfig(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, ScheduleError>;

//! Error types for cb-core

use thiserror::Error;

/// Main error type for cb-core
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Calendar error: {0}")]
    Calendar(#[from] cb_calendar::CalendarError),

    #[error("Schedule error: {0}")]
    Schedule(#[from] cb_schedule::ScheduleError),

    #[error("Calendar not found: {0}")]
    CalendarNotFound(String),

    #[error("Calendar already exists: {0}")]
    CalendarExists(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for cb-core
pub type Result<T> = std::result::Result<T, Error>;

//! cb-core: Calendar Bot Core Library
//!
//! Configuration, persistence and the user registry that ties calendars to
//! per-user reminder schedules.

pub mod config;
pub mod error;
pub mod store;
pub mod users;

pub use config::{Config, DatabaseConfig, MatrixConfig};
pub use error::{Error, Result};
pub use store::{CalendarRecord, Datastore, SqliteStore, UserRecord};
pub use users::{ArmSummary, Notifier, User, UserCalendar, UserRegistry};

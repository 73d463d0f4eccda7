//! Reminder scheduling
//!
//! Expands calendar events into time-offset reminders and runs one
//! cancellable, replaceable dispatch loop per user.

mod config;
mod dispatcher;
mod error;
mod reminder;

pub use config::ReminderConfig;
pub use dispatcher::{ReminderDispatcher, ReminderSink};
pub use error::{Result, ScheduleError};
pub use reminder::{DEFAULT_OFFSETS_MINUTES, Reminder, ReminderOffset, expand_reminders};

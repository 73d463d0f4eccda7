//! Users, their calendars and reminder schedules
//!
//! The [`UserRegistry`] is the single entry point: it hands out [`User`]s,
//! and every calendar change goes through a user, which persists first and
//! only then updates memory.

mod calendar;
mod notifier;
mod registry;
mod user;

#[cfg(test)]
mod test_support;

pub use calendar::UserCalendar;
pub use notifier::Notifier;
pub use registry::{ArmSummary, UserRegistry};
pub use user::User;

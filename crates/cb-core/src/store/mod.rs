//! Persistence of users and their calendars
//!
//! The registry only talks to the [`Datastore`] trait. Every method is a
//! synchronous, fallible write or read; an error means the change did not
//! happen.

mod sqlite;

use cb_calendar::SourceKind;

use crate::Result;

pub use sqlite::SqliteStore;

/// A persisted user row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub user_id: String,
    pub room_id: String,
}

/// A persisted calendar row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarRecord {
    pub id: i64,
    pub user_id: String,
    pub name: String,
    pub kind: SourceKind,
    pub uri: String,
}

/// Durable storage for users and calendars
pub trait Datastore: Send + Sync {
    /// Every persisted user
    fn fetch_all_users(&self) -> Result<Vec<UserRecord>>;

    /// Every persisted calendar, in insertion order
    fn fetch_all_calendars(&self) -> Result<Vec<CalendarRecord>>;

    /// Persist a new user with the room the bot talks to them in
    fn add_user(&self, user_id: &str, room_id: &str) -> Result<()>;

    /// Change a persisted user's room
    fn update_user_room_id(&self, user_id: &str, room_id: &str) -> Result<()>;

    /// Persist a calendar, returning its row id
    fn add_calendar(&self, user_id: &str, name: &str, kind: SourceKind, uri: &str) -> Result<i64>;

    /// Delete a user's calendar by display name
    fn remove_calendar(&self, user_id: &str, name: &str) -> Result<()>;
}

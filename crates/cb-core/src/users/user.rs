//! A chat user with calendars and a reminder schedule

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use cb_calendar::{CombinedSource, SourceKind};
use cb_schedule::{Reminder, ReminderConfig, ReminderDispatcher, expand_reminders};
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::store::Datastore;
use crate::users::calendar::UserCalendar;
use crate::users::notifier::{Notifier, UserSink};
use crate::{Error, Result};

/// Mutable profile fields, shared with the dispatch sink
#[derive(Debug, Default)]
pub(crate) struct Profile {
    pub(crate) room_id: Option<String>,
    pub(crate) exists_in_db: bool,
}

/// One chat user
///
/// Owns the user's calendar list and the dispatcher of their reminders.
/// Every mutation writes to the datastore first; memory is only touched
/// once that write succeeded.
pub struct User {
    user_id: String,
    profile: Arc<RwLock<Profile>>,
    calendars: RwLock<Vec<Arc<UserCalendar>>>,
    store: Arc<dyn Datastore>,
    settings: Arc<ReminderConfig>,
    dispatcher: ReminderDispatcher,
    /// Held from expansion until the list reaches the dispatcher
    rearm: Mutex<()>,
}

impl User {
    pub(crate) fn new(
        user_id: impl Into<String>,
        store: Arc<dyn Datastore>,
        notifier: Arc<dyn Notifier>,
        settings: Arc<ReminderConfig>,
    ) -> Self {
        let user_id = user_id.into();
        let profile = Arc::new(RwLock::new(Profile::default()));
        let sink = Arc::new(UserSink {
            user_id: user_id.clone(),
            profile: Arc::clone(&profile),
            notifier,
        });

        Self {
            dispatcher: ReminderDispatcher::new(user_id.clone(), sink),
            user_id,
            profile,
            calendars: RwLock::new(Vec::new()),
            store,
            settings,
            rearm: Mutex::new(()),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Room reminders are delivered to
    pub fn room_id(&self) -> Option<String> {
        self.profile().room_id.clone()
    }

    /// Whether the user row has been persisted
    pub fn exists_in_db(&self) -> bool {
        self.profile().exists_in_db
    }

    /// Snapshot of the configured calendars
    pub fn calendars(&self) -> Vec<Arc<UserCalendar>> {
        self.read_calendars().clone()
    }

    pub fn has_calendar(&self, name: &str) -> bool {
        self.read_calendars().iter().any(|c| c.name == name)
    }

    /// Persist the user with their first room
    pub fn persist(&self, room_id: &str) -> Result<()> {
        let mut profile = self.profile_mut();
        if profile.exists_in_db {
            return Ok(());
        }

        self.store.add_user(&self.user_id, room_id)?;
        profile.room_id = Some(room_id.to_string());
        profile.exists_in_db = true;

        info!(user = %self.user_id, room = %room_id, "Registered user");
        Ok(())
    }

    /// Move the user to another room
    pub fn update_room_id(&self, room_id: &str) -> Result<()> {
        let mut profile = self.profile_mut();
        if profile.room_id.as_deref() == Some(room_id) {
            return Ok(());
        }

        self.store.update_user_room_id(&self.user_id, room_id)?;
        profile.room_id = Some(room_id.to_string());

        info!(user = %self.user_id, room = %room_id, "Updated room");
        Ok(())
    }

    /// Add a named calendar
    ///
    /// The locator is validated before anything is written.
    pub fn add_calendar(&self, name: &str, kind: SourceKind, uri: &str) -> Result<Arc<UserCalendar>> {
        let source = UserCalendar::build_source(name, kind, uri, self.settings.cache_ttl())?;

        let mut calendars = self.write_calendars();
        if calendars.iter().any(|c| c.name == name) {
            return Err(Error::CalendarExists(name.to_string()));
        }

        let id = self.store.add_calendar(&self.user_id, name, kind, uri)?;
        let calendar = Arc::new(UserCalendar::new(id, &self.user_id, name, kind, uri).with_source(source));
        calendars.push(Arc::clone(&calendar));

        info!(user = %self.user_id, calendar = %name, "Added {} calendar", kind);
        Ok(calendar)
    }

    /// Remove a calendar by name
    pub fn remove_calendar(&self, name: &str) -> Result<()> {
        let mut calendars = self.write_calendars();
        let Some(index) = calendars.iter().position(|c| c.name == name) else {
            return Err(Error::CalendarNotFound(name.to_string()));
        };

        self.store.remove_calendar(&self.user_id, name)?;
        calendars.remove(index);

        info!(user = %self.user_id, calendar = %name, "Removed calendar");
        Ok(())
    }

    /// Take over a persisted profile without writing it back
    pub(crate) fn restore(&self, room_id: &str) {
        let mut profile = self.profile_mut();
        profile.room_id = Some(room_id.to_string());
        profile.exists_in_db = true;
    }

    /// Take over a persisted calendar without writing it back
    ///
    /// Returns false if a calendar with that name is already loaded.
    pub(crate) fn restore_calendar(&self, calendar: UserCalendar) -> bool {
        let mut calendars = self.write_calendars();
        if calendars.iter().any(|c| c.name == calendar.name) {
            return false;
        }
        calendars.push(Arc::new(calendar));
        true
    }

    /// Every calendar of the user behind one source
    pub fn combined_source(&self) -> Result<CombinedSource> {
        let ttl = self.settings.cache_ttl();
        let mut combined = CombinedSource::new();
        for calendar in self.calendars() {
            combined.push(calendar.name.clone(), calendar.source(ttl)?);
        }
        Ok(combined)
    }

    /// Reminders for the user's events between now and `horizon`
    pub async fn create_reminders(&self, now: DateTime<Utc>, horizon: DateTime<Utc>) -> Result<Vec<Reminder>> {
        let combined = self.combined_source()?;
        let reminders = expand_reminders(&combined, now, horizon, &self.settings.offsets()).await?;
        Ok(reminders)
    }

    /// Rebuild and hand the reminder list to the dispatcher
    ///
    /// On failure the current schedule is left untouched. Returns the
    /// number of armed reminders. Concurrent calls for one user run one
    /// after the other, so the list armed last reflects the calendars as
    /// they were when that call started.
    pub async fn arm_reminders(&self, horizon: DateTime<Utc>) -> Result<usize> {
        let _rearm = self.rearm.lock().await;
        let reminders = self.create_reminders(Utc::now(), horizon).await?;
        let count = reminders.len();

        debug!(user = %self.user_id, "Arming {} reminders", count);
        self.dispatcher.arm(reminders);
        Ok(count)
    }

    /// Drop every pending reminder
    pub fn cancel_reminders(&self) {
        self.dispatcher.cancel();
    }

    /// Whether a dispatch loop is active
    pub fn reminders_running(&self) -> bool {
        self.dispatcher.is_running()
    }

    fn profile(&self) -> RwLockReadGuard<'_, Profile> {
        self.profile.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn profile_mut(&self) -> RwLockWriteGuard<'_, Profile> {
        self.profile.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn read_calendars(&self) -> RwLockReadGuard<'_, Vec<Arc<UserCalendar>>> {
        self.calendars.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_calendars(&self) -> RwLockWriteGuard<'_, Vec<Arc<UserCalendar>>> {
        self.calendars.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("user_id", &self.user_id)
            .field("room_id", &self.room_id())
            .field("calendars", &self.read_calendars().len())
            .finish_non_exhaustive()
    }
}

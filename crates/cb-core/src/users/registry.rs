//! Registry of every known user

use std::sync::Arc;

use cb_schedule::ReminderConfig;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::future::join_all;
use tracing::{debug, error, info, warn};

use crate::Result;
use crate::store::Datastore;
use crate::users::calendar::UserCalendar;
use crate::users::notifier::Notifier;
use crate::users::user::User;

/// Outcome of arming every user
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ArmSummary {
    /// Users whose schedule was replaced
    pub armed: usize,
    /// Total reminders handed to dispatchers
    pub reminders: usize,
    /// Users whose calendars could not be read
    pub failed: Vec<String>,
}

/// Concurrent map from user id to [`User`]
///
/// Lookup creates unknown users on the fly (in memory only); two concurrent
/// lookups of the same id get the same instance.
pub struct UserRegistry {
    users: DashMap<String, Arc<User>>,
    store: Arc<dyn Datastore>,
    notifier: Arc<dyn Notifier>,
    settings: Arc<ReminderConfig>,
}

impl UserRegistry {
    pub fn new(store: Arc<dyn Datastore>, notifier: Arc<dyn Notifier>, settings: ReminderConfig) -> Self {
        Self {
            users: DashMap::new(),
            store,
            notifier,
            settings: Arc::new(settings),
        }
    }

    /// Get or create the user with this id
    pub fn lookup(&self, user_id: &str) -> Arc<User> {
        if let Some(user) = self.users.get(user_id) {
            return Arc::clone(user.value());
        }

        let entry = self.users.entry(user_id.to_string()).or_insert_with(|| {
            debug!(user = %user_id, "Creating user");
            Arc::new(User::new(
                user_id,
                Arc::clone(&self.store),
                Arc::clone(&self.notifier),
                Arc::clone(&self.settings),
            ))
        });
        Arc::clone(entry.value())
    }

    /// Get a user without creating it
    pub fn get(&self, user_id: &str) -> Option<Arc<User>> {
        self.users.get(user_id).map(|user| Arc::clone(user.value()))
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn settings(&self) -> &ReminderConfig {
        &self.settings
    }

    /// Load every persisted user and calendar
    ///
    /// Users already in memory keep their identity. Calendar rows for users
    /// without a user row still load; the user stays unpersisted.
    pub fn populate_from_persistence(&self) -> Result<usize> {
        let users = self.store.fetch_all_users()?;
        for record in &users {
            self.lookup(&record.user_id).restore(&record.room_id);
        }

        let calendars = self.store.fetch_all_calendars()?;
        let mut loaded = 0;
        for record in calendars {
            let user = self.lookup(&record.user_id);
            let name = record.name.clone();
            if user.restore_calendar(UserCalendar::from_record(record)) {
                loaded += 1;
            } else {
                warn!(user = %user.user_id(), calendar = %name, "Skipping duplicate calendar name");
            }
        }

        info!("Loaded {} users and {} calendars", users.len(), loaded);
        Ok(users.len())
    }

    /// Rebuild one user's reminders up to `horizon`
    pub async fn arm_reminders(&self, user_id: &str, horizon: DateTime<Utc>) -> Result<usize> {
        self.lookup(user_id).arm_reminders(horizon).await
    }

    /// Rebuild reminders of every known user concurrently
    ///
    /// A failing user is logged and keeps their previous schedule.
    pub async fn arm_all(&self, horizon: DateTime<Utc>) -> ArmSummary {
        // Snapshot first: no map guard may live across an await.
        let users: Vec<Arc<User>> = self.users.iter().map(|entry| Arc::clone(entry.value())).collect();

        let results = join_all(users.iter().map(|user| async move {
            let result = user.arm_reminders(horizon).await;
            (user.user_id().to_string(), result)
        }))
        .await;

        let mut summary = ArmSummary::default();
        for (user_id, result) in results {
            match result {
                Ok(count) => {
                    summary.armed += 1;
                    summary.reminders += count;
                }
                Err(e) => {
                    error!(user = %user_id, "Failed to arm reminders: {}", e);
                    summary.failed.push(user_id);
                }
            }
        }

        info!(
            "Armed {} reminders for {} users ({} failed)",
            summary.reminders,
            summary.armed,
            summary.failed.len()
        );
        summary
    }
}

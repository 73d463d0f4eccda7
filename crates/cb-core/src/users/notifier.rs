//! Delivery of fired reminders to the chat layer

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use cb_calendar::CalendarEvent;
use cb_schedule::ReminderSink;
use tracing::{error, warn};

use crate::users::user::Profile;

/// Chat-layer delivery contract
///
/// Implementations render the event and send it to the room; the core
/// never formats messages itself.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Tell the room about an upcoming event
    async fn notify(&self, room_id: &str, event: &CalendarEvent) -> anyhow::Result<()>;
}

/// Sink of one user's dispatch loop
///
/// Reads the room at delivery time so a room change applies to reminders
/// that are already scheduled.
pub(crate) struct UserSink {
    pub(crate) user_id: String,
    pub(crate) profile: Arc<RwLock<Profile>>,
    pub(crate) notifier: Arc<dyn Notifier>,
}

#[async_trait]
impl ReminderSink for UserSink {
    async fn deliver(&self, event: Arc<CalendarEvent>) {
        let room_id = match self.profile.read() {
            Ok(profile) => profile.room_id.clone(),
            Err(poisoned) => poisoned.into_inner().room_id.clone(),
        };

        let Some(room_id) = room_id else {
            warn!(user = %self.user_id, "No room to deliver reminder for: {}", event.text);
            return;
        };

        if let Err(e) = self.notifier.notify(&room_id, &event).await {
            error!(user = %self.user_id, room = %room_id, "Failed to deliver reminder: {}", e);
        }
    }
}

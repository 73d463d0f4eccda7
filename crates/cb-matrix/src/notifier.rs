//! Reminder delivery over Matrix

use async_trait::async_trait;
use cb_calendar::CalendarEvent;
use cb_core::Notifier;

use crate::api::MatrixApiClient;

/// Text of a reminder message
pub fn render_reminder(event: &CalendarEvent) -> String {
    format!("Reminder: {} at {} (UTC)", event.text, event.start.format("%H:%M"))
}

/// Sends reminders as text messages
pub struct MatrixNotifier {
    api: MatrixApiClient,
}

impl MatrixNotifier {
    pub fn new(api: MatrixApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Notifier for MatrixNotifier {
    async fn notify(&self, room_id: &str, event: &CalendarEvent) -> anyhow::Result<()> {
        self.api.send_text(room_id, &render_reminder(event)).await?;
        Ok(())
    }
}

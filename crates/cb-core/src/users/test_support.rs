//! Fakes shared by the user and registry tests

use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cb_calendar::{CalendarEvent, CalendarSource, SourceKind};
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::store::{CalendarRecord, Datastore, UserRecord};
use crate::users::Notifier;
use crate::{Error, Result};

/// Datastore that records calls and can be told to fail
#[derive(Default)]
pub(crate) struct RecordingStore {
    pub(crate) calls: Mutex<Vec<String>>,
    pub(crate) fail: bool,
}

impl RecordingStore {
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        if self.fail {
            return Err(Error::Other("store unavailable".to_string()));
        }
        Ok(())
    }
}

impl Datastore for RecordingStore {
    fn fetch_all_users(&self) -> Result<Vec<UserRecord>> {
        Ok(Vec::new())
    }

    fn fetch_all_calendars(&self) -> Result<Vec<CalendarRecord>> {
        Ok(Vec::new())
    }

    fn add_user(&self, user_id: &str, room_id: &str) -> Result<()> {
        self.record(format!("add_user {user_id} {room_id}"))
    }

    fn update_user_room_id(&self, user_id: &str, room_id: &str) -> Result<()> {
        self.record(format!("update_room {user_id} {room_id}"))
    }

    fn add_calendar(&self, user_id: &str, name: &str, kind: SourceKind, _uri: &str) -> Result<i64> {
        self.record(format!("add_calendar {user_id} {name} {kind}"))?;
        Ok(self.calls.lock().unwrap().len() as i64)
    }

    fn remove_calendar(&self, user_id: &str, name: &str) -> Result<()> {
        self.record(format!("remove_calendar {user_id} {name}"))
    }
}

pub(crate) struct ChannelNotifier(pub(crate) mpsc::UnboundedSender<(String, String)>);

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn notify(&self, room_id: &str, event: &CalendarEvent) -> anyhow::Result<()> {
        let _ = self.0.send((room_id.to_string(), event.text.clone()));
        Ok(())
    }
}

/// Source that answers with one event after a delay
pub(crate) struct SlowSource {
    delay: Duration,
    event: Arc<CalendarEvent>,
}

impl SlowSource {
    pub(crate) fn new(delay: Duration, start: DateTime<Utc>, text: &str) -> Self {
        let event = CalendarEvent::new(start, start + chrono::Duration::hours(1), text);
        Self {
            delay,
            event: Arc::new(event),
        }
    }
}

#[async_trait]
impl CalendarSource for SlowSource {
    async fn events(&self, _from: DateTime<Utc>, _to: DateTime<Utc>) -> cb_calendar::Result<Vec<Arc<CalendarEvent>>> {
        tokio::time::sleep(self.delay).await;
        Ok(vec![Arc::clone(&self.event)])
    }
}

pub(crate) fn ics_file(events: &[(DateTime<Utc>, &str)]) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".ics").tempfile().unwrap();
    writeln!(file, "BEGIN:VCALENDAR\r\nVERSION:2.0").unwrap();
    for (start, summary) in events {
        writeln!(
            file,
            "BEGIN:VEVENT\r\nDTSTART:{}\r\nSUMMARY:{}\r\nEND:VEVENT",
            start.format("%Y%m%dT%H%M%SZ"),
            summary
        )
        .unwrap();
    }
    writeln!(file, "END:VCALENDAR").unwrap();
    file
}


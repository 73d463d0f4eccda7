//! Matrix Client-Server API types

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// `GET /account/whoami`
#[derive(Debug, Clone, Deserialize)]
pub struct WhoAmIResponse {
    pub user_id: String,
}

/// Body of an `m.room.message` event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomMessage {
    pub msgtype: String,
    pub body: String,
}

impl RoomMessage {
    pub fn text(body: &str) -> Self {
        Self {
            msgtype: "m.text".to_string(),
            body: body.to_string(),
        }
    }

    /// Bot-authored reply; clients do not answer notices
    pub fn notice(body: &str) -> Self {
        Self {
            msgtype: "m.notice".to_string(),
            body: body.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendResponse {
    pub event_id: String,
}

/// Standard error body
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub errcode: String,
    #[serde(default)]
    pub error: Option<String>,
}

/// `GET /sync`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncResponse {
    pub next_batch: String,
    #[serde(default)]
    pub rooms: Rooms,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Rooms {
    #[serde(default)]
    pub join: HashMap<String, JoinedRoom>,
    #[serde(default)]
    pub invite: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JoinedRoom {
    #[serde(default)]
    pub timeline: Timeline,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Timeline {
    #[serde(default)]
    pub events: Vec<RoomEvent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoomEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub event_id: Option<String>,
    #[serde(default)]
    pub content: serde_json::Value,
}

impl RoomEvent {
    /// Body of a plain text message
    pub fn text_body(&self) -> Option<&str> {
        if self.event_type != "m.room.message" {
            return None;
        }
        if self.content.get("msgtype").and_then(|v| v.as_str()) != Some("m.text") {
            return None;
        }
        self.content.get("body").and_then(|v| v.as_str())
    }
}

/// A text message received in a joined room
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub room_id: String,
    pub sender: String,
    pub body: String,
}

impl SyncResponse {
    /// Text messages of every joined room, in timeline order per room
    pub fn messages(&self) -> Vec<IncomingMessage> {
        self.rooms
            .join
            .iter()
            .flat_map(|(room_id, room)| {
                room.timeline.events.iter().filter_map(move |event| {
                    event.text_body().map(|body| IncomingMessage {
                        room_id: room_id.clone(),
                        sender: event.sender.clone(),
                        body: body.to_string(),
                    })
                })
            })
            .collect()
    }

    /// Rooms the bot has been invited to
    pub fn invited_rooms(&self) -> Vec<String> {
        self.rooms.invite.keys().cloned().collect()
    }
}

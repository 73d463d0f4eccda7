//! `!cal` command handling

use std::sync::Arc;

use cb_calendar::SourceKind;
use cb_core::{User, UserRegistry};
use chrono::Utc;
use tracing::{debug, info, warn};
use url::Url;

use crate::api::MatrixApiClient;
use crate::error::Result;
use crate::types::IncomingMessage;

const PREFIX: &str = "!cal";

const HELP_TEXT: &str = concat!(
    "Available commands:\n",
    "!cal add <name> <ical|caldav> <uri> - Add a calendar\n",
    "!cal remove <name> - Remove a calendar\n",
    "!cal list - Show your calendars\n",
    "!cal help - Show this help\n",
    "\n",
    "Reminders are sent 30 minutes before and at the start of each event."
);

/// A parsed chat command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add { name: String, kind: SourceKind, uri: String },
    Remove { name: String },
    List,
    Help,
    /// Malformed input; carries the message to show
    Invalid(String),
}

impl Command {
    /// Parse a message body; `None` if it is not addressed to the bot
    pub fn parse(body: &str) -> Option<Self> {
        let mut words = body.split_whitespace();
        if words.next()? != PREFIX {
            return None;
        }

        let command = match (words.next(), words.next(), words.next(), words.next(), words.next()) {
            (None, ..) | (Some("help"), None, ..) => Self::Help,
            (Some("list"), None, ..) => Self::List,
            (Some("remove"), Some(name), None, ..) => Self::Remove { name: name.to_string() },
            (Some("add"), Some(name), Some(kind), Some(uri), None) => match kind.parse() {
                Ok(kind) => Self::Add {
                    name: name.to_string(),
                    kind,
                    uri: uri.to_string(),
                },
                Err(_) => Self::Invalid(format!("Unknown calendar type '{}'; use ical or caldav.", kind)),
            },
            (Some("add"), ..) => Self::Invalid("Usage: !cal add <name> <ical|caldav> <uri>".to_string()),
            (Some("remove"), ..) => Self::Invalid("Usage: !cal remove <name>".to_string()),
            (Some(other), ..) => Self::Invalid(format!("Unknown command '{}'. Try !cal help.", other)),
        };
        Some(command)
    }
}

/// Hide the password of a locator before echoing it into a room
pub fn redact_uri(uri: &str) -> String {
    match Url::parse(uri) {
        Ok(mut url) if url.password().is_some() => {
            let _ = url.set_password(Some("***"));
            url.to_string()
        }
        _ => uri.to_string(),
    }
}

/// Executes commands against the user registry
pub struct MessageHandler {
    api_client: MatrixApiClient,
    registry: Arc<UserRegistry>,
}

impl MessageHandler {
    pub fn new(api_client: MatrixApiClient, registry: Arc<UserRegistry>) -> Self {
        Self { api_client, registry }
    }

    /// Process an incoming message
    pub async fn process_message(&self, msg: &IncomingMessage) -> Result<()> {
        let Some(command) = Command::parse(&msg.body) else {
            return Ok(());
        };

        debug!("Command from {} in {}: {:?}", msg.sender, msg.room_id, command);

        let user = self.registry.lookup(&msg.sender);
        let reply = match track_room(&user, &msg.room_id) {
            Ok(()) => self.execute(&user, command).await,
            Err(e) => {
                warn!(user = %msg.sender, "Failed to save room: {}", e);
                format!("Could not save your settings: {}", e)
            }
        };

        self.api_client.send_notice(&msg.room_id, &reply).await?;
        Ok(())
    }

    async fn execute(&self, user: &User, command: Command) -> String {
        match command {
            Command::Add { name, kind, uri } => match user.add_calendar(&name, kind, &uri) {
                Ok(_) => format!("Added calendar '{}'. {}", name, self.rearm(user).await),
                Err(e) => format!("Could not add calendar '{}': {}", name, e),
            },
            Command::Remove { name } => match user.remove_calendar(&name) {
                Ok(()) => format!("Removed calendar '{}'. {}", name, self.rearm(user).await),
                Err(e) => format!("Could not remove calendar '{}': {}", name, e),
            },
            Command::List => {
                let calendars = user.calendars();
                if calendars.is_empty() {
                    return "You have no calendars. Add one with !cal add.".to_string();
                }
                let lines: Vec<String> = calendars
                    .iter()
                    .map(|c| format!("- {} ({}): {}", c.name, c.kind, redact_uri(&c.uri)))
                    .collect();
                format!("Your calendars:\n{}", lines.join("\n"))
            }
            Command::Help => HELP_TEXT.to_string(),
            Command::Invalid(message) => message,
        }
    }

    /// Rebuild the user's schedule and describe the outcome
    async fn rearm(&self, user: &User) -> String {
        let horizon = Utc::now() + self.registry.settings().horizon();
        match user.arm_reminders(horizon).await {
            Ok(count) => {
                info!(user = %user.user_id(), "Scheduled {} reminders", count);
                format!("{} reminders scheduled.", count)
            }
            Err(e) => {
                warn!(user = %user.user_id(), "Failed to schedule reminders: {}", e);
                format!("Could not read your calendars: {}", e)
            }
        }
    }
}

/// Persist a first-time user, or follow them into a new room
fn track_room(user: &User, room_id: &str) -> cb_core::Result<()> {
    if user.exists_in_db() {
        user.update_room_id(room_id)
    } else {
        user.persist(room_id)
    }
}

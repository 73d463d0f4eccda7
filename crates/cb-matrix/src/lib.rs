//! cb-matrix: Matrix front end for cb-gateway
//!
//! Talks to a homeserver over the Client-Server API: long-polls `/sync`,
//! answers `!cal` commands and delivers reminders as room messages.

pub mod api;
pub mod bot;
pub mod error;
pub mod handler;
pub mod notifier;
pub mod types;

pub use api::MatrixApiClient;
pub use bot::MatrixBot;
pub use error::{MatrixError, Result};
pub use handler::{Command, MessageHandler};
pub use notifier::{MatrixNotifier, render_reminder};

//! Matrix bot implementation
//!
//! Main entry point for the Matrix front end

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use cb_core::{MatrixConfig, UserRegistry};

use crate::api::MatrixApiClient;
use crate::error::{MatrixError, Result};
use crate::handler::MessageHandler;
use crate::types::SyncResponse;

/// How long the homeserver may hold a sync request
const SYNC_TIMEOUT: Duration = Duration::from_secs(30);

/// Pause after a failed sync
const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Matrix bot serving `!cal` commands
pub struct MatrixBot {
    api_client: MatrixApiClient,
    account_id: String,
    handler: Arc<MessageHandler>,
}

impl MatrixBot {
    /// Create a bot sharing `api_client` with the reminder notifier
    pub fn new(config: &MatrixConfig, api_client: MatrixApiClient, registry: Arc<UserRegistry>) -> Result<Self> {
        if config.token.is_empty() {
            return Err(MatrixError::TokenNotConfigured);
        }

        let handler = Arc::new(MessageHandler::new(api_client.clone(), registry));

        Ok(Self {
            api_client,
            account_id: config.account_id.clone(),
            handler,
        })
    }

    /// Check the token and the account it belongs to
    pub async fn test_connection(&self) -> Result<String> {
        let user_id = self.api_client.whoami().await?;
        if user_id != self.account_id {
            warn!("Token belongs to {}, configured account is {}", user_id, self.account_id);
        }
        Ok(user_id)
    }

    /// Run the sync loop until `shutdown` fires
    ///
    /// Messages sent before the bot started are skipped.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
        let own_id = self.test_connection().await?;

        let initial = self.api_client.sync(None, Duration::ZERO).await?;
        self.join_invites(&initial).await;
        let mut since = initial.next_batch;

        info!("Matrix bot listening as {}", own_id);

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Matrix bot shutting down");
                    return Ok(());
                }
                result = self.api_client.sync(Some(&since), SYNC_TIMEOUT) => match result {
                    Ok(sync) => {
                        self.handle_sync(&sync, &own_id).await;
                        since = sync.next_batch;
                    }
                    Err(e) => {
                        warn!("Sync failed: {}", e);
                        tokio::time::sleep(RETRY_DELAY).await;
                    }
                }
            }
        }
    }

    async fn handle_sync(&self, sync: &SyncResponse, own_id: &str) {
        self.join_invites(sync).await;

        for msg in sync.messages() {
            if msg.sender == own_id {
                continue;
            }

            let handler = Arc::clone(&self.handler);
            tokio::spawn(async move {
                if let Err(e) = handler.process_message(&msg).await {
                    error!("Error processing message: {:?}", e);
                }
            });
        }
    }

    async fn join_invites(&self, sync: &SyncResponse) {
        for room_id in sync.invited_rooms() {
            debug!("Invited to {}", room_id);
            if let Err(e) = self.api_client.join_room(&room_id).await {
                warn!("Failed to join {}: {}", room_id, e);
            }
        }
    }
}

//! Upsell email sequence commands.
//!
//! The sequence engine lives elsewhere and owns its own schedule storage. This
//! module only hands it `schedule`/`cancel` commands. Delivery is
//! fire-and-forget: `dispatch` returns as soon as the command is handed off,
//! and delivery failures are logged, never reported back to the purchase flow.

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;

/// Sequence that nudges starter buyers toward the upgrade program.
pub const STARTER_UPGRADE_SEQUENCE: &str = "kickstart_upgrade";

/// Days after purchase at which the starter upgrade emails go out.
pub const STARTER_UPGRADE_STEP_DAYS: &[u32] = &[7, 14, 21];

/// Quick retries so a flaky sequence service doesn't pile up tasks.
const DISPATCH_RETRY_DELAYS: &[u64] = &[100, 400];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum UpsellCommand {
    Schedule {
        user_id: i64,
        sequence: String,
        /// Order that triggered the sequence
        purchase_order_id: String,
        /// Program the sequence promotes
        offer_program: String,
        step_days: Vec<u32>,
    },
    Cancel {
        user_id: i64,
        sequence: String,
        reason: String,
    },
}

impl UpsellCommand {
    pub fn schedule_starter_upgrade(user_id: i64, order_id: &str, upgrade_slug: &str) -> Self {
        UpsellCommand::Schedule {
            user_id,
            sequence: STARTER_UPGRADE_SEQUENCE.to_string(),
            purchase_order_id: order_id.to_string(),
            offer_program: upgrade_slug.to_string(),
            step_days: STARTER_UPGRADE_STEP_DAYS.to_vec(),
        }
    }

    pub fn cancel_starter_upgrade(user_id: i64) -> Self {
        UpsellCommand::Cancel {
            user_id,
            sequence: STARTER_UPGRADE_SEQUENCE.to_string(),
            reason: "converted".to_string(),
        }
    }

    pub fn user_id(&self) -> i64 {
        match self {
            UpsellCommand::Schedule { user_id, .. } | UpsellCommand::Cancel { user_id, .. } => {
                *user_id
            }
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            UpsellCommand::Schedule { .. } => "schedule",
            UpsellCommand::Cancel { .. } => "cancel",
        }
    }
}

#[derive(Debug, Error)]
pub enum UpsellError {
    #[error("upsell dispatch requires a running async runtime")]
    NoRuntime,
    #[error("upsell sequencer rejected command: {0}")]
    Rejected(String),
}

/// Hands upsell commands to the sequence engine.
pub trait UpsellSequencer: Send + Sync {
    fn dispatch(&self, command: UpsellCommand) -> Result<(), UpsellError>;
}

/// Used when no sequence service is configured: commands are only logged.
#[derive(Debug, Default, Clone)]
pub struct LoggingUpsellSequencer;

impl UpsellSequencer for LoggingUpsellSequencer {
    fn dispatch(&self, command: UpsellCommand) -> Result<(), UpsellError> {
        tracing::info!(
            "Upsell sequencer not configured, dropping {} command for user {}",
            command.action(),
            command.user_id()
        );
        Ok(())
    }
}

/// POSTs commands to the sequence service in a background task.
#[derive(Debug, Clone)]
pub struct WebhookUpsellSequencer {
    client: Client,
    url: String,
}

impl WebhookUpsellSequencer {
    pub fn new(url: String) -> Self {
        Self {
            client: Client::new(),
            url,
        }
    }
}

impl UpsellSequencer for WebhookUpsellSequencer {
    fn dispatch(&self, command: UpsellCommand) -> Result<(), UpsellError> {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| UpsellError::NoRuntime)?;
        let client = self.client.clone();
        let url = self.url.clone();
        let action = command.action();
        let user_id = command.user_id();

        // Panics in the spawned task are logged rather than silently swallowed
        handle.spawn(
            AssertUnwindSafe(async move {
                send_command(&client, &url, &command).await;
            })
            .catch_unwind()
            .map(move |result| {
                if let Err(panic) = result {
                    let panic_msg = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    tracing::error!(
                        "Upsell {} task panicked for user {}: {}",
                        action,
                        user_id,
                        panic_msg
                    );
                }
            }),
        );
        Ok(())
    }
}

async fn send_command(client: &Client, url: &str, command: &UpsellCommand) {
    for (attempt, delay_ms) in std::iter::once(&0u64)
        .chain(DISPATCH_RETRY_DELAYS.iter())
        .enumerate()
    {
        if attempt > 0 {
            tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
        }

        match client
            .post(url)
            .json(command)
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => {
                tracing::debug!(
                    "Upsell {} delivered for user {} (attempt {})",
                    command.action(),
                    command.user_id(),
                    attempt + 1
                );
                return;
            }
            Ok(resp) => {
                tracing::debug!("Upsell sequencer returned {}", resp.status());
            }
            Err(e) => {
                tracing::debug!("Upsell sequencer call failed: {}", e);
            }
        }
    }

    tracing::warn!(
        "Upsell {} for user {} failed after {} attempts",
        command.action(),
        command.user_id(),
        DISPATCH_RETRY_DELAYS.len() + 1
    );
}

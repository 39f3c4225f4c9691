//! Handler for the `/broadcast` slash command.
//!
//! Opens the Draft modal, or answers the `status` subcommand with the
//! current tracked-channel count.

use chrono::Utc;
use serde_json::{Value, json};
use tracing::info;

use super::helpers::{ok_ephemeral, open_modal_with_timeout};
use super::parsing::parse_slack_event;
use crate::core::config::AppConfig;
use crate::errors::BotError;
use crate::slack::blocks::draft_modal_view;
use crate::storage::BotStore;

/// Handle a slash command from Slack.
///
/// # Arguments
/// - `config`: Application configuration
/// - `store`: KV-backed bot state
/// - `body`: The raw form-encoded body of the slash command
///
/// # Returns
/// A JSON response value to send back to Slack.
///
/// # Errors
/// Returns an error if the body cannot be parsed or the store is
/// unreachable for the `status` subcommand.
pub async fn handle_slash_command(
    config: &AppConfig,
    store: &BotStore,
    body: &str,
) -> Result<Value, BotError> {
    let slack_event = parse_slack_event(body)?;

    if !config.user_allowed(&slack_event.user_id) {
        return Ok(ok_ephemeral("You are not allowed to use this command."));
    }

    // Status shortcut: /broadcast status
    if slack_event.text.trim().eq_ignore_ascii_case("status") {
        let count = store.channel_count().await?;
        return Ok(ok_ephemeral(&format!("Tracked channels: {count}")));
    }

    info!("Opening draft modal for {}", slack_event.user_id);

    let private_metadata = json!({
        "user_id": slack_event.user_id,
        "ts": Utc::now().timestamp()
    })
    .to_string();

    let view = draft_modal_view(&private_metadata);
    open_modal_with_timeout(config, &slack_event.trigger_id, &view, 2000).await;

    // Respond quickly to Slack (prevents timeout)
    Ok(ok_ephemeral("Opening draft… ✅"))
}

//! Handler for Slack Events API callbacks.
//!
//! The bot's only event interest is its own channel membership:
//! `member_joined_channel` adds the channel to the broadcast roster,
//! `member_left_channel` removes it. Everything else is acked and ignored.

use serde_json::Value;
use tracing::{error, info};

use super::helpers::{err_response, ok_empty};
use super::parsing::v_str;
use crate::core::config::AppConfig;
use crate::storage::BotStore;

pub async fn handle_event_callback(
    config: &AppConfig,
    store: &BotStore,
    payload: &Value,
) -> Value {
    let event = payload.get("event").cloned().unwrap_or(Value::Null);

    // Membership events fire for every member; only the bot's own matter.
    if v_str(&event, &["user"]) != Some(config.slack_bot_user_id.as_str()) {
        return ok_empty();
    }

    let Some(channel) = v_str(&event, &["channel"]) else {
        return ok_empty();
    };

    let result = match v_str(&event, &["type"]) {
        Some("member_joined_channel") => {
            info!("Bot joined channel {}", channel);
            store.track_channel(channel).await
        }
        Some("member_left_channel") => {
            info!("Bot left channel {}", channel);
            store.untrack_channel(channel).await
        }
        _ => return ok_empty(),
    };

    match result {
        Ok(()) => ok_empty(),
        Err(e) => {
            error!("Failed to update channel roster: {}", e);
            err_response(500, "roster update failed")
        }
    }
}

//! Handler for Slack interactive components.
//!
//! This module processes interactive payloads for the broadcast flow:
//! - `view_submission` of the Draft modal - validates, stores the draft and
//!   swaps in the Review modal with a rendered preview
//! - `block_actions` on the Review modal - Edit reopens the Draft modal,
//!   Send queues the job, starts the cooldown and triggers the worker

use chrono::Utc;
use serde_json::{Value, json};
use tracing::{error, info};
use uuid::Uuid;

use super::helpers::{
    ok_empty, ok_modal_errors, ok_modal_update, trigger_worker_async, update_modal_with_timeout,
};
use super::parsing::{extract_draft, v_path, v_str};
use crate::core::config::AppConfig;
use crate::core::models::{BroadcastJob, Draft};
use crate::slack::blocks::{
    build_broadcast_blocks, draft_modal_view, notice_modal_view, review_modal_view,
    sending_modal_view,
};
use crate::storage::BotStore;

// ============================================================================
// Main Entry Point
// ============================================================================

/// Handle an interactive payload from Slack.
pub async fn handle_interactive(config: &AppConfig, store: &BotStore, payload: &Value) -> Value {
    let user_id = v_str(payload, &["user", "id"]).unwrap_or("");

    // For interactions, an empty response makes Slack close silently.
    if !config.user_allowed(user_id) {
        return ok_empty();
    }

    match v_str(payload, &["type"]) {
        Some("view_submission")
            if v_str(payload, &["view", "callback_id"]) == Some("broadcast_draft_submit") =>
        {
            handle_draft_submission(config, store, payload, user_id).await
        }
        Some("block_actions") => handle_block_action(config, store, payload, user_id).await,
        _ => ok_empty(),
    }
}

// ============================================================================
// Draft Submission
// ============================================================================

/// Draft submitted: validate state, persist the draft, show the Review modal.
async fn handle_draft_submission(
    config: &AppConfig,
    store: &BotStore,
    payload: &Value,
    user_id: &str,
) -> Value {
    match store.cooldown_active(user_id).await {
        Ok(true) => {
            return ok_modal_errors(
                &json!({ "body_block": "Cooldown active. Try again shortly." }),
            );
        }
        Ok(false) => {}
        Err(e) => {
            error!("Cooldown lookup failed: {}", e);
            return ok_modal_errors(
                &json!({ "body_block": "Storage unavailable. Try again shortly." }),
            );
        }
    }

    let channel_count = match store.channel_count().await {
        Ok(count) => count,
        Err(e) => {
            error!("Channel count lookup failed: {}", e);
            return ok_modal_errors(
                &json!({ "body_block": "Storage unavailable. Try again shortly." }),
            );
        }
    };

    if channel_count == 0 {
        return ok_modal_errors(&json!({
            "body_block": "No tracked channels yet. Invite the bot to at least one channel."
        }));
    }

    if channel_count > config.max_broadcast_channels {
        return ok_modal_errors(&json!({
            "body_block": format!(
                "Safety cap triggered: {} > {}.",
                channel_count, config.max_broadcast_channels
            )
        }));
    }

    let view_state = v_path(payload, &["view", "state"]).cloned().unwrap_or(Value::Null);
    let draft = extract_draft(&view_state);

    let preview = preview_blocks(&draft, user_id);

    let draft_id = Uuid::new_v4().to_string();
    if let Err(e) = store.save_draft(&draft_id, &draft).await {
        error!("Failed to persist draft: {}", e);
        return ok_modal_errors(
            &json!({ "body_block": "Storage unavailable. Try again shortly." }),
        );
    }

    info!("Draft {} stored for {}", draft_id, user_id);

    let private_metadata = json!({ "user_id": user_id, "draft_id": draft_id }).to_string();
    let review = review_modal_view(&private_metadata, &preview, channel_count);

    ok_modal_update(&review)
}

// ============================================================================
// Review Modal Buttons
// ============================================================================

async fn handle_block_action(
    config: &AppConfig,
    store: &BotStore,
    payload: &Value,
    user_id: &str,
) -> Value {
    let action_id = payload
        .get("actions")
        .and_then(|a| a.as_array())
        .and_then(|a| a.first())
        .and_then(|a| a.get("action_id"))
        .and_then(|v| v.as_str())
        .unwrap_or("");

    let Some(view_id) = v_str(payload, &["view", "id"]) else {
        return ok_empty();
    };
    let view_hash = v_str(payload, &["view", "hash"]);

    let meta: Value = v_str(payload, &["view", "private_metadata"])
        .and_then(|m| serde_json::from_str(m).ok())
        .unwrap_or(Value::Null);
    let draft_id = v_str(&meta, &["draft_id"]).unwrap_or("");

    match action_id {
        "edit_draft" => {
            let private_metadata =
                json!({ "user_id": user_id, "ts": Utc::now().timestamp() }).to_string();
            let view = draft_modal_view(&private_metadata);
            update_modal_with_timeout(config, view_id, view_hash, &view, 2000).await;
            ok_empty()
        }
        "send_broadcast" => {
            handle_send(config, store, user_id, view_id, view_hash, draft_id).await
        }
        _ => ok_empty(),
    }
}

/// Send clicked: re-check the cooldown, queue the job, confirm in the modal
/// and fire the worker trigger.
async fn handle_send(
    config: &AppConfig,
    store: &BotStore,
    user_id: &str,
    view_id: &str,
    view_hash: Option<&str>,
    draft_id: &str,
) -> Value {
    let job = match resolve_send(store, user_id, draft_id).await {
        Ok(job) => job,
        Err(notice) => {
            let view = notice_modal_view("Review Broadcast", &notice);
            update_modal_with_timeout(config, view_id, view_hash, &view, 2000).await;
            return ok_empty();
        }
    };

    if let Err(e) = store.push_job(&job).await {
        error!("Failed to queue broadcast job: {}", e);
        let view = notice_modal_view("Review Broadcast", "Could not queue the broadcast. Try again.");
        update_modal_with_timeout(config, view_id, view_hash, &view, 2000).await;
        return ok_empty();
    }
    store.start_cooldown(user_id).await;

    info!("Broadcast job queued by {}", user_id);

    // Confirm in the modal first, then kick the worker.
    update_modal_with_timeout(config, view_id, view_hash, &sending_modal_view(), 2000).await;
    trigger_worker_async(config).await;

    ok_empty()
}

/// Re-validate Send and produce the job to queue, or the notice text
/// explaining why nothing was queued. A storage failure is reported as
/// such, never disguised as an expired draft.
async fn resolve_send(
    store: &BotStore,
    user_id: &str,
    draft_id: &str,
) -> Result<BroadcastJob, String> {
    match store.cooldown_active(user_id).await {
        Ok(true) => return Err("Cooldown active. Try again shortly.".to_string()),
        Ok(false) => {}
        Err(e) => {
            error!("Cooldown lookup failed: {}", e);
            return Err("Storage unavailable. Try again shortly.".to_string());
        }
    }

    if draft_id.is_empty() {
        return Err("Draft expired. Run `/broadcast` again.".to_string());
    }

    let draft = match store.load_draft(draft_id).await {
        Ok(Some(draft)) => draft,
        Ok(None) => return Err("Draft expired. Run `/broadcast` again.".to_string()),
        Err(e) => {
            error!("Draft lookup failed: {}", e);
            return Err("Storage unavailable. Try again shortly.".to_string());
        }
    };

    Ok(job_from_draft(&draft, user_id))
}

// ============================================================================
// Helpers
// ============================================================================

fn preview_blocks(draft: &Draft, user_id: &str) -> Value {
    let title = if draft.title.is_empty() {
        "Partner Update"
    } else {
        &draft.title
    };
    build_broadcast_blocks(
        title,
        &draft.body,
        &draft.category,
        &format!("<@{user_id}>"),
        draft.link.as_deref(),
    )
}

fn job_from_draft(draft: &Draft, user_id: &str) -> BroadcastJob {
    BroadcastJob {
        queued_at: Utc::now().timestamp(),
        queued_by: user_id.to_string(),
        title: draft.title.clone(),
        category: draft.category.clone(),
        body: draft.body.clone(),
        link: draft.link.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::resolve_send;
    use crate::storage::{BotStore, KvClient};

    fn unreachable_store(cooldown_seconds: u64) -> BotStore {
        // Nothing listens on this port, so every store call fails fast.
        BotStore::new(
            KvClient::new("http://127.0.0.1:9".to_string(), "token".to_string()),
            cooldown_seconds,
        )
    }

    #[tokio::test]
    async fn send_reports_storage_trouble_when_cooldown_lookup_fails() {
        let store = unreachable_store(60);
        let notice = resolve_send(&store, "U1", "d-1").await.unwrap_err();
        assert_eq!(notice, "Storage unavailable. Try again shortly.");
    }

    #[tokio::test]
    async fn send_reports_storage_trouble_when_draft_lookup_fails() {
        // Cooldowns disabled, so the draft lookup is the first store hit.
        let store = unreachable_store(0);
        let notice = resolve_send(&store, "U1", "d-1").await.unwrap_err();
        assert_eq!(notice, "Storage unavailable. Try again shortly.");
    }

    #[tokio::test]
    async fn send_without_draft_id_reports_expired_draft() {
        let store = unreachable_store(0);
        let notice = resolve_send(&store, "U1", "").await.unwrap_err();
        assert!(notice.contains("Draft expired"));
    }
}

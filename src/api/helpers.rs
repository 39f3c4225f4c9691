//! Common helper functions for API handlers.
//!
//! This module provides response builders and shared async operations
//! to reduce duplication across handlers.

use serde_json::{Value, json};
use std::time::Duration;
use tracing::error;

use crate::core::config::AppConfig;
use crate::slack::SlackClient;

// ============================================================================
// Response Builders
// ============================================================================

/// Returns a 200 OK response with an empty JSON body.
#[must_use]
pub fn ok_empty() -> Value {
    json!({ "statusCode": 200, "body": "{}" })
}

/// Returns a 200 OK response with an ephemeral Slack message.
#[must_use]
pub fn ok_ephemeral(text: &str) -> Value {
    json!({
        "statusCode": 200,
        "body": json!({ "response_type": "ephemeral", "text": text }).to_string()
    })
}

/// Returns a 200 OK response with a plain-text body (the Events API
/// `url_verification` challenge echo).
#[must_use]
pub fn ok_text(text: &str) -> Value {
    json!({
        "statusCode": 200,
        "headers": { "Content-Type": "text/plain; charset=utf-8" },
        "body": text
    })
}

/// Returns a 200 OK response with modal validation errors.
#[must_use]
pub fn ok_modal_errors(errors: &Value) -> Value {
    json!({
        "statusCode": 200,
        "body": json!({ "response_action": "errors", "errors": errors }).to_string()
    })
}

/// Returns a 200 OK response replacing the open modal with `view`.
#[must_use]
pub fn ok_modal_update(view: &Value) -> Value {
    json!({
        "statusCode": 200,
        "body": json!({ "response_action": "update", "view": view }).to_string()
    })
}

/// Returns an error response with the given status code and message.
#[must_use]
pub fn err_response(status_code: u16, message: &str) -> Value {
    json!({
        "statusCode": status_code,
        "body": json!({ "error": message }).to_string()
    })
}

// ============================================================================
// Modal Operations
// ============================================================================

/// Opens a modal with a timeout to avoid blocking the Slack ack.
///
/// This spawns an async task to open the modal and waits up to `timeout_ms`
/// for it to complete. If the timeout fires, the modal open continues in
/// the background.
pub async fn open_modal_with_timeout(
    config: &AppConfig,
    trigger_id: &str,
    view: &Value,
    timeout_ms: u64,
) {
    let token = config.slack_bot_token.clone();
    let trigger_id = trigger_id.to_string();
    let view_clone = view.clone();

    let modal_handle = tokio::spawn(async move {
        let client = SlackClient::new(token);
        if let Err(e) = client.open_modal(&trigger_id, &view_clone).await {
            error!("Failed to open modal: {}", e);
        }
    });

    let _ = tokio::time::timeout(Duration::from_millis(timeout_ms), modal_handle).await;
}

/// Replaces an open modal with a timeout, same pattern as
/// [`open_modal_with_timeout`].
pub async fn update_modal_with_timeout(
    config: &AppConfig,
    view_id: &str,
    hash: Option<&str>,
    view: &Value,
    timeout_ms: u64,
) {
    let token = config.slack_bot_token.clone();
    let view_id = view_id.to_string();
    let hash = hash.map(ToString::to_string);
    let view_clone = view.clone();

    let handle = tokio::spawn(async move {
        let client = SlackClient::new(token);
        if let Err(e) = client
            .update_modal(&view_id, hash.as_deref(), &view_clone)
            .await
        {
            error!("Failed to update modal: {}", e);
        }
    });

    let _ = tokio::time::timeout(Duration::from_millis(timeout_ms), handle).await;
}

// ============================================================================
// Worker Trigger
// ============================================================================

/// Fire-and-forget trigger of the worker endpoint, once.
///
/// The queue is the source of truth; if this never lands, the worker can be
/// triggered manually. A short timeout keeps the interactions ack fast.
pub async fn trigger_worker_async(config: &AppConfig) {
    let url = format!(
        "{}/api/worker?secret={}",
        config.public_base_url,
        urlencoding::encode(&config.worker_secret)
    );

    let handle = tokio::spawn(async move {
        let client = reqwest::Client::new();
        if let Err(e) = client
            .get(&url)
            .timeout(Duration::from_secs(2))
            .send()
            .await
        {
            error!("Worker trigger failed: {}", e);
        }
    });

    let _ = tokio::time::timeout(Duration::from_millis(2200), handle).await;
}

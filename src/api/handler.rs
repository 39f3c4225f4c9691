//! API Lambda handler - thin router that delegates to specialized handlers.
//!
//! This module handles:
//! - Request validation (headers, body, signature)
//! - Events API callbacks (delegated to `event_handler` - membership tracking)
//! - Interactive components (delegated to `interactive_handler` - modals)
//! - The `/broadcast` slash command (delegated to `slash_handler`)

use super::{
    event_handler, helpers, interactive_handler, parsing, signature, slash_handler,
};
use crate::core::config::AppConfig;
use crate::errors::BotError;
use crate::storage::{BotStore, KvClient};
use lambda_runtime::{Error, LambdaEvent};
use serde_json::Value;
use tracing::{error, info};

pub use self::function_handler as handler;

/// Lambda handler for the API entrypoint.
///
/// Routes requests to specialized handlers based on payload type.
///
/// # Errors
///
/// Returns an error response payload if the request is malformed or fails
/// Slack signature verification; otherwise returns a 200 with a JSON body.
#[tracing::instrument(level = "info", skip(event))]
pub async fn function_handler(event: LambdaEvent<Value>) -> Result<Value, Error> {
    let config = AppConfig::from_env().map_err(|e| {
        error!("Config error: {}", e);
        Error::from(e)
    })?;

    // ========================================================================
    // Extract and validate headers and body
    // ========================================================================

    let Some(headers) = event.payload.get("headers") else {
        error!("Request missing headers");
        return Ok(helpers::err_response(400, "Missing headers"));
    };

    let body = match extract_body(&event.payload) {
        Ok(b) => b,
        Err(response) => return Ok(response),
    };

    // ========================================================================
    // Events API handshake and retry dedup (before signature: the
    // url_verification challenge arrives once, at subscription time)
    // ========================================================================

    let json_body = serde_json::from_str::<Value>(body).ok();

    if let Some(json_body) = &json_body {
        if json_body.get("type").and_then(|t| t.as_str()) == Some("url_verification") {
            let challenge = json_body
                .get("challenge")
                .and_then(|c| c.as_str())
                .unwrap_or("");
            return Ok(helpers::ok_text(challenge));
        }
    }

    // Slack redelivers events/interactions it thinks timed out; processing
    // a redelivery would double-track or double-send.
    if parsing::get_header_value(headers, "X-Slack-Retry-Num").is_some() {
        info!("Ignoring Slack retry delivery");
        return Ok(helpers::ok_empty());
    }

    // ========================================================================
    // Verify Slack signature
    // ========================================================================

    if let Err(response) = verify_signature(body, headers, &config) {
        return Ok(response);
    }

    info!("Slack signature verified successfully");

    let store = BotStore::new(
        KvClient::new(
            config.kv_rest_api_url.clone(),
            config.kv_rest_api_token.clone(),
        ),
        config.broadcast_cooldown_seconds,
    );

    // ========================================================================
    // Route to specialized handlers
    // ========================================================================

    if let Some(json_body) = &json_body {
        if json_body.get("type").and_then(|t| t.as_str()) == Some("event_callback") {
            return Ok(event_handler::handle_event_callback(&config, &store, json_body).await);
        }
    }

    // Interactive components (form-encoded with payload=)
    if parsing::is_interactive_body(body) {
        let payload = match parsing::parse_interactive_payload(body) {
            Ok(v) => v,
            Err(e) => {
                error!("Interactive payload parse error: {}", e);
                return Ok(helpers::err_response(400, &format!("Parse Error: {e}")));
            }
        };

        return Ok(interactive_handler::handle_interactive(&config, &store, &payload).await);
    }

    // Slash command (form-encoded)
    match slash_handler::handle_slash_command(&config, &store, body).await {
        Ok(response) => Ok(response),
        Err(BotError::StorageError(e)) => {
            // A KV outage is not the caller's fault; tell the invoker
            // instead of blaming their request.
            error!("Slash command storage failure: {}", e);
            Ok(helpers::ok_ephemeral(
                "Storage unavailable. Try again shortly.",
            ))
        }
        Err(e) => {
            error!("Failed to handle slash command: {}", e);
            Ok(helpers::err_response(400, &format!("Parse Error: {e}")))
        }
    }
}

// ============================================================================
// Request Validation Helpers
// ============================================================================

fn extract_body(payload: &Value) -> Result<&str, Value> {
    let Some(body) = payload.get("body") else {
        error!("Request missing body");
        return Err(helpers::err_response(400, "Missing body"));
    };

    let Some(body_str) = body.as_str() else {
        error!("Request body is not a string");
        return Err(helpers::err_response(400, "Invalid body format"));
    };

    Ok(body_str)
}

fn verify_signature(body: &str, headers: &Value, config: &AppConfig) -> Result<(), Value> {
    let Some(sig) = parsing::get_header_value(headers, "X-Slack-Signature") else {
        error!("Missing X-Slack-Signature header");
        return Err(helpers::err_response(
            401,
            "Missing X-Slack-Signature header",
        ));
    };

    let Some(timestamp) = parsing::get_header_value(headers, "X-Slack-Request-Timestamp") else {
        error!("Missing X-Slack-Request-Timestamp header");
        return Err(helpers::err_response(
            401,
            "Missing X-Slack-Request-Timestamp header",
        ));
    };

    if !signature::verify_slack_signature(body, timestamp, sig, &config.slack_signing_secret) {
        error!("Slack signature verification failed");
        return Err(helpers::err_response(401, "Invalid Slack signature"));
    }

    Ok(())
}

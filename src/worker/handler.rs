//! Worker Lambda handler: a GET-equivalent trigger gated by a shared secret.
//!
//! Each trigger drains at most one job. There is no scheduling loop here;
//! throughput belongs to whoever calls the trigger (the interactions
//! endpoint fires it once per queued job, and it can be hit manually).

use lambda_runtime::{Error, LambdaEvent};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{error, info};

use super::broadcast::{Broadcaster, RunOutcome};
use crate::core::config::AppConfig;
use crate::core::models::WorkerReport;
use crate::slack::client::SlackClient;
use crate::storage::{BotStore, KvClient};

pub use self::function_handler as handler;

/// Lambda handler for the Worker entrypoint.
///
/// # Errors
///
/// Returns an error only if configuration cannot be loaded; every runtime
/// condition maps to a JSON response payload.
#[tracing::instrument(level = "info", skip(event))]
pub async fn function_handler(event: LambdaEvent<Value>) -> Result<Value, Error> {
    let config = AppConfig::from_env().map_err(|e| {
        error!("Config error: {}", e);
        Error::from(e)
    })?;

    // Auth via querystring secret. A mismatch must leave the queue untouched.
    let provided = query_param(&event.payload, "secret").unwrap_or_default();
    if provided.is_empty() || provided != config.worker_secret {
        return Ok(respond(401, &json!({ "error": "unauthorized" })));
    }

    let store = BotStore::new(
        KvClient::new(
            config.kv_rest_api_url.clone(),
            config.kv_rest_api_token.clone(),
        ),
        config.broadcast_cooldown_seconds,
    );
    let transport = SlackClient::new(config.slack_bot_token.clone());
    let broadcaster = Broadcaster::new(
        &store,
        &transport,
        Duration::from_millis(config.post_throttle_ms),
        config.max_broadcast_channels,
    );

    let outcome = match broadcaster.run_once().await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("Worker run failed: {}", e);
            return Ok(respond(500, &json!({ "error": e.to_string() })));
        }
    };

    outcome_response(outcome).map_err(Error::from)
}

/// Map a run outcome to the API-Gateway-style JSON response.
///
/// # Errors
///
/// Returns an error if the report fails to serialize.
pub fn outcome_response(outcome: RunOutcome) -> Result<Value, serde_json::Error> {
    let (status, report) = match outcome {
        RunOutcome::NoJob => (200, WorkerReport::message("No queued jobs.")),
        RunOutcome::EmptyRoster => (
            200,
            WorkerReport::message("No channels tracked; job dropped."),
        ),
        RunOutcome::MalformedJob { detail } => {
            (200, WorkerReport::error(&format!("malformed job: {detail}")))
        }
        RunOutcome::CapExceeded { channels, cap } => (
            400,
            WorkerReport::error(&format!("cap_exceeded {channels}>{cap}")),
        ),
        RunOutcome::Completed(summary) => {
            info!(
                sent = summary.sent,
                failed = summary.failed,
                "Worker run complete"
            );
            (200, WorkerReport::delivered(&summary))
        }
    };

    Ok(respond(status, &serde_json::to_value(&report)?))
}

fn respond(status_code: u16, body: &Value) -> Value {
    json!({
        "statusCode": status_code,
        "body": body.to_string()
    })
}

/// Look up a query parameter in either API-Gateway shape: the parsed
/// `queryStringParameters` map or the `rawQueryString`.
fn query_param(payload: &Value, name: &str) -> Option<String> {
    if let Some(v) = payload
        .get("queryStringParameters")
        .and_then(|m| m.get(name))
        .and_then(|v| v.as_str())
    {
        return Some(v.to_string());
    }

    let raw = payload.get("rawQueryString").and_then(|q| q.as_str())?;
    let prefix = format!("{name}=");
    raw.split('&')
        .find(|kv| kv.starts_with(&prefix))
        .map(|kv| kv.trim_start_matches(prefix.as_str()))
        .and_then(|v| urlencoding::decode(v).ok())
        .map(|v| v.into_owned())
}

#[cfg(test)]
mod tests {
    use super::query_param;
    use serde_json::json;

    #[test]
    fn query_param_from_parsed_map() {
        let payload = json!({ "queryStringParameters": { "secret": "s3cret" } });
        assert_eq!(query_param(&payload, "secret").as_deref(), Some("s3cret"));
    }

    #[test]
    fn query_param_from_raw_query_string() {
        let payload = json!({ "rawQueryString": "foo=1&secret=a%20b" });
        assert_eq!(query_param(&payload, "secret").as_deref(), Some("a b"));
    }

    #[test]
    fn query_param_missing() {
        let payload = json!({ "rawQueryString": "foo=1" });
        assert_eq!(query_param(&payload, "secret"), None);
    }
}

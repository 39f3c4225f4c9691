use serde_json::Value;

use crate::core::models::Draft;
use crate::errors::BotError;
use crate::slack::command_parser::{SlackCommandEvent, decode_url_component, parse_form_data};

pub fn is_interactive_body(body: &str) -> bool {
    body.starts_with("payload=") || body.contains("&payload=")
}

pub fn parse_interactive_payload(form_body: &str) -> Result<Value, BotError> {
    for pair in form_body.split('&') {
        if let Some(eq_idx) = pair.find('=') {
            let key = &pair[..eq_idx];
            if key == "payload" {
                let raw_val = &pair[eq_idx + 1..];
                let decoded = decode_url_component(raw_val).map_err(|e| {
                    BotError::ParseError(format!("Failed to decode payload: {}", e))
                })?;
                let v: Value = serde_json::from_str(&decoded)
                    .map_err(|e| BotError::ParseError(format!("Invalid JSON payload: {}", e)))?;
                return Ok(v);
            }
        }
    }
    Err(BotError::ParseError("Missing payload field".to_string()))
}

pub fn v_path<'a>(root: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut cur = root;
    for key in path {
        cur = cur.get(*key)?;
    }
    Some(cur)
}

pub fn v_str<'a>(root: &'a Value, path: &[&str]) -> Option<&'a str> {
    v_path(root, path).and_then(|v| v.as_str())
}

pub fn parse_slack_event(payload: &str) -> Result<SlackCommandEvent, BotError> {
    parse_form_data(payload)
        .map_err(|e| BotError::ParseError(format!("Failed to parse form data: {}", e)))
}

pub fn get_header_value<'a>(headers: &'a Value, name: &str) -> Option<&'a str> {
    if let Some(v) = headers.get(name).and_then(|s| s.as_str()) {
        return Some(v);
    }
    headers.as_object().and_then(|map| {
        map.iter().find_map(|(k, v)| {
            if k.eq_ignore_ascii_case(name) {
                v.as_str()
            } else {
                None
            }
        })
    })
}

/// Defensive extraction of a `Draft` from modal view state.
///
/// Slack shows a "trouble connecting" banner if the submission handler
/// errors out, so every missing or oddly shaped field falls back to a
/// default instead.
#[must_use]
pub fn extract_draft(view_state: &Value) -> Draft {
    let title = v_str(view_state, &["values", "title_block", "title_input", "value"])
        .unwrap_or("")
        .trim()
        .to_string();

    let category = v_str(
        view_state,
        &[
            "values",
            "category_block",
            "category_select",
            "selected_option",
            "value",
        ],
    )
    .unwrap_or("Release")
    .to_string();

    let body = v_str(view_state, &["values", "body_block", "body_input", "value"])
        .unwrap_or("")
        .trim()
        .to_string();

    let link = v_str(view_state, &["values", "link_block", "link_input", "value"])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string);

    Draft {
        title,
        category,
        body,
        link,
    }
}

use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Structure representing a Slack slash command event.
/// This contains the fields Slack sends when a user invokes a slash command.
#[derive(Debug, Deserialize, Serialize)]
pub struct SlackCommandEvent {
    pub token: String,
    pub team_id: String,
    pub channel_id: String,
    pub channel_name: String,
    pub user_id: String,
    pub user_name: String,
    pub command: String,
    pub text: String,
    pub response_url: String,
    pub trigger_id: String,
}

/// Decodes a URL-encoded string, treating `+` as a space (form encoding).
///
/// # Errors
///
/// Returns an error message if the percent-decoded bytes are not UTF-8.
///
/// # Examples
///
/// ```
/// use megaphone::slack::command_parser::decode_url_component;
///
/// let decoded = decode_url_component("hello%20world").unwrap();
/// assert_eq!(decoded, "hello world");
///
/// let decoded_plus = decode_url_component("hello+world").unwrap();
/// assert_eq!(decoded_plus, "hello world");
/// ```
pub fn decode_url_component(input: &str) -> Result<String, String> {
    percent_decode_str(input)
        .decode_utf8()
        .map(|s| s.replace('+', " "))
        .map_err(|e| format!("Failed to decode URL component: {}", e))
        .map(|s| s.to_string())
}

/// Parses the URL-encoded form body of a slash command request.
///
/// Missing fields default to empty strings; Slack omits some fields in
/// certain workspaces and a slash command should never 400 over that.
///
/// # Errors
///
/// Returns an error message if a key or value fails to decode.
///
/// # Examples
///
/// ```
/// use megaphone::slack::command_parser::parse_form_data;
///
/// let form_data = "token=abc123&team_id=T123&channel_id=C123&\
///                  channel_name=general&user_id=U123&user_name=username&\
///                  command=%2Fbroadcast&text=status&\
///                  response_url=https%3A%2F%2Fhooks.slack.com%2F&\
///                  trigger_id=123.456";
///
/// let event = parse_form_data(form_data).unwrap();
/// assert_eq!(event.command, "/broadcast");
/// assert_eq!(event.text, "status");
/// ```
pub fn parse_form_data(form_data: &str) -> Result<SlackCommandEvent, String> {
    let mut map: HashMap<String, String> = HashMap::new();

    for pair in form_data.split('&') {
        if let Some(idx) = pair.find('=') {
            let key = decode_url_component(&pair[..idx])
                .map_err(|e| format!("Failed to decode key: {}", e))?;

            let value = decode_url_component(&pair[idx + 1..])
                .map_err(|e| format!("Failed to decode value: {}", e))?;

            map.insert(key, value);
        }
    }

    let event = SlackCommandEvent {
        token: map.get("token").cloned().unwrap_or_default(),
        team_id: map.get("team_id").cloned().unwrap_or_default(),
        channel_id: map.get("channel_id").cloned().unwrap_or_default(),
        channel_name: map.get("channel_name").cloned().unwrap_or_default(),
        user_id: map.get("user_id").cloned().unwrap_or_default(),
        user_name: map.get("user_name").cloned().unwrap_or_default(),
        command: map.get("command").cloned().unwrap_or_default(),
        text: map.get("text").cloned().unwrap_or_default(),
        response_url: map.get("response_url").cloned().unwrap_or_default(),
        trigger_id: map.get("trigger_id").cloned().unwrap_or_default(),
    };

    Ok(event)
}

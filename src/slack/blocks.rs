//! Block Kit builders: the broadcast message itself plus the Draft/Review
//! modal views. All pure `serde_json` construction, no I/O.

use chrono::Utc;
use serde_json::{Value, json};

/// Slack rejects header blocks longer than 150 characters.
const HEADER_MAX_CHARS: usize = 150;

/// Render the broadcast message. Called once per job; the result is reused
/// for every recipient.
#[must_use]
pub fn build_broadcast_blocks(
    title: &str,
    body: &str,
    category: &str,
    sender_name: &str,
    link: Option<&str>,
) -> Value {
    let ts = Utc::now().format("%b %d, %Y • %H:%M UTC").to_string();
    let header_text: String = format!("{category}: {title}")
        .chars()
        .take(HEADER_MAX_CHARS)
        .collect();

    let mut blocks = vec![
        json!({
            "type": "header",
            "text": { "type": "plain_text", "text": header_text }
        }),
        json!({
            "type": "context",
            "elements": [
                { "type": "mrkdwn", "text": format!("*Sent by:* {sender_name}") },
                { "type": "mrkdwn", "text": format!("*Time:* {ts}") }
            ]
        }),
        json!({ "type": "divider" }),
        json!({
            "type": "section",
            "text": { "type": "mrkdwn", "text": body }
        }),
    ];

    if let Some(link) = link {
        blocks.push(json!({ "type": "divider" }));
        blocks.push(json!({
            "type": "actions",
            "elements": [
                {
                    "type": "button",
                    "text": { "type": "plain_text", "text": "Open link" },
                    "url": link
                }
            ]
        }));
    }

    Value::Array(blocks)
}

/// Draft modal shown when a user runs `/broadcast`.
#[must_use]
pub fn draft_modal_view(private_metadata: &str) -> Value {
    json!({
        "type": "modal",
        "callback_id": "broadcast_draft_submit",
        "private_metadata": private_metadata,
        "title": { "type": "plain_text", "text": "Partner Broadcast" },
        "submit": { "type": "plain_text", "text": "Review" },
        "close": { "type": "plain_text", "text": "Cancel" },
        "blocks": [
            {
                "type": "input",
                "block_id": "title_block",
                "label": { "type": "plain_text", "text": "Title" },
                "element": { "type": "plain_text_input", "action_id": "title_input", "max_length": 120 },
                "optional": true
            },
            {
                "type": "input",
                "block_id": "category_block",
                "label": { "type": "plain_text", "text": "Category" },
                "element": {
                    "type": "static_select",
                    "action_id": "category_select",
                    "options": [
                        { "text": { "type": "plain_text", "text": "Release" }, "value": "Release" },
                        { "text": { "type": "plain_text", "text": "Incident" }, "value": "Incident" },
                        { "text": { "type": "plain_text", "text": "Action required" }, "value": "Action required" },
                        { "text": { "type": "plain_text", "text": "FYI" }, "value": "FYI" }
                    ],
                    "initial_option": { "text": { "type": "plain_text", "text": "Release" }, "value": "Release" }
                }
            },
            {
                "type": "input",
                "block_id": "body_block",
                "label": { "type": "plain_text", "text": "Message" },
                "element": { "type": "plain_text_input", "action_id": "body_input", "multiline": true }
            },
            {
                "type": "input",
                "block_id": "link_block",
                "label": { "type": "plain_text", "text": "Optional link" },
                "element": { "type": "plain_text_input", "action_id": "link_input" },
                "optional": true
            },
            {
                "type": "context",
                "elements": [
                    { "type": "mrkdwn", "text": "Next: you’ll review exactly what partners will see before sending." }
                ]
            }
        ]
    })
}

/// Review modal shown after the draft is submitted; embeds the rendered
/// preview between Edit and Send buttons.
///
/// # Panics
///
/// Panics if `preview_blocks` is not a JSON array. `build_broadcast_blocks`
/// always returns one, so this indicates an internal programming error.
#[must_use]
pub fn review_modal_view(
    private_metadata: &str,
    preview_blocks: &Value,
    channel_count: usize,
) -> Value {
    let mut blocks = vec![
        json!({
            "type": "section",
            "text": { "type": "mrkdwn", "text": format!("*Ready to send to* *{channel_count}* *channel(s).*") }
        }),
        json!({ "type": "divider" }),
    ];
    blocks.extend(
        preview_blocks
            .as_array()
            .expect("preview blocks must be an array")
            .iter()
            .cloned(),
    );
    blocks.push(json!({ "type": "divider" }));
    blocks.push(json!({
        "type": "actions",
        "elements": [
            {
                "type": "button",
                "action_id": "edit_draft",
                "text": { "type": "plain_text", "text": "Edit" },
                "style": "secondary"
            },
            {
                "type": "button",
                "action_id": "send_broadcast",
                "text": { "type": "plain_text", "text": "Send" },
                "style": "primary"
            }
        ]
    }));

    json!({
        "type": "modal",
        "callback_id": "broadcast_review",
        "private_metadata": private_metadata,
        "title": { "type": "plain_text", "text": "Review Broadcast" },
        "close": { "type": "plain_text", "text": "Cancel" },
        "blocks": blocks
    })
}

/// Single-section replacement modal for terminal interaction states
/// (cooldown active, draft expired).
#[must_use]
pub fn notice_modal_view(title: &str, text: &str) -> Value {
    json!({
        "type": "modal",
        "title": { "type": "plain_text", "text": title },
        "close": { "type": "plain_text", "text": "Close" },
        "blocks": [
            { "type": "section", "text": { "type": "mrkdwn", "text": text } }
        ]
    })
}

/// Confirmation modal shown the moment a broadcast is queued.
#[must_use]
pub fn sending_modal_view() -> Value {
    json!({
        "type": "modal",
        "title": { "type": "plain_text", "text": "Sending ✅" },
        "close": { "type": "plain_text", "text": "Close" },
        "blocks": [
            { "type": "section", "text": { "type": "mrkdwn", "text": "Broadcast started. I’ll DM you when it finishes." } },
            { "type": "context", "elements": [
                { "type": "mrkdwn", "text": "If you don’t receive a DM, check the worker logs." }
            ]}
        ]
    })
}

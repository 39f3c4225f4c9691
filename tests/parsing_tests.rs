use megaphone::api::parsing::{
    extract_draft, get_header_value, is_interactive_body, parse_interactive_payload, v_str,
};
use megaphone::slack::command_parser::parse_form_data;
use serde_json::json;

#[test]
fn extract_draft_reads_all_fields() {
    let state = json!({
        "values": {
            "title_block": { "title_input": { "value": "  v2 released  " } },
            "category_block": { "category_select": { "selected_option": { "value": "Incident" } } },
            "body_block": { "body_input": { "value": "See changelog" } },
            "link_block": { "link_input": { "value": " https://x/y " } }
        }
    });

    let draft = extract_draft(&state);
    assert_eq!(draft.title, "v2 released");
    assert_eq!(draft.category, "Incident");
    assert_eq!(draft.body, "See changelog");
    assert_eq!(draft.link.as_deref(), Some("https://x/y"));
}

#[test]
fn extract_draft_never_fails_on_missing_fields() {
    let draft = extract_draft(&json!({}));
    assert_eq!(draft.title, "");
    assert_eq!(draft.category, "Release");
    assert_eq!(draft.body, "");
    assert_eq!(draft.link, None);

    // Link present but blank collapses to None
    let state = json!({
        "values": { "link_block": { "link_input": { "value": "   " } } }
    });
    assert_eq!(extract_draft(&state).link, None);
}

#[test]
fn interactive_body_detection() {
    assert!(is_interactive_body("payload=%7B%7D"));
    assert!(is_interactive_body("foo=bar&payload=%7B%7D"));
    assert!(!is_interactive_body("command=%2Fbroadcast&text=status"));
}

#[test]
fn interactive_payload_decoding() {
    let body = "payload=%7B%22type%22%3A%22block_actions%22%2C%22user%22%3A%7B%22id%22%3A%22U1%22%7D%7D";
    let payload = parse_interactive_payload(body).expect("parse");

    assert_eq!(payload["type"], "block_actions");
    assert_eq!(v_str(&payload, &["user", "id"]), Some("U1"));
}

#[test]
fn interactive_payload_missing_field_errors() {
    assert!(parse_interactive_payload("foo=bar").is_err());
}

#[test]
fn header_lookup_is_case_insensitive() {
    let headers = json!({ "x-slack-retry-num": "1" });
    assert_eq!(get_header_value(&headers, "X-Slack-Retry-Num"), Some("1"));
    assert_eq!(get_header_value(&headers, "X-Missing"), None);
}

#[test]
fn slash_command_form_body_parses() {
    let body = "token=t&team_id=T1&channel_id=C1&channel_name=general&\
                user_id=U1&user_name=alice&command=%2Fbroadcast&text=status&\
                response_url=https%3A%2F%2Fhooks.slack.com%2Fr&trigger_id=1.2";
    let event = parse_form_data(body).expect("parse");

    assert_eq!(event.command, "/broadcast");
    assert_eq!(event.user_id, "U1");
    assert_eq!(event.text, "status");
    assert_eq!(event.trigger_id, "1.2");
}

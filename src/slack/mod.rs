//! All Slack-specific functionality

pub mod blocks;
pub mod client;
pub mod command_parser;

// Re-export main types for convenience
pub use client::SlackClient;
pub use command_parser::{SlackCommandEvent, decode_url_component, parse_form_data};

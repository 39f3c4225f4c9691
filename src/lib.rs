/// Megaphone - a Slack bot that broadcasts one composed message to every
/// channel it has been invited to.
///
/// This crate implements a two-Lambda architecture:
/// 1. An API Lambda that verifies Slack requests, serves the `/broadcast`
///    slash command with its Draft/Review modals, and tracks channel
///    membership from Events API callbacks
/// 2. A Worker Lambda that drains exactly one queued broadcast job per
///    trigger and fans it out to every tracked channel
///
/// # Architecture
///
/// The system uses:
/// - AWS Lambda for serverless execution
/// - Upstash Redis (REST API) for the job queue, channel roster, draft
///   storage and per-user cooldowns
/// - slack-morphism for Slack API interactions
/// - Tokio for async runtime
// Module declarations
pub mod api;
pub mod core;
pub mod errors;
pub mod slack;
pub mod storage;
pub mod worker;

pub use errors::BotError;

/// Configure structured logging with JSON format for AWS Lambda environments.
///
/// This function sets up tracing-subscriber with a JSON formatter suitable for
/// `CloudWatch` Logs integration. It should be called at the start of each Lambda
/// handler.
pub fn setup_logging() {
    use tracing_subscriber::prelude::*;
    let fmt_layer = tracing_subscriber::fmt::layer().json().with_target(true);

    tracing_subscriber::registry().with(fmt_layer).init();
}

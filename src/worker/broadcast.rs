//! The broadcast core: drain exactly one queued job and fan it out to every
//! tracked channel, sequentially, with per-recipient rate-limit retry.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::core::models::{BroadcastJob, BroadcastSummary, DeliveryOutcome};
use crate::errors::BotError;
use crate::slack::blocks::build_broadcast_blocks;

/// Wait applied when a rate-limit reply carries no `Retry-After` hint.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);
/// Safety margin added on top of the server-indicated interval.
const RETRY_MARGIN: Duration = Duration::from_secs(1);

/// How many failure descriptors the submitter DM lists.
const DM_FAILURE_LIMIT: usize = 10;

/// Failure of a single delivery attempt, as classified by the transport.
#[derive(Debug, Clone)]
pub struct DeliveryError {
    pub code: String,
    pub retry_after: Option<Duration>,
}

impl DeliveryError {
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            retry_after: None,
        }
    }

    #[must_use]
    pub fn rate_limited(retry_after: Option<Duration>) -> Self {
        Self {
            code: "ratelimited".to_string(),
            retry_after,
        }
    }

    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        self.code == "ratelimited"
    }
}

/// The two shared resources the worker touches: it only ever pops the queue
/// and only ever reads the roster.
#[async_trait]
pub trait BroadcastStore {
    /// Atomically remove one job from the queue. Cross-invocation
    /// single-pop safety rests entirely on this being atomic.
    async fn pop_job(&self) -> Result<Option<String>, BotError>;

    /// One snapshot of the channel roster; membership changes mid-delivery
    /// are not reflected within a run.
    async fn tracked_channels(&self) -> Result<Vec<String>, BotError>;
}

/// Outbound messaging operations the worker needs.
#[async_trait]
pub trait MessageTransport {
    async fn post_broadcast(
        &self,
        channel: &str,
        text: &str,
        blocks: &Value,
    ) -> Result<(), DeliveryError>;

    async fn open_dm(&self, user_id: &str) -> Result<String, BotError>;

    async fn post_text(&self, channel: &str, text: &str) -> Result<(), BotError>;
}

/// Outcome of one worker invocation. Everything here is expected control
/// flow; only storage/config trouble surfaces as `BotError`.
#[derive(Debug)]
pub enum RunOutcome {
    /// Queue was empty; nothing touched.
    NoJob,
    /// Popped payload did not deserialize; job dropped.
    MalformedJob { detail: String },
    /// No channels tracked; job dropped without error.
    EmptyRoster,
    /// Roster exceeds the safety cap; nothing was sent, job dropped.
    CapExceeded { channels: usize, cap: usize },
    Completed(BroadcastSummary),
}

pub struct Broadcaster<'a, S, T> {
    store: &'a S,
    transport: &'a T,
    throttle: Duration,
    max_channels: usize,
}

impl<'a, S: BroadcastStore + Sync, T: MessageTransport + Sync> Broadcaster<'a, S, T> {
    #[must_use]
    pub fn new(store: &'a S, transport: &'a T, throttle: Duration, max_channels: usize) -> Self {
        Self {
            store,
            transport,
            throttle,
            max_channels,
        }
    }

    /// Process at most one queued job, to completion.
    ///
    /// # Errors
    ///
    /// Returns an error only when the store itself fails; every delivery
    /// failure is captured in the returned summary instead.
    pub async fn run_once(&self) -> Result<RunOutcome, BotError> {
        // Exactly one job per invocation keeps runtime bounded and lets the
        // trigger caller control throughput.
        let Some(raw) = self.store.pop_job().await? else {
            return Ok(RunOutcome::NoJob);
        };

        let job: BroadcastJob = match serde_json::from_str(&raw) {
            Ok(job) => job,
            Err(e) => {
                // Drop-and-log: the pop already consumed the payload and
                // there is no dead-letter queue to park it in.
                error!("Dropping malformed job payload: {}", e);
                return Ok(RunOutcome::MalformedJob {
                    detail: e.to_string(),
                });
            }
        };

        let mut channels = self.store.tracked_channels().await?;
        channels.sort();
        channels.dedup();

        if channels.is_empty() {
            info!("No channels tracked; dropping job from {}", job.queued_by);
            return Ok(RunOutcome::EmptyRoster);
        }

        if channels.len() > self.max_channels {
            error!(
                "Refusing broadcast: {} channels exceeds cap {}",
                channels.len(),
                self.max_channels
            );
            return Ok(RunOutcome::CapExceeded {
                channels: channels.len(),
                cap: self.max_channels,
            });
        }

        // Render once, reuse for every recipient.
        let sender = if job.queued_by.is_empty() {
            "Megaphone".to_string()
        } else {
            format!("<@{}>", job.queued_by)
        };
        let blocks = build_broadcast_blocks(
            job.display_title(),
            &job.body,
            job.display_category(),
            &sender,
            job.link.as_deref(),
        );
        let fallback = format!("{}: {}", job.display_category(), job.display_title());

        let mut outcomes = Vec::with_capacity(channels.len());
        for channel in &channels {
            outcomes.push(self.deliver_with_retry(channel, &fallback, &blocks).await);
            // Stay under the steady-state posting rate limit.
            sleep(self.throttle).await;
        }

        let summary = BroadcastSummary::from_outcomes(&outcomes);
        info!(
            sent = summary.sent,
            failed = summary.failed,
            channels = summary.channels,
            "Broadcast delivered"
        );

        if !job.queued_by.is_empty() {
            self.notify_submitter(&job.queued_by, &summary).await;
        }

        Ok(RunOutcome::Completed(summary))
    }

    /// One delivery attempt, with exactly one retry on a rate-limit reply.
    async fn deliver_with_retry(&self, channel: &str, text: &str, blocks: &Value) -> DeliveryOutcome {
        match self.transport.post_broadcast(channel, text, blocks).await {
            Ok(()) => DeliveryOutcome {
                channel: channel.to_string(),
                success: true,
                error: None,
            },
            Err(e) if e.is_rate_limited() => {
                let wait = e.retry_after.unwrap_or(DEFAULT_RETRY_AFTER) + RETRY_MARGIN;
                warn!("Rate limited posting to {}; retrying in {:?}", channel, wait);
                sleep(wait).await;

                match self.transport.post_broadcast(channel, text, blocks).await {
                    Ok(()) => DeliveryOutcome {
                        channel: channel.to_string(),
                        success: true,
                        error: None,
                    },
                    Err(e2) => DeliveryOutcome {
                        channel: channel.to_string(),
                        success: false,
                        error: Some(e2.code),
                    },
                }
            }
            Err(e) => DeliveryOutcome {
                channel: channel.to_string(),
                success: false,
                error: Some(e.code),
            },
        }
    }

    /// DM the submitter a delivery summary. Best effort: a missed summary
    /// must not fail the run, so every error lands in the log and nowhere
    /// else.
    async fn notify_submitter(&self, user_id: &str, summary: &BroadcastSummary) {
        let message = summary_message(summary);

        let result = async {
            let dm_channel = self.transport.open_dm(user_id).await?;
            self.transport.post_text(&dm_channel, &message).await
        }
        .await;

        if let Err(e) = result {
            warn!("Failed to DM broadcast summary to {}: {}", user_id, e);
        }
    }
}

/// Text of the submitter summary DM.
#[must_use]
pub fn summary_message(summary: &BroadcastSummary) -> String {
    let mut message = format!(
        "✅ Broadcast complete. Sent to {}/{} channels.",
        summary.sent, summary.channels
    );
    if !summary.failures.is_empty() {
        let listed: Vec<&str> = summary
            .failures
            .iter()
            .take(DM_FAILURE_LIMIT)
            .map(String::as_str)
            .collect();
        message.push_str(&format!(
            " Failed: {} (first {}): {}",
            summary.failures.len(),
            DM_FAILURE_LIMIT,
            listed.join(", ")
        ));
    }
    message
}

//! Typed facade over the KV store for the bot's four keyspaces: the job
//! queue, the channel roster, drafts and per-user cooldowns.

use async_trait::async_trait;
use chrono::Utc;

use super::kv::KvClient;
use crate::core::models::{BroadcastJob, Draft};
use crate::errors::BotError;
use crate::worker::broadcast::BroadcastStore;

const CHANNEL_SET_KEY: &str = "megaphone:channels";
const JOB_LIST_KEY: &str = "megaphone:jobs";

const DRAFT_TTL_SECONDS: u64 = 60 * 60;

fn cooldown_key(user_id: &str) -> String {
    format!("megaphone:cooldown:{user_id}")
}

fn draft_key(draft_id: &str) -> String {
    format!("megaphone:draft:{draft_id}")
}

pub struct BotStore {
    kv: KvClient,
    cooldown_seconds: u64,
}

impl BotStore {
    #[must_use]
    pub fn new(kv: KvClient, cooldown_seconds: u64) -> Self {
        Self {
            kv,
            cooldown_seconds,
        }
    }

    // --- Job queue ---

    /// # Errors
    ///
    /// Returns an error if the job cannot be serialized or pushed.
    pub async fn push_job(&self, job: &BroadcastJob) -> Result<(), BotError> {
        let serialized = serde_json::to_string(job)
            .map_err(|e| BotError::StorageError(format!("Failed to serialize job: {e}")))?;
        self.kv.lpush(JOB_LIST_KEY, &serialized).await
    }

    // --- Channel roster ---

    pub async fn track_channel(&self, channel_id: &str) -> Result<(), BotError> {
        self.kv.sadd(CHANNEL_SET_KEY, channel_id).await
    }

    pub async fn untrack_channel(&self, channel_id: &str) -> Result<(), BotError> {
        self.kv.srem(CHANNEL_SET_KEY, channel_id).await
    }

    pub async fn channel_count(&self) -> Result<usize, BotError> {
        Ok(self.kv.smembers(CHANNEL_SET_KEY).await?.len())
    }

    // --- Cooldowns ---

    /// Whether the user is still inside the submission cooldown window.
    /// A zero-second cooldown disables throttling entirely.
    pub async fn cooldown_active(&self, user_id: &str) -> Result<bool, BotError> {
        if self.cooldown_seconds == 0 {
            return Ok(false);
        }
        Ok(self.kv.get(&cooldown_key(user_id)).await?.is_some())
    }

    pub async fn start_cooldown(&self, user_id: &str) {
        if self.cooldown_seconds == 0 {
            return;
        }
        let now = Utc::now().timestamp().to_string();
        self.kv
            .set_ex_best_effort(&cooldown_key(user_id), &now, self.cooldown_seconds)
            .await;
    }

    // --- Drafts ---

    pub async fn save_draft(&self, draft_id: &str, draft: &Draft) -> Result<(), BotError> {
        let serialized = serde_json::to_string(draft)
            .map_err(|e| BotError::StorageError(format!("Failed to serialize draft: {e}")))?;
        self.kv
            .set_ex(&draft_key(draft_id), &serialized, DRAFT_TTL_SECONDS)
            .await
    }

    /// Returns `None` when the draft is missing or expired. A draft that is
    /// present but unparseable is treated as expired rather than an error.
    pub async fn load_draft(&self, draft_id: &str) -> Result<Option<Draft>, BotError> {
        let Some(raw) = self.kv.get(&draft_key(draft_id)).await? else {
            return Ok(None);
        };
        Ok(serde_json::from_str(&raw).ok())
    }
}

#[async_trait]
impl BroadcastStore for BotStore {
    async fn pop_job(&self) -> Result<Option<String>, BotError> {
        self.kv.rpop(JOB_LIST_KEY).await
    }

    async fn tracked_channels(&self) -> Result<Vec<String>, BotError> {
        self.kv.smembers(CHANNEL_SET_KEY).await
    }
}

//! Minimal Upstash Redis REST client.
//!
//! Each command is an HTTP POST of a JSON array (`["RPOP", "key"]`) with a
//! bearer token; the reply is `{"result": ...}` or `{"error": "..."}`.

use once_cell::sync::Lazy;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tokio_retry::strategy::jitter;
use tokio_retry::{Retry, strategy::ExponentialBackoff};
use tracing::error;

use crate::errors::BotError;

static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .expect("Failed to create HTTP client")
});

pub struct KvClient {
    base_url: String,
    token: String,
}

impl KvClient {
    #[must_use]
    pub fn new(base_url: String, token: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Run a single Redis command and return its `result` field.
    ///
    /// # Errors
    ///
    /// Returns `BotError::StorageError` if the HTTP call fails or the store
    /// reports a command error.
    pub async fn command(&self, cmd: &[&str]) -> Result<Value, BotError> {
        let resp = HTTP_CLIENT
            .post(&self.base_url)
            .bearer_auth(&self.token)
            .json(&cmd)
            .send()
            .await
            .map_err(|e| BotError::StorageError(format!("KV request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(BotError::StorageError(format!(
                "KV HTTP {}",
                resp.status()
            )));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| BotError::StorageError(format!("KV response parse: {e}")))?;

        if let Some(err) = body.get("error").and_then(|e| e.as_str()) {
            return Err(BotError::StorageError(format!("KV command error: {err}")));
        }

        Ok(body.get("result").cloned().unwrap_or(Value::Null))
    }

    /// Read-only commands are retried on transient failures. Destructive
    /// commands (RPOP in particular) must never go through this path: a
    /// retried pop could drop a job on a lost response.
    async fn read_command(&self, cmd: &[&str]) -> Result<Value, BotError> {
        let strategy = ExponentialBackoff::from_millis(100).map(jitter).take(3);

        Retry::spawn(strategy, || self.command(cmd)).await
    }

    /// Atomically pop one element from the tail of a list.
    pub async fn rpop(&self, key: &str) -> Result<Option<String>, BotError> {
        let result = self.command(&["RPOP", key]).await?;
        Ok(result.as_str().map(ToString::to_string))
    }

    pub async fn lpush(&self, key: &str, value: &str) -> Result<(), BotError> {
        self.command(&["LPUSH", key, value]).await?;
        Ok(())
    }

    pub async fn smembers(&self, key: &str) -> Result<Vec<String>, BotError> {
        let result = self.read_command(&["SMEMBERS", key]).await?;
        let members = result
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str())
                    .map(ToString::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Ok(members)
    }

    pub async fn sadd(&self, key: &str, member: &str) -> Result<(), BotError> {
        self.command(&["SADD", key, member]).await?;
        Ok(())
    }

    pub async fn srem(&self, key: &str, member: &str) -> Result<(), BotError> {
        self.command(&["SREM", key, member]).await?;
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, BotError> {
        let result = self.read_command(&["GET", key]).await?;
        Ok(result.as_str().map(ToString::to_string))
    }

    pub async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), BotError> {
        let ttl = ttl_seconds.to_string();
        self.command(&["SET", key, value, "EX", &ttl]).await?;
        Ok(())
    }

    /// Best-effort variant for paths where a write failure should not abort
    /// the interaction (e.g. setting a cooldown after the job is queued).
    pub async fn set_ex_best_effort(&self, key: &str, value: &str, ttl_seconds: u64) {
        if let Err(e) = self.set_ex(key, value, ttl_seconds).await {
            error!("KV SET {} failed: {}", key, e);
        }
    }
}

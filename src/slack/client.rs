//! Slack API client module
//!
//! Encapsulates all Slack API interactions with retry logic and error
//! handling. Block Kit payloads go through the Web API directly (reqwest);
//! plain-text messaging and IM opening go through slack-morphism.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::Client;
use serde_json::{Value, json};
use slack_morphism::hyper_tokio::{SlackClientHyperConnector, SlackHyperClient};
use slack_morphism::prelude::*;
use slack_morphism::{SlackApiToken, SlackApiTokenValue, SlackChannelId, SlackMessageContent, SlackUserId};
use std::time::Duration;
use tokio_retry::strategy::jitter;
use tokio_retry::{Retry, strategy::ExponentialBackoff};

use crate::errors::BotError;
use crate::worker::broadcast::{DeliveryError, MessageTransport};

static SLACK_CLIENT: Lazy<SlackHyperClient> = Lazy::new(|| {
    SlackHyperClient::new(
        SlackClientHyperConnector::new().expect("Failed to create Slack client connector"),
    )
});

static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .expect("Failed to create HTTP client")
});

/// Slack API client with retry logic and error handling
pub struct SlackClient {
    token: SlackApiToken,
}

impl SlackClient {
    #[must_use]
    pub fn new(token: String) -> Self {
        Self {
            token: SlackApiToken::new(SlackApiTokenValue::new(token)),
        }
    }

    async fn with_retry<F, Fut, T>(&self, operation: F) -> Result<T, BotError>
    where
        F: FnMut() -> Fut + Send,
        Fut: std::future::Future<Output = Result<T, BotError>> + Send,
        T: Send,
    {
        let strategy = ExponentialBackoff::from_millis(100).map(jitter).take(5);

        Retry::spawn(strategy, operation).await
    }

    /// Open (or reuse) the IM channel with a user.
    ///
    /// # Errors
    ///
    /// Returns an error if `conversations.open` fails after retries.
    pub async fn get_user_im_channel(&self, user_id: &str) -> Result<String, BotError> {
        self.with_retry(|| async {
            let session = SLACK_CLIENT.open_session(&self.token);
            let open_req = SlackApiConversationsOpenRequest::new()
                .with_users(vec![SlackUserId(user_id.to_string())]);

            let result = session.conversations_open(&open_req).await?;
            let channel_id = result.channel.id.0;
            Ok(channel_id)
        })
        .await
    }

    /// Post a plain-text message.
    ///
    /// # Errors
    ///
    /// Returns an error if `chat.postMessage` fails after retries.
    pub async fn post_message(&self, channel_id: &str, message: &str) -> Result<(), BotError> {
        self.with_retry(|| async {
            let session = SLACK_CLIENT.open_session(&self.token);

            let post_req = SlackApiChatPostMessageRequest::new(
                SlackChannelId(channel_id.to_string()),
                SlackMessageContent::new().with_text(message.to_string()),
            );

            session.chat_post_message(&post_req).await?;

            Ok(())
        })
        .await
    }

    /// Post a Block Kit message with a plain-text fallback.
    ///
    /// Deliberately retry-free: the broadcast worker owns its own retry
    /// policy (exactly one retry, rate-limit only), so this reports every
    /// failure as-is with a Slack error code and an optional Retry-After.
    ///
    /// # Errors
    ///
    /// Returns a classified `DeliveryError` on any HTTP or API failure.
    pub async fn post_blocks(
        &self,
        channel_id: &str,
        text: &str,
        blocks: &Value,
    ) -> Result<(), DeliveryError> {
        let payload = json!({
            "channel": channel_id,
            "text": text,
            "blocks": blocks
        });

        let resp = HTTP_CLIENT
            .post("https://slack.com/api/chat.postMessage")
            .bearer_auth(&self.token.token_value.0)
            .json(&payload)
            .send()
            .await
            .map_err(|e| DeliveryError::new(format!("http_error: {e}")))?;

        let retry_after = resp
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs);

        if resp.status().as_u16() == 429 {
            return Err(DeliveryError::rate_limited(retry_after));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| DeliveryError::new(format!("http_error: {e}")))?;

        if body.get("ok").and_then(|v| v.as_bool()).unwrap_or(false) {
            return Ok(());
        }

        let code = body
            .get("error")
            .and_then(|e| e.as_str())
            .unwrap_or("unknown_error");
        if code == "ratelimited" {
            Err(DeliveryError::rate_limited(retry_after))
        } else {
            Err(DeliveryError::new(code))
        }
    }

    /// Opens a Block Kit modal using Slack's `views.open` API.
    ///
    /// # Errors
    ///
    /// Returns an error if the Slack API call fails.
    pub async fn open_modal(&self, trigger_id: &str, view: &Value) -> Result<(), BotError> {
        let payload = json!({
            "trigger_id": trigger_id,
            "view": view
        });

        self.call_views_api("views.open", &payload).await
    }

    /// Replaces an open modal using Slack's `views.update` API.
    ///
    /// # Errors
    ///
    /// Returns an error if the Slack API call fails.
    pub async fn update_modal(
        &self,
        view_id: &str,
        hash: Option<&str>,
        view: &Value,
    ) -> Result<(), BotError> {
        let mut payload = json!({
            "view_id": view_id,
            "view": view
        });
        if let Some(hash) = hash {
            payload["hash"] = Value::String(hash.to_string());
        }

        self.call_views_api("views.update", &payload).await
    }

    async fn call_views_api(&self, method: &str, payload: &Value) -> Result<(), BotError> {
        let resp = HTTP_CLIENT
            .post(format!("https://slack.com/api/{method}"))
            .bearer_auth(&self.token.token_value.0)
            .json(payload)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(BotError::ApiError(format!("{method} HTTP {}", resp.status())));
        }

        let json: Value = resp.json().await?;
        if json.get("ok").and_then(|v| v.as_bool()).unwrap_or(false) {
            Ok(())
        } else {
            Err(BotError::ApiError(format!(
                "{method} error: {}",
                json.get("error").and_then(|e| e.as_str()).unwrap_or("unknown")
            )))
        }
    }
}

#[async_trait]
impl MessageTransport for SlackClient {
    async fn post_broadcast(
        &self,
        channel: &str,
        text: &str,
        blocks: &Value,
    ) -> Result<(), DeliveryError> {
        self.post_blocks(channel, text, blocks).await
    }

    async fn open_dm(&self, user_id: &str) -> Result<String, BotError> {
        self.get_user_im_channel(user_id).await
    }

    async fn post_text(&self, channel: &str, text: &str) -> Result<(), BotError> {
        self.post_message(channel, text).await
    }
}

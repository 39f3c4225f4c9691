use std::collections::HashSet;
use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub slack_bot_token: String,
    pub slack_signing_secret: String,
    pub slack_bot_user_id: String,
    pub worker_secret: String,
    pub kv_rest_api_url: String,
    pub kv_rest_api_token: String,
    pub public_base_url: String,
    pub post_throttle_ms: u64,
    pub max_broadcast_channels: usize,
    pub broadcast_cooldown_seconds: u64,
    pub allowed_broadcasters: HashSet<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            slack_bot_token: env::var("SLACK_BOT_TOKEN")
                .map_err(|e| format!("SLACK_BOT_TOKEN: {}", e))?,
            slack_signing_secret: env::var("SLACK_SIGNING_SECRET")
                .map_err(|e| format!("SLACK_SIGNING_SECRET: {}", e))?,
            slack_bot_user_id: env::var("SLACK_BOT_USER_ID")
                .map_err(|e| format!("SLACK_BOT_USER_ID: {}", e))?,
            worker_secret: env::var("WORKER_SECRET")
                .map_err(|e| format!("WORKER_SECRET: {}", e))?,
            // Vercel KV exposes KV_*; older deployments use STORAGE_KV_* aliases
            kv_rest_api_url: env::var("KV_REST_API_URL")
                .or_else(|_| env::var("STORAGE_KV_REST_API_URL"))
                .map_err(|e| format!("KV_REST_API_URL: {}", e))?,
            kv_rest_api_token: env::var("KV_REST_API_TOKEN")
                .or_else(|_| env::var("STORAGE_KV_REST_API_TOKEN"))
                .map_err(|e| format!("KV_REST_API_TOKEN: {}", e))?,
            public_base_url: env::var("PUBLIC_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .map_err(|e| format!("PUBLIC_BASE_URL: {}", e))?,
            post_throttle_ms: env::var("POST_THROTTLE_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(200),
            max_broadcast_channels: env::var("MAX_BROADCAST_CHANNELS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(500),
            broadcast_cooldown_seconds: env::var("BROADCAST_COOLDOWN_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            allowed_broadcasters: parse_allowlist(
                &env::var("ALLOWED_BROADCASTERS").unwrap_or_default(),
            ),
        })
    }

    /// An empty allowlist admits everyone.
    #[must_use]
    pub fn user_allowed(&self, user_id: &str) -> bool {
        self.allowed_broadcasters.is_empty() || self.allowed_broadcasters.contains(user_id)
    }
}

fn parse_allowlist(raw: &str) -> HashSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

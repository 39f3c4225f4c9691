use serde::{Deserialize, Serialize};

/// One queued request to broadcast a single composed message to every
/// tracked channel. Immutable once queued; destroyed when popped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastJob {
    pub queued_at: i64,
    #[serde(default)]
    pub queued_by: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub link: Option<String>,
}

impl BroadcastJob {
    /// Header title with the same defaulting the review preview applies.
    #[must_use]
    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            "Partner Update"
        } else {
            &self.title
        }
    }

    #[must_use]
    pub fn display_category(&self) -> &str {
        if self.category.is_empty() {
            "Release"
        } else {
            &self.category
        }
    }
}

/// A composed-but-not-yet-queued message, held in the KV store between the
/// Review modal and the Send click.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Draft {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub link: Option<String>,
}

/// Result of attempting one send. In-memory only, for one worker run.
#[derive(Debug, Clone)]
pub struct DeliveryOutcome {
    pub channel: String,
    pub success: bool,
    pub error: Option<String>,
}

/// Aggregated delivery results for one drained job.
#[derive(Debug, Clone)]
pub struct BroadcastSummary {
    pub sent: usize,
    pub failed: usize,
    pub channels: usize,
    /// Failure descriptors formatted `"<channel> (<error code>)"`.
    pub failures: Vec<String>,
}

impl BroadcastSummary {
    #[must_use]
    pub fn from_outcomes(outcomes: &[DeliveryOutcome]) -> Self {
        let failures: Vec<String> = outcomes
            .iter()
            .filter(|o| !o.success)
            .map(|o| {
                format!(
                    "{} ({})",
                    o.channel,
                    o.error.as_deref().unwrap_or("unknown")
                )
            })
            .collect();

        Self {
            sent: outcomes.iter().filter(|o| o.success).count(),
            failed: failures.len(),
            channels: outcomes.len(),
            failures,
        }
    }
}

/// JSON body returned by the worker endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerReport {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channels: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkerReport {
    #[must_use]
    pub fn message(text: &str) -> Self {
        Self {
            ok: true,
            sent: None,
            failed: None,
            channels: None,
            message: Some(text.to_string()),
            error: None,
        }
    }

    #[must_use]
    pub fn error(text: &str) -> Self {
        Self {
            ok: false,
            sent: None,
            failed: None,
            channels: None,
            message: None,
            error: Some(text.to_string()),
        }
    }

    #[must_use]
    pub fn delivered(summary: &BroadcastSummary) -> Self {
        Self {
            ok: true,
            sent: Some(summary.sent),
            failed: Some(summary.failed),
            channels: Some(summary.channels),
            message: None,
            error: None,
        }
    }
}

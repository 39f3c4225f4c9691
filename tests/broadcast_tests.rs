use async_trait::async_trait;
use megaphone::core::models::BroadcastSummary;
use megaphone::errors::BotError;
use megaphone::worker::broadcast::{
    Broadcaster, BroadcastStore, DeliveryError, MessageTransport, RunOutcome, summary_message,
};
use serde_json::Value;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

// ============================================================================
// In-memory fakes
// ============================================================================

#[derive(Default)]
struct MemStore {
    jobs: Mutex<Vec<String>>,
    channels: Vec<String>,
}

impl MemStore {
    fn with_jobs(jobs: &[&str], channels: &[&str]) -> Self {
        Self {
            jobs: Mutex::new(jobs.iter().map(ToString::to_string).collect()),
            channels: channels.iter().map(ToString::to_string).collect(),
        }
    }

    fn queue_len(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }
}

#[async_trait]
impl BroadcastStore for MemStore {
    async fn pop_job(&self) -> Result<Option<String>, BotError> {
        Ok(self.jobs.lock().unwrap().pop())
    }

    async fn tracked_channels(&self) -> Result<Vec<String>, BotError> {
        Ok(self.channels.clone())
    }
}

#[derive(Default)]
struct FakeTransport {
    /// (channel, attempt instant) for every post_broadcast call.
    posts: Mutex<Vec<(String, Instant)>>,
    /// Scripted failures, consumed one per attempt per channel.
    failures: Mutex<HashMap<String, VecDeque<DeliveryError>>>,
    dms: Mutex<Vec<(String, String)>>,
    fail_dm_open: bool,
}

impl FakeTransport {
    fn failing(channel: &str, errors: Vec<DeliveryError>) -> Self {
        let mut failures = HashMap::new();
        failures.insert(channel.to_string(), errors.into_iter().collect());
        Self {
            failures: Mutex::new(failures),
            ..Default::default()
        }
    }

    fn posted_channels(&self) -> Vec<String> {
        self.posts.lock().unwrap().iter().map(|(c, _)| c.clone()).collect()
    }

    fn post_instants(&self) -> Vec<Instant> {
        self.posts.lock().unwrap().iter().map(|(_, t)| *t).collect()
    }

    fn dm_messages(&self) -> Vec<(String, String)> {
        self.dms.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageTransport for FakeTransport {
    async fn post_broadcast(
        &self,
        channel: &str,
        _text: &str,
        _blocks: &Value,
    ) -> Result<(), DeliveryError> {
        self.posts
            .lock()
            .unwrap()
            .push((channel.to_string(), Instant::now()));

        if let Some(queue) = self.failures.lock().unwrap().get_mut(channel) {
            if let Some(err) = queue.pop_front() {
                return Err(err);
            }
        }
        Ok(())
    }

    async fn open_dm(&self, user_id: &str) -> Result<String, BotError> {
        if self.fail_dm_open {
            return Err(BotError::ApiError("user_not_found".to_string()));
        }
        Ok(format!("D-{user_id}"))
    }

    async fn post_text(&self, channel: &str, text: &str) -> Result<(), BotError> {
        self.dms
            .lock()
            .unwrap()
            .push((channel.to_string(), text.to_string()));
        Ok(())
    }
}

fn broadcaster<'a>(
    store: &'a MemStore,
    transport: &'a FakeTransport,
    cap: usize,
) -> Broadcaster<'a, MemStore, FakeTransport> {
    Broadcaster::new(store, transport, Duration::ZERO, cap)
}

const JOB: &str = r#"{
    "queued_at": 1700000000,
    "queued_by": "U1",
    "title": "v2 released",
    "category": "Release",
    "body": "See changelog",
    "link": "https://x/y"
}"#;

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn empty_queue_is_an_idempotent_no_op() {
    let store = MemStore::with_jobs(&[], &["C1"]);
    let transport = FakeTransport::default();
    let worker = broadcaster(&store, &transport, 500);

    for _ in 0..2 {
        let outcome = worker.run_once().await.expect("run");
        assert!(matches!(outcome, RunOutcome::NoJob));
    }
    assert!(transport.posted_channels().is_empty());
    assert!(transport.dm_messages().is_empty());
}

#[tokio::test]
async fn one_job_per_invocation() {
    let store = MemStore::with_jobs(&[JOB, JOB], &["C1"]);
    let transport = FakeTransport::default();
    let worker = broadcaster(&store, &transport, 500);

    let outcome = worker.run_once().await.expect("run");
    assert!(matches!(outcome, RunOutcome::Completed(_)));
    assert_eq!(store.queue_len(), 1);
    assert_eq!(transport.posted_channels().len(), 1);
}

#[tokio::test]
async fn full_success_delivers_in_sorted_order_and_dms_submitter() {
    let store = MemStore::with_jobs(&[JOB], &["C3", "C1", "C2"]);
    let transport = FakeTransport::default();
    let worker = broadcaster(&store, &transport, 500);

    let outcome = worker.run_once().await.expect("run");
    let RunOutcome::Completed(summary) = outcome else {
        panic!("expected completion");
    };

    assert_eq!(summary.sent, 3);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.channels, 3);
    assert_eq!(transport.posted_channels(), vec!["C1", "C2", "C3"]);

    let dms = transport.dm_messages();
    assert_eq!(dms.len(), 1);
    assert_eq!(dms[0].0, "D-U1");
    assert!(dms[0].1.contains("Sent to 3/3 channels."));
}

#[tokio::test]
async fn roster_snapshot_is_deduplicated() {
    let store = MemStore::with_jobs(&[JOB], &["C2", "C1", "C2", "C1"]);
    let transport = FakeTransport::default();
    let worker = broadcaster(&store, &transport, 500);

    let RunOutcome::Completed(summary) = worker.run_once().await.expect("run") else {
        panic!("expected completion");
    };
    assert_eq!(summary.channels, 2);
    assert_eq!(transport.posted_channels(), vec!["C1", "C2"]);
}

#[tokio::test]
async fn cap_exceeded_sends_nothing_and_drops_the_job() {
    let channels: Vec<String> = (0..501).map(|i| format!("C{i:04}")).collect();
    let channel_refs: Vec<&str> = channels.iter().map(String::as_str).collect();
    let store = MemStore::with_jobs(&[JOB], &channel_refs);
    let transport = FakeTransport::default();
    let worker = broadcaster(&store, &transport, 500);

    let outcome = worker.run_once().await.expect("run");
    let RunOutcome::CapExceeded { channels, cap } = outcome else {
        panic!("expected cap refusal");
    };
    assert_eq!(channels, 501);
    assert_eq!(cap, 500);

    // Nothing sent, and the job is gone (not requeued).
    assert!(transport.posted_channels().is_empty());
    assert_eq!(store.queue_len(), 0);
}

#[tokio::test]
async fn empty_roster_drops_the_job_without_error() {
    let store = MemStore::with_jobs(&[JOB], &[]);
    let transport = FakeTransport::default();
    let worker = broadcaster(&store, &transport, 500);

    let outcome = worker.run_once().await.expect("run");
    assert!(matches!(outcome, RunOutcome::EmptyRoster));
    assert_eq!(store.queue_len(), 0);
    assert!(transport.posted_channels().is_empty());
}

#[tokio::test]
async fn malformed_job_is_dropped() {
    let store = MemStore::with_jobs(&["{not json"], &["C1"]);
    let transport = FakeTransport::default();
    let worker = broadcaster(&store, &transport, 500);

    let outcome = worker.run_once().await.expect("run");
    assert!(matches!(outcome, RunOutcome::MalformedJob { .. }));
    assert_eq!(store.queue_len(), 0);
    assert!(transport.posted_channels().is_empty());
}

#[tokio::test(start_paused = true)]
async fn rate_limit_retries_once_after_the_indicated_interval() {
    let store = MemStore::with_jobs(&[JOB], &["C1"]);
    let transport = FakeTransport::failing(
        "C1",
        vec![DeliveryError::rate_limited(Some(Duration::from_secs(3)))],
    );
    let worker = broadcaster(&store, &transport, 500);

    let RunOutcome::Completed(summary) = worker.run_once().await.expect("run") else {
        panic!("expected completion");
    };
    assert_eq!(summary.sent, 1);
    assert_eq!(summary.failed, 0);

    let instants = transport.post_instants();
    assert_eq!(instants.len(), 2, "exactly one retry");
    // Indicated 3s plus the 1s safety margin.
    assert!(instants[1] - instants[0] >= Duration::from_secs(4));
}

#[tokio::test(start_paused = true)]
async fn rate_limit_without_hint_waits_the_default_interval() {
    let store = MemStore::with_jobs(&[JOB], &["C1"]);
    let transport = FakeTransport::failing("C1", vec![DeliveryError::rate_limited(None)]);
    let worker = broadcaster(&store, &transport, 500);

    let RunOutcome::Completed(summary) = worker.run_once().await.expect("run") else {
        panic!("expected completion");
    };
    assert_eq!(summary.sent, 1);

    let instants = transport.post_instants();
    assert_eq!(instants.len(), 2);
    assert!(instants[1] - instants[0] >= Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn failed_retry_counts_as_failed_and_is_not_retried_again() {
    let store = MemStore::with_jobs(&[JOB], &["C1", "C2"]);
    let transport = FakeTransport::failing(
        "C1",
        vec![
            DeliveryError::rate_limited(Some(Duration::from_secs(1))),
            DeliveryError::rate_limited(None),
        ],
    );
    let worker = broadcaster(&store, &transport, 500);

    let RunOutcome::Completed(summary) = worker.run_once().await.expect("run") else {
        panic!("expected completion");
    };
    assert_eq!(summary.sent, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.failures, vec!["C1 (ratelimited)"]);

    // Two attempts on C1, one on C2.
    assert_eq!(transport.posted_channels(), vec!["C1", "C1", "C2"]);
}

#[tokio::test]
async fn non_rate_limit_errors_are_not_retried() {
    let store = MemStore::with_jobs(&[JOB], &["C1", "C2"]);
    let transport = FakeTransport::failing("C1", vec![DeliveryError::new("channel_not_found")]);
    let worker = broadcaster(&store, &transport, 500);

    let RunOutcome::Completed(summary) = worker.run_once().await.expect("run") else {
        panic!("expected completion");
    };
    assert_eq!(summary.sent, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.failures, vec!["C1 (channel_not_found)"]);
    assert_eq!(transport.posted_channels(), vec!["C1", "C2"]);

    let dms = transport.dm_messages();
    assert!(dms[0].1.contains("Sent to 1/2 channels."));
    assert!(dms[0].1.contains("C1 (channel_not_found)"));
}

#[tokio::test]
async fn summary_dm_failure_is_swallowed() {
    let store = MemStore::with_jobs(&[JOB], &["C1"]);
    let transport = FakeTransport {
        fail_dm_open: true,
        ..Default::default()
    };
    let worker = broadcaster(&store, &transport, 500);

    let outcome = worker.run_once().await.expect("run must not fail on DM error");
    let RunOutcome::Completed(summary) = outcome else {
        panic!("expected completion");
    };
    assert_eq!(summary.sent, 1);
    assert!(transport.dm_messages().is_empty());
}

#[tokio::test]
async fn job_without_submitter_sends_no_dm() {
    let job = r#"{"queued_at": 1, "title": "t", "category": "FYI", "body": "b"}"#;
    let store = MemStore::with_jobs(&[job], &["C1"]);
    let transport = FakeTransport::default();
    let worker = broadcaster(&store, &transport, 500);

    let outcome = worker.run_once().await.expect("run");
    assert!(matches!(outcome, RunOutcome::Completed(_)));
    assert!(transport.dm_messages().is_empty());
}

#[test]
fn summary_message_lists_at_most_ten_failures() {
    let failures: Vec<String> = (0..12).map(|i| format!("C{i:02} (fatal)")).collect();
    let summary = BroadcastSummary {
        sent: 0,
        failed: 12,
        channels: 12,
        failures,
    };

    let message = summary_message(&summary);
    assert!(message.contains("Sent to 0/12 channels."));
    assert!(message.contains("Failed: 12 (first 10):"));
    assert!(message.contains("C09 (fatal)"));
    assert!(!message.contains("C10 (fatal)"));
}

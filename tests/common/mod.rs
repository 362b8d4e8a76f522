//! Test doubles and builders shared by the integration tests.
//!
//! Provides a scripted [`MockTransport`], recording automation/queue doubles,
//! and a fully wired [`Harness`] over the in-memory store.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use warden::config::{ModerationConfig, ServerEntry, UpstreamConfig};
use warden::dispatch::CommandDispatcher;
use warden::gateway::{AlertSink, ApiRequest, ApiResponse, Gateway, UpstreamTransport};
use warden::hooks::{
    AutomationHook, MessageQueue, NoopRaidDetector, OutboundMessage, RaidDetector,
    StaticEntitlements,
};
use warden::ingest::{IngestPipeline, RaidFilter};
use warden::store::MemoryStore;
use warden::Result;

/// Transport double serving scripted responses per path.
///
/// Responses are consumed in order; a path with no script left answers 200
/// with an empty JSON array. Requests and peak concurrency are recorded.
pub struct MockTransport {
    scripted: Mutex<HashMap<&'static str, VecDeque<Result<ApiResponse>>>>,
    calls: Mutex<Vec<ApiRequest>>,
    /// How long each request is held open, to surface overlapping calls.
    hold: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            scripted: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            hold: None,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Hold each request open for `hold` before answering.
    pub fn with_hold(mut self, hold: Duration) -> Self {
        self.hold = Some(hold);
        self
    }

    /// Queue the next response for `path`.
    pub fn script(&self, path: &'static str, response: Result<ApiResponse>) {
        self.scripted
            .lock()
            .unwrap()
            .entry(path)
            .or_default()
            .push_back(response);
    }

    /// All requests seen so far, in order.
    pub fn calls(&self) -> Vec<ApiRequest> {
        self.calls.lock().unwrap().clone()
    }

    /// How many requests hit `path`.
    pub fn call_count(&self, path: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|request| request.path == path)
            .count()
    }

    /// Highest number of requests ever in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UpstreamTransport for MockTransport {
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse> {
        self.calls.lock().unwrap().push(request.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(hold) = self.hold {
            tokio::time::sleep(hold).await;
        }

        let response = {
            let mut scripted = self.scripted.lock().unwrap();
            scripted
                .get_mut(request.path)
                .and_then(VecDeque::pop_front)
                .unwrap_or_else(|| Ok(ok("[]")))
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        response
    }
}

/// 200 response with the given body and no rate headers.
pub fn ok(body: &str) -> ApiResponse {
    ApiResponse {
        status: 200,
        body: body.to_string(),
        ..ApiResponse::default()
    }
}

/// 200 response with rate-limit headers.
pub fn ok_with_rate(body: &str, remaining: i64, reset_epoch_secs: i64) -> ApiResponse {
    ApiResponse {
        status: 200,
        body: body.to_string(),
        rate_remaining: Some(remaining),
        rate_reset: Some(reset_epoch_secs),
    }
}

/// 429 response whose body carries `retry_after`.
pub fn too_many_requests(retry_after_secs: u64) -> ApiResponse {
    ApiResponse {
        status: 429,
        body: format!(r#"{{"retry_after": {retry_after_secs}}}"#),
        ..ApiResponse::default()
    }
}

/// Bodyless response with the given status.
pub fn status_only(status: u16) -> ApiResponse {
    ApiResponse {
        status,
        ..ApiResponse::default()
    }
}

/// `GET /server/players` body from `(name, id)` pairs.
pub fn players_body(players: &[(&str, i64)]) -> String {
    let list: Vec<Value> = players
        .iter()
        .map(|(name, id)| {
            json!({
                "Player": format!("{name}:{id}"),
                "Permission": "Normal",
                "Team": "Civilian",
            })
        })
        .collect();
    serde_json::to_string(&list).unwrap()
}

/// `GET /server/joinlogs` body from `(join, timestamp, "Name:Id")` triples.
pub fn join_logs_body(entries: &[(bool, i64, &str)]) -> String {
    let list: Vec<Value> = entries
        .iter()
        .map(|(join, timestamp, player)| {
            json!({ "Join": join, "Timestamp": timestamp, "Player": player })
        })
        .collect();
    serde_json::to_string(&list).unwrap()
}

/// `GET /server/killlogs` body from `(timestamp, killed, killer)` triples.
pub fn kill_logs_body(entries: &[(i64, &str, &str)]) -> String {
    let list: Vec<Value> = entries
        .iter()
        .map(|(timestamp, killed, killer)| {
            json!({ "Killed": killed, "Timestamp": timestamp, "Killer": killer })
        })
        .collect();
    serde_json::to_string(&list).unwrap()
}

/// `GET /server/commandlogs` body from `(timestamp, "Name:Id", command)` triples.
pub fn command_logs_body(entries: &[(i64, &str, &str)]) -> String {
    let list: Vec<Value> = entries
        .iter()
        .map(|(timestamp, player, command)| {
            json!({ "Player": player, "Timestamp": timestamp, "Command": command })
        })
        .collect();
    serde_json::to_string(&list).unwrap()
}

/// Automation double recording every event it receives.
#[derive(Default)]
pub struct RecordingAutomation {
    events: Mutex<Vec<(String, Value)>>,
}

impl RecordingAutomation {
    pub fn events(&self) -> Vec<(String, Value)> {
        self.events.lock().unwrap().clone()
    }

    pub fn event_names(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }
}

#[async_trait]
impl AutomationHook for RecordingAutomation {
    async fn trigger(&self, event: &str, context: Value) -> Result<()> {
        self.events
            .lock()
            .unwrap()
            .push((event.to_string(), context));
        Ok(())
    }
}

/// Message queue double recording every enqueued message.
#[derive(Default)]
pub struct RecordingQueue {
    messages: Mutex<Vec<OutboundMessage>>,
}

impl RecordingQueue {
    pub fn messages(&self) -> Vec<OutboundMessage> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageQueue for RecordingQueue {
    async fn enqueue(&self, message: OutboundMessage) -> Result<()> {
        self.messages.lock().unwrap().push(message);
        Ok(())
    }
}

/// Gateway over a mock transport with default settings and no alerting.
pub fn gateway_with(transport: Arc<MockTransport>) -> Gateway {
    gateway_with_config(UpstreamConfig::default(), transport)
}

/// Gateway over a mock transport with custom upstream settings.
pub fn gateway_with_config(config: UpstreamConfig, transport: Arc<MockTransport>) -> Gateway {
    Gateway::new(config, transport, AlertSink::disabled())
}

/// Server entry with a derived key and no raid alert target.
pub fn server_entry(server_id: &str) -> ServerEntry {
    ServerEntry {
        server_id: server_id.to_string(),
        server_key: format!("key-{server_id}"),
        raid_alert_target: None,
    }
}

/// `:pm` command bodies POSTed through the transport, in order.
pub fn sent_pms(transport: &MockTransport) -> Vec<String> {
    transport
        .calls()
        .into_iter()
        .filter(|request| request.path == "/server/command")
        .filter_map(|request| request.body)
        .filter_map(|body| {
            body.get("command")
                .and_then(Value::as_str)
                .map(|command| command.to_string())
        })
        .filter(|command| command.starts_with(":pm"))
        .collect()
}

/// Everything a pipeline test needs, wired over in-memory doubles.
pub struct Harness {
    pub transport: Arc<MockTransport>,
    pub store: Arc<MemoryStore>,
    pub automation: Arc<RecordingAutomation>,
    pub queue: Arc<RecordingQueue>,
    pub pipeline: IngestPipeline,
}

/// Harness with no raid detection entitlements.
pub fn harness(transport: MockTransport) -> Harness {
    harness_with(
        transport,
        StaticEntitlements::new(),
        Arc::new(NoopRaidDetector),
    )
}

/// Harness with explicit entitlements and raid detector.
pub fn harness_with(
    transport: MockTransport,
    entitlements: StaticEntitlements,
    detector: Arc<dyn RaidDetector>,
) -> Harness {
    let transport = Arc::new(transport);
    let store = Arc::new(MemoryStore::new());
    let automation = Arc::new(RecordingAutomation::default());
    let queue = Arc::new(RecordingQueue::default());

    let gateway = gateway_with(transport.clone());
    let dispatcher = Arc::new(CommandDispatcher::new(
        gateway.clone(),
        store.clone(),
        automation.clone(),
        ModerationConfig::default(),
    ));
    let raid = RaidFilter::new(
        store.clone(),
        detector,
        queue.clone(),
        Arc::new(entitlements),
    );
    let pipeline = IngestPipeline::new(
        gateway,
        store.clone(),
        automation.clone(),
        dispatcher,
        raid,
    );

    Harness {
        transport,
        store,
        automation,
        queue,
        pipeline,
    }
}

//! Rate-limited, serialized client for the upstream control API.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::UpstreamConfig;
use crate::datetime::now_ms;
use crate::gateway::alert::{AlertSink, RateLimitIncident};
use crate::gateway::queue::RequestQueues;
use crate::gateway::rate_limit::{credential_hash, RateLimitRegistry, WaitPlan};
use crate::gateway::transport::{ApiRequest, UpstreamTransport};
use crate::gateway::types::{
    CommandLogRaw, CommandRequest, JoinLogRaw, KillLogRaw, Player, ServerStatus,
};
use crate::{Result, WardenError};

/// Single point of contact with the upstream control API.
///
/// Guarantees that no two physical requests under the same credential run
/// concurrently, honors the upstream's advertised budget by sleeping callers
/// before the attempt, and retries 429 responses a bounded number of times.
/// Every call eventually returns or fails.
#[derive(Clone)]
pub struct Gateway {
    config: UpstreamConfig,
    transport: Arc<dyn UpstreamTransport>,
    rate_limits: Arc<RateLimitRegistry>,
    queues: Arc<RequestQueues>,
    alerts: Arc<AlertSink>,
}

impl Gateway {
    pub fn new(
        config: UpstreamConfig,
        transport: Arc<dyn UpstreamTransport>,
        alerts: AlertSink,
    ) -> Self {
        let rate_limits = Arc::new(RateLimitRegistry::new(
            config.default_rate_budget,
            config.reset_buffer_ms,
        ));
        Self {
            config,
            transport,
            rate_limits,
            queues: Arc::new(RequestQueues::new()),
            alerts: Arc::new(alerts),
        }
    }

    /// Fetch server status.
    pub async fn get_server(&self, server_key: &str) -> Result<ServerStatus> {
        self.call(ApiRequest::get("/server", server_key)).await
    }

    /// Fetch the currently-online roster.
    pub async fn get_players(&self, server_key: &str) -> Result<Vec<Player>> {
        self.call(ApiRequest::get("/server/players", server_key))
            .await
    }

    /// Fetch join/leave logs.
    pub async fn get_join_logs(&self, server_key: &str) -> Result<Vec<JoinLogRaw>> {
        self.call(ApiRequest::get("/server/joinlogs", server_key))
            .await
    }

    /// Fetch kill logs.
    pub async fn get_kill_logs(&self, server_key: &str) -> Result<Vec<KillLogRaw>> {
        self.call(ApiRequest::get("/server/killlogs", server_key))
            .await
    }

    /// Fetch command logs.
    pub async fn get_command_logs(&self, server_key: &str) -> Result<Vec<CommandLogRaw>> {
        self.call(ApiRequest::get("/server/commandlogs", server_key))
            .await
    }

    /// Run a remote command on the server, e.g. a `:pm` reply.
    pub async fn execute_command(&self, server_key: &str, command: &str) -> Result<()> {
        let body = serde_json::to_value(CommandRequest {
            command: command.to_string(),
        })
        .map_err(|e| WardenError::Validation(format!("serialize command body: {e}")))?;

        let _: Value = self
            .call(ApiRequest::post("/server/command", server_key, body))
            .await?;
        Ok(())
    }

    /// One logical call: proactive wait, serialized attempt, bounded 429
    /// retries.
    async fn call<T>(&self, request: ApiRequest) -> Result<T>
    where
        T: DeserializeOwned + Default,
    {
        let key = credential_hash(&request.server_key);

        for attempt in 1..=self.config.retry_attempts {
            self.wait_until_clear(&key).await;

            debug!(
                "{} {} (credential {}, attempt {}/{})",
                request.method.as_str(),
                request.path,
                key,
                attempt,
                self.config.retry_attempts
            );

            let response = {
                // Slot held across the attempt and the header refresh.
                let _slot = self.queues.acquire(&key).await;
                let response = self.transport.execute(&request).await?;
                self.rate_limits
                    .observe_headers(&key, response.rate_remaining, response.rate_reset);
                response
            };

            if response.status == 429 {
                let retry_after = parse_retry_after(&response.body)
                    .unwrap_or(self.config.default_retry_after_secs);
                self.rate_limits.note_429(&key, retry_after, now_ms());
                warn!(
                    "upstream rate limited credential {} for {}s (attempt {}/{})",
                    key, retry_after, attempt, self.config.retry_attempts
                );
                if self.rate_limits.try_claim_alert(
                    &key,
                    now_ms(),
                    (self.config.cooldown_alert_interval_secs * 1000) as i64,
                ) {
                    self.alerts
                        .notify(RateLimitIncident::cooldown(&key, retry_after));
                }
                if attempt == self.config.retry_attempts {
                    break;
                }
                sleep(Duration::from_secs(retry_after)).await;
                continue;
            }

            if response.status == 403 {
                return Err(WardenError::InvalidCredential);
            }
            if !response.is_success() {
                return Err(WardenError::Upstream(response.status));
            }
            return parse_body(&response.body);
        }

        Err(WardenError::RateLimited(self.config.retry_attempts))
    }

    /// Sleep out any cooldown or exhausted budget before an attempt.
    async fn wait_until_clear(&self, key_hash: &str) {
        match self.rate_limits.plan_wait(key_hash, now_ms()) {
            WaitPlan::Clear => {}
            WaitPlan::Cooldown { until } => {
                let wait_ms = (until - now_ms()).max(0) as u64;
                debug!("credential {} cooling down for {}ms", key_hash, wait_ms);
                sleep(Duration::from_millis(wait_ms)).await;
            }
            WaitPlan::BudgetExhausted { until } => {
                let wait_ms = (until - now_ms()).max(0) as u64;
                if wait_ms > self.config.long_wait_alert_secs.saturating_mul(1000)
                    && self.rate_limits.try_claim_alert(
                        key_hash,
                        now_ms(),
                        (self.config.proactive_alert_interval_secs * 1000) as i64,
                    )
                {
                    self.alerts
                        .notify(RateLimitIncident::long_wait(key_hash, wait_ms / 1000));
                }
                debug!(
                    "credential {} out of budget, waiting {}ms for window reset",
                    key_hash, wait_ms
                );
                sleep(Duration::from_millis(wait_ms)).await;
                self.rate_limits.optimistic_reset(key_hash);
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct RetryBody {
    retry_after: Option<f64>,
}

/// Extract `retry_after` seconds from a 429 body.
fn parse_retry_after(body: &str) -> Option<u64> {
    let secs = serde_json::from_str::<RetryBody>(body).ok()?.retry_after?;
    if secs <= 0.0 {
        return None;
    }
    Some(secs.ceil() as u64)
}

/// Parse a successful response body. An empty body is an empty success, not
/// a parse failure.
fn parse_body<T>(body: &str) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(trimmed)
        .map_err(|e| WardenError::Transport(format!("malformed upstream response: {e}")))
}

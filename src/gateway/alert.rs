//! Operational alerting for rate-limit incidents.
//!
//! Incidents are always logged. When a webhook URL is configured, a JSON
//! payload is additionally posted fire-and-forget; delivery failures are
//! logged and dropped.

use reqwest::Client;
use serde::Serialize;
use tracing::warn;

/// What kind of incident occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncidentKind {
    /// A proactive budget wait exceeded the alert threshold.
    LongWait,
    /// The upstream answered 429 and imposed a cooldown.
    Cooldown,
}

impl IncidentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentKind::LongWait => "long_wait",
            IncidentKind::Cooldown => "cooldown",
        }
    }
}

/// A rate-limit incident on one credential.
///
/// Carries only the truncated credential hash, never the raw key.
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitIncident {
    #[serde(serialize_with = "serialize_kind")]
    pub kind: IncidentKind,
    pub credential_hash: String,
    pub wait_secs: u64,
}

fn serialize_kind<S: serde::Serializer>(
    kind: &IncidentKind,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(kind.as_str())
}

impl RateLimitIncident {
    pub fn long_wait(credential_hash: impl Into<String>, wait_secs: u64) -> Self {
        Self {
            kind: IncidentKind::LongWait,
            credential_hash: credential_hash.into(),
            wait_secs,
        }
    }

    pub fn cooldown(credential_hash: impl Into<String>, wait_secs: u64) -> Self {
        Self {
            kind: IncidentKind::Cooldown,
            credential_hash: credential_hash.into(),
            wait_secs,
        }
    }
}

/// Fire-and-forget alert delivery.
pub struct AlertSink {
    client: Client,
    webhook_url: Option<String>,
}

impl AlertSink {
    /// Create a sink. An empty URL disables webhook delivery; incidents are
    /// still logged.
    pub fn new(webhook_url: &str) -> Self {
        Self {
            client: Client::new(),
            webhook_url: if webhook_url.is_empty() {
                None
            } else {
                Some(webhook_url.to_string())
            },
        }
    }

    /// Sink that only logs.
    pub fn disabled() -> Self {
        Self::new("")
    }

    /// Report an incident. Returns immediately; delivery happens in a
    /// spawned task.
    pub fn notify(&self, incident: RateLimitIncident) {
        warn!(
            "rate limit incident ({}) on credential {}: waiting {}s",
            incident.kind.as_str(),
            incident.credential_hash,
            incident.wait_secs
        );

        let Some(url) = self.webhook_url.clone() else {
            return;
        };
        let client = self.client.clone();
        tokio::spawn(async move {
            if let Err(e) = client.post(&url).json(&incident).send().await {
                warn!("alert webhook delivery failed: {}", e);
            }
        });
    }
}

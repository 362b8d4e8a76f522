//! Collaborator seams consumed by the pipeline and dispatcher.
//!
//! The automation engine, raid detector, outbound message queue, and
//! entitlement service all live outside this crate. This module defines the
//! traits they are called through, plus default implementations that log and
//! do nothing so the binary runs without any of them wired up.

use std::collections::HashSet;
use std::future::Future;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::store::LogEntry;
use crate::Result;

/// Event name for a player joining a server.
pub const PLAYER_JOIN: &str = "PLAYER_JOIN";
/// Event name for a player leaving a server.
pub const PLAYER_LEAVE: &str = "PLAYER_LEAVE";
/// Event name for a kill.
pub const PLAYER_KILL: &str = "PLAYER_KILL";
/// Event name for a chat command.
pub const COMMAND_USED: &str = "COMMAND_USED";
/// Event name for a punishment issued via game command.
pub const PUNISHMENT_ISSUED: &str = "PUNISHMENT_ISSUED";

/// Feature flag gating raid alert delivery.
pub const FEATURE_RAID_ALERTS: &str = "raid_alerts";

/// Run a fallible side effect, logging failure instead of propagating it.
///
/// Used for automation triggers, PM replies, and alert enqueues, where the
/// underlying state mutation must not be rolled back by a delivery failure.
pub async fn best_effort<F>(what: &str, fut: F)
where
    F: Future<Output = Result<()>>,
{
    if let Err(e) = fut.await {
        warn!("{} failed: {}", what, e);
    }
}

/// Automation rule engine seam.
#[async_trait]
pub trait AutomationHook: Send + Sync {
    /// Fire a domain event with a JSON context payload.
    ///
    /// Must not block the caller beyond handing off the event.
    async fn trigger(&self, event: &str, context: Value) -> Result<()>;
}

/// A raid detector verdict for one actor.
#[derive(Debug, Clone)]
pub struct Detection {
    /// Detector-defined detection type.
    pub kind: String,
    /// Actor's Roblox id.
    pub user_id: i64,
    /// Actor's display name.
    pub user_name: String,
    /// Human-readable description of what tripped the detector.
    pub details: String,
}

/// Raid detection heuristic seam.
#[async_trait]
pub trait RaidDetector: Send + Sync {
    /// Inspect command logs from unauthorized actors and report detections.
    async fn scan(&self, candidates: &[LogEntry]) -> Result<Vec<Detection>>;
}

/// A message awaiting delivery by the external transport.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    /// Server the message concerns.
    pub server_id: String,
    /// Queue message type.
    pub kind: String,
    /// Delivery target (e.g. a channel id).
    pub target_id: String,
    /// Message body.
    pub content: String,
}

impl OutboundMessage {
    /// Create a plain `MESSAGE` entry.
    pub fn message(
        server_id: impl Into<String>,
        target_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            server_id: server_id.into(),
            kind: "MESSAGE".to_string(),
            target_id: target_id.into(),
            content: content.into(),
        }
    }
}

/// Outbound message queue seam. Delivery transport is external; nothing in
/// this crate sends directly.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    async fn enqueue(&self, message: OutboundMessage) -> Result<()>;
}

/// What a server's plan entitles it to.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServerPlan {
    pub has_raid_detection: bool,
}

/// Feature flag and plan lookup seam.
#[async_trait]
pub trait Entitlements: Send + Sync {
    /// Whether a global feature flag is on.
    async fn is_feature_enabled(&self, flag: &str) -> bool;

    /// The plan of one server. Unknown servers get the default plan.
    async fn server_plan(&self, server_id: &str) -> ServerPlan;
}

/// Automation hook that only logs the events it receives.
#[derive(Debug, Default)]
pub struct LoggingAutomation;

#[async_trait]
impl AutomationHook for LoggingAutomation {
    async fn trigger(&self, event: &str, context: Value) -> Result<()> {
        debug!("automation event {}: {}", event, context);
        Ok(())
    }
}

/// Raid detector that never detects anything.
#[derive(Debug, Default)]
pub struct NoopRaidDetector;

#[async_trait]
impl RaidDetector for NoopRaidDetector {
    async fn scan(&self, _candidates: &[LogEntry]) -> Result<Vec<Detection>> {
        Ok(Vec::new())
    }
}

/// Message queue that logs instead of queueing.
#[derive(Debug, Default)]
pub struct LoggingMessageQueue;

#[async_trait]
impl MessageQueue for LoggingMessageQueue {
    async fn enqueue(&self, message: OutboundMessage) -> Result<()> {
        info!(
            "outbound message for {} (target {}): {}",
            message.server_id, message.target_id, message.content
        );
        Ok(())
    }
}

/// Fixed-answer entitlements.
#[derive(Debug, Default)]
pub struct StaticEntitlements {
    features: HashSet<String>,
    raid_detection_servers: HashSet<String>,
}

impl StaticEntitlements {
    /// Nothing enabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable a feature flag.
    pub fn with_feature(mut self, flag: impl Into<String>) -> Self {
        self.features.insert(flag.into());
        self
    }

    /// Grant a server a plan with raid detection.
    pub fn with_raid_detection(mut self, server_id: impl Into<String>) -> Self {
        self.raid_detection_servers.insert(server_id.into());
        self
    }
}

#[async_trait]
impl Entitlements for StaticEntitlements {
    async fn is_feature_enabled(&self, flag: &str) -> bool {
        self.features.contains(flag)
    }

    async fn server_plan(&self, server_id: &str) -> ServerPlan {
        ServerPlan {
            has_raid_detection: self.raid_detection_servers.contains(server_id),
        }
    }
}

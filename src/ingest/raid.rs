//! Raid detection glue.
//!
//! After each poll cycle the new command-log entries are screened: commands
//! from actors with no staff registration go to the external raid detector,
//! and any detection produces one combined alert on the outbound message
//! queue. Everything here is advisory; failures never disturb ingestion.

use std::sync::Arc;

use tracing::warn;

use crate::config::ServerEntry;
use crate::hooks::{
    best_effort, Detection, Entitlements, MessageQueue, OutboundMessage, RaidDetector,
    FEATURE_RAID_ALERTS,
};
use crate::store::{LogDetails, LogEntry, ModerationStore};

/// Detections spelled out per alert; the rest are summarized in one line.
const MAX_DETECTIONS_LISTED: usize = 10;

/// Screens new command logs for raid activity and raises alerts.
pub struct RaidFilter {
    store: Arc<dyn ModerationStore>,
    detector: Arc<dyn RaidDetector>,
    queue: Arc<dyn MessageQueue>,
    entitlements: Arc<dyn Entitlements>,
}

impl RaidFilter {
    pub fn new(
        store: Arc<dyn ModerationStore>,
        detector: Arc<dyn RaidDetector>,
        queue: Arc<dyn MessageQueue>,
        entitlements: Arc<dyn Entitlements>,
    ) -> Self {
        Self {
            store,
            detector,
            queue,
            entitlements,
        }
    }

    /// Screen one cycle's new command entries for `server`.
    ///
    /// Runs only when the server has an alert target configured, the global
    /// feature flag is on, and the server's plan includes raid detection.
    pub async fn inspect(&self, server: &ServerEntry, new_commands: &[LogEntry]) {
        let Some(target) = &server.raid_alert_target else {
            return;
        };
        if new_commands.is_empty() {
            return;
        }
        if !self
            .entitlements
            .is_feature_enabled(FEATURE_RAID_ALERTS)
            .await
        {
            return;
        }
        if !self
            .entitlements
            .server_plan(&server.server_id)
            .await
            .has_raid_detection
        {
            return;
        }

        let mut candidates = Vec::new();
        for entry in new_commands {
            let LogDetails::Command { player, .. } = &entry.details else {
                continue;
            };
            match self.store.find_member(&server.server_id, player.id).await {
                Ok(None) => candidates.push(entry.clone()),
                Ok(Some(_)) => {} // Registered staff are never raid suspects
                Err(e) => {
                    warn!(
                        "member lookup for {} failed on {}: {}",
                        player.id, server.server_id, e
                    );
                }
            }
        }
        if candidates.is_empty() {
            return;
        }

        let detections = match self.detector.scan(&candidates).await {
            Ok(detections) => detections,
            Err(e) => {
                warn!("raid scan failed on {}: {}", server.server_id, e);
                return;
            }
        };
        if detections.is_empty() {
            return;
        }

        warn!(
            "possible raid on {}: {} detection(s)",
            server.server_id,
            detections.len()
        );
        let alert = format_raid_alert(&server.server_id, &detections);
        best_effort(
            "raid alert enqueue",
            self.queue
                .enqueue(OutboundMessage::message(&server.server_id, target, alert)),
        )
        .await;
    }
}

/// One multi-line alert body covering all detections of a cycle.
fn format_raid_alert(server_id: &str, detections: &[Detection]) -> String {
    let mut lines = vec![format!(
        "Possible raid on {}: {} suspicious actor(s).",
        server_id,
        detections.len()
    )];
    for detection in detections.iter().take(MAX_DETECTIONS_LISTED) {
        lines.push(format!(
            "- {} ({}): {}",
            detection.user_name, detection.user_id, detection.details
        ));
    }
    if detections.len() > MAX_DETECTIONS_LISTED {
        lines.push(format!(
            "...and {} more.",
            detections.len() - MAX_DETECTIONS_LISTED
        ));
    }
    lines.join("\n")
}

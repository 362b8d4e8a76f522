//! Per-server ingestion cycle.
//!
//! One poll cycle fetches the three upstream log streams, normalizes them,
//! drops everything already persisted, stores the remainder, and fans each
//! new entry out to the automation engine, the command dispatcher, and the
//! raid filter. A cycle never fails as a whole; a dead stream or a bad entry
//! costs only its own records.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::config::ServerEntry;
use crate::dispatch::CommandDispatcher;
use crate::gateway::Gateway;
use crate::hooks::{
    best_effort, AutomationHook, COMMAND_USED, PLAYER_JOIN, PLAYER_KILL, PLAYER_LEAVE,
};
use crate::ingest::normalize::{normalize_command, normalize_join, normalize_kill};
use crate::ingest::raid::RaidFilter;
use crate::store::{LogDetails, LogEntry, LogKey, ModerationStore, NewLogEntry};
use crate::WardenError;

/// Fetches, persists, and fans out upstream logs for one server at a time.
pub struct IngestPipeline {
    gateway: Gateway,
    store: Arc<dyn ModerationStore>,
    automation: Arc<dyn AutomationHook>,
    dispatcher: Arc<CommandDispatcher>,
    raid: RaidFilter,
}

impl IngestPipeline {
    pub fn new(
        gateway: Gateway,
        store: Arc<dyn ModerationStore>,
        automation: Arc<dyn AutomationHook>,
        dispatcher: Arc<CommandDispatcher>,
        raid: RaidFilter,
    ) -> Self {
        Self {
            gateway,
            store,
            automation,
            dispatcher,
            raid,
        }
    }

    /// Run one poll cycle for `server`. Returns how many entries were newly
    /// persisted. Never errors; failures are logged and skipped.
    pub async fn poll_server(&self, server: &ServerEntry) -> usize {
        let mut batch = self.fetch_batch(server).await;

        // The same event can appear in consecutive polls and, for joins and
        // leaves, twice within one response. Batch-local dedup first.
        let mut seen = HashSet::new();
        batch.retain(|entry| seen.insert(entry.key()));

        let keys: Vec<LogKey> = batch.iter().map(NewLogEntry::key).collect();
        let existing = match self
            .store
            .existing_log_keys(&server.server_id, &keys)
            .await
        {
            Ok(existing) => existing,
            Err(e) => {
                error!("dedup lookup failed on {}: {}", server.server_id, e);
                return 0;
            }
        };
        batch.retain(|entry| !existing.contains(&entry.key()));

        let mut inserted = 0;
        let mut new_commands = Vec::new();
        for entry in &batch {
            let saved = match self.store.insert_log(entry).await {
                Ok(Some(saved)) => saved,
                Ok(None) => continue, // Raced in since the bulk check
                Err(e) => {
                    error!(
                        "failed to persist {} log on {}: {}",
                        entry.kind(),
                        server.server_id,
                        e
                    );
                    continue;
                }
            };
            inserted += 1;

            self.fan_out(server, &saved).await;
            if let LogDetails::Command { player, command } = &saved.details {
                best_effort(
                    "command dispatch",
                    self.dispatcher.handle(server, player, command),
                )
                .await;
                new_commands.push(saved.clone());
            }
        }

        self.raid.inspect(server, &new_commands).await;

        if inserted > 0 {
            info!("{}: {} new log entries", server.server_id, inserted);
        } else {
            debug!("{}: no new log entries", server.server_id);
        }
        inserted
    }

    /// Fetch and normalize all three streams. A failed stream contributes
    /// nothing; the others still go through.
    async fn fetch_batch(&self, server: &ServerEntry) -> Vec<NewLogEntry> {
        let mut batch = Vec::new();

        match self.gateway.get_join_logs(&server.server_key).await {
            Ok(raws) => batch.extend(
                raws.iter()
                    .filter_map(|raw| normalize_join(&server.server_id, raw)),
            ),
            Err(e) => log_fetch_failure("join", &server.server_id, &e),
        }
        match self.gateway.get_kill_logs(&server.server_key).await {
            Ok(raws) => batch.extend(
                raws.iter()
                    .filter_map(|raw| normalize_kill(&server.server_id, raw)),
            ),
            Err(e) => log_fetch_failure("kill", &server.server_id, &e),
        }
        match self.gateway.get_command_logs(&server.server_key).await {
            Ok(raws) => batch.extend(
                raws.iter()
                    .filter_map(|raw| normalize_command(&server.server_id, raw)),
            ),
            Err(e) => log_fetch_failure("command", &server.server_id, &e),
        }

        batch
    }

    /// Fire the automation event matching one newly persisted entry.
    async fn fan_out(&self, server: &ServerEntry, entry: &LogEntry) {
        let (event, context) = match &entry.details {
            LogDetails::Join { player, joined } => (
                if *joined { PLAYER_JOIN } else { PLAYER_LEAVE },
                json!({
                    "serverId": server.server_id,
                    "userId": player.id,
                    "userName": player.name,
                    "timestamp": entry.prc_timestamp,
                }),
            ),
            LogDetails::Kill { killer, victim } => (
                PLAYER_KILL,
                json!({
                    "serverId": server.server_id,
                    "killerId": killer.id,
                    "killerName": killer.name,
                    "victimId": victim.id,
                    "victimName": victim.name,
                    "timestamp": entry.prc_timestamp,
                }),
            ),
            LogDetails::Command { player, command } => (
                COMMAND_USED,
                json!({
                    "serverId": server.server_id,
                    "userId": player.id,
                    "userName": player.name,
                    "command": command,
                    "timestamp": entry.prc_timestamp,
                }),
            ),
        };
        best_effort("automation trigger", self.automation.trigger(event, context)).await;
    }
}

/// Transient upstream failures cost one cycle and log at warn; anything
/// else (revoked credential, broken config) logs at error.
fn log_fetch_failure(stream: &str, server_id: &str, e: &WardenError) {
    if e.is_transient() {
        warn!("{} log fetch failed on {}: {}", stream, server_id, e);
    } else {
        error!("{} log fetch failed on {}: {}", stream, server_id, e);
    }
}

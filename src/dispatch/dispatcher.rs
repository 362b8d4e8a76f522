//! Execution of in-game moderation commands.
//!
//! The dispatcher receives command-log lines the pipeline flagged, parses
//! them, applies the requested state change through the store, and answers
//! the issuer with a `:pm` through the gateway. Replies are best effort: a
//! failed PM never rolls back a recorded shift or punishment.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::config::{ModerationConfig, ServerEntry};
use crate::datetime::{format_duration, now_ms, week_start};
use crate::gateway::Gateway;
use crate::hooks::{best_effort, AutomationHook, PUNISHMENT_ISSUED};
use crate::store::{
    Member, ModerationStore, NewPunishment, NewShift, PlayerRef, PunishmentKind, ShutdownEvent,
};
use crate::Result;

use super::command::{parse_game_command, GameCommand};
use super::target::{resolve_target, TargetResolution};

/// Reply sent for a `:log` command with an unrecognized verb.
const USAGE_HINT: &str =
    "Usage: :log shift <start|end|status> | :log <warn|kick|ban|bolo> <player> [reason]";

/// Executes parsed game commands against the store and the upstream server.
pub struct CommandDispatcher {
    gateway: Gateway,
    store: Arc<dyn ModerationStore>,
    automation: Arc<dyn AutomationHook>,
    config: ModerationConfig,
}

impl CommandDispatcher {
    pub fn new(
        gateway: Gateway,
        store: Arc<dyn ModerationStore>,
        automation: Arc<dyn AutomationHook>,
        config: ModerationConfig,
    ) -> Self {
        Self {
            gateway,
            store,
            automation,
            config,
        }
    }

    /// Handle one command-log line issued by `issuer` on `server`.
    ///
    /// Lines that do not parse as a moderation command are ignored. Errors
    /// are returned only for store failures; upstream reply failures are
    /// logged and swallowed.
    pub async fn handle(&self, server: &ServerEntry, issuer: &PlayerRef, text: &str) -> Result<()> {
        let Some(command) = parse_game_command(text) else {
            return Ok(());
        };
        debug!(
            "game command {:?} from {} on {}",
            command, issuer.name, server.server_id
        );

        match command {
            GameCommand::ShiftStart => self.shift_start(server, issuer).await,
            GameCommand::ShiftEnd => self.shift_end(server, issuer).await,
            GameCommand::ShiftStatus => self.shift_status(server, issuer).await,
            GameCommand::Punish {
                kind,
                query,
                reason,
            } => self.punish(server, issuer, kind, &query, &reason).await,
            GameCommand::Shutdown => self.shutdown(server, issuer).await,
            GameCommand::Unknown { verb } => {
                debug!(
                    "unrecognized game command verb {:?} from {} on {}",
                    verb, issuer.name, server.server_id
                );
                self.reply(server, &issuer.name, USAGE_HINT).await;
                Ok(())
            }
        }
    }

    /// PM `text` to a player, logging delivery failure instead of failing.
    async fn reply(&self, server: &ServerEntry, player_name: &str, text: &str) {
        let command = format!(":pm {} {}", player_name, text);
        best_effort(
            "pm reply",
            self.gateway.execute_command(&server.server_key, &command),
        )
        .await;
    }

    /// Look up the issuer's staff registration, PMing a pointer when absent.
    async fn require_member(
        &self,
        server: &ServerEntry,
        issuer: &PlayerRef,
    ) -> Result<Option<Member>> {
        match self.store.find_member(&server.server_id, issuer.id).await? {
            Some(member) => Ok(Some(member)),
            None => {
                self.reply(
                    server,
                    &issuer.name,
                    "You are not registered as staff on this server.",
                )
                .await;
                Ok(None)
            }
        }
    }

    async fn shift_start(&self, server: &ServerEntry, issuer: &PlayerRef) -> Result<()> {
        if self.require_member(server, issuer).await?.is_none() {
            return Ok(());
        }

        if let Some(active) = self
            .store
            .active_shift(&server.server_id, issuer.id)
            .await?
        {
            let elapsed = format_duration(active.elapsed_secs(now_ms()));
            self.reply(
                server,
                &issuer.name,
                &format!("You are already on shift ({} elapsed).", elapsed),
            )
            .await;
            return Ok(());
        }

        // A shift only makes sense on a live server with players on it.
        let players = match self.gateway.get_players(&server.server_key).await {
            Ok(players) => players,
            Err(e) => {
                warn!(
                    "roster check failed on {} before shift start: {}",
                    server.server_id, e
                );
                self.reply(
                    server,
                    &issuer.name,
                    "Could not verify the server roster. Try again shortly.",
                )
                .await;
                return Ok(());
            }
        };
        if players.is_empty() {
            self.reply(
                server,
                &issuer.name,
                "The server is empty; shift not started.",
            )
            .await;
            return Ok(());
        }

        self.store
            .insert_shift(&NewShift::new(&server.server_id, issuer.id, now_ms()))
            .await?;
        info!("{} started a shift on {}", issuer.name, server.server_id);
        self.reply(server, &issuer.name, "Shift started.").await;
        Ok(())
    }

    async fn shift_end(&self, server: &ServerEntry, issuer: &PlayerRef) -> Result<()> {
        if self.require_member(server, issuer).await?.is_none() {
            return Ok(());
        }

        let Some(active) = self
            .store
            .active_shift(&server.server_id, issuer.id)
            .await?
        else {
            self.reply(server, &issuer.name, "You are not on shift.")
                .await;
            return Ok(());
        };

        let now = now_ms();
        let duration_secs = active.elapsed_secs(now);
        self.store.end_shift(active.id, now, duration_secs).await?;
        info!(
            "{} ended a shift on {} after {}s",
            issuer.name, server.server_id, duration_secs
        );
        self.reply(
            server,
            &issuer.name,
            &format!("Shift ended after {}.", format_duration(duration_secs)),
        )
        .await;
        Ok(())
    }

    async fn shift_status(&self, server: &ServerEntry, issuer: &PlayerRef) -> Result<()> {
        let Some(member) = self.require_member(server, issuer).await? else {
            return Ok(());
        };

        let now = now_ms();
        let since_ms = week_start(Utc::now()).timestamp_millis();
        let weekly = self
            .store
            .shifts_started_since(&server.server_id, issuer.id, since_ms)
            .await?;
        // Completed shifts carry a duration; the active one is counted live
        // below, whether it started inside the week or before it.
        let mut total_secs: i64 = weekly.iter().filter_map(|s| s.duration_secs).sum();
        let active = self
            .store
            .active_shift(&server.server_id, issuer.id)
            .await?;
        if let Some(active) = &active {
            total_secs += active.elapsed_secs(now);
        }

        let line = status_line(active.is_some(), total_secs / 60, member.quota_minutes);
        self.reply(server, &issuer.name, &line).await;
        Ok(())
    }

    async fn punish(
        &self,
        server: &ServerEntry,
        issuer: &PlayerRef,
        kind: PunishmentKind,
        query: &str,
        reason: &str,
    ) -> Result<()> {
        let roster = match self.gateway.get_players(&server.server_key).await {
            Ok(roster) => roster,
            Err(e) => {
                // Fall through to the leave search with an empty roster.
                warn!("roster fetch failed on {}: {}", server.server_id, e);
                Vec::new()
            }
        };
        let since_secs = now_ms() / 1000 - self.config.recent_leave_window_mins * 60;
        let leaves = self
            .store
            .recent_leaves(&server.server_id, since_secs)
            .await?;

        match resolve_target(&roster, &leaves, query) {
            TargetResolution::Online(target) => {
                self.issue_punishment(server, issuer, kind, &target, reason, false)
                    .await
            }
            TargetResolution::RecentlyLeft(target) => {
                self.issue_punishment(server, issuer, kind, &target, reason, true)
                    .await
            }
            TargetResolution::Ambiguous(names) => {
                self.reply(
                    server,
                    &issuer.name,
                    &format!(
                        "Multiple players match \"{}\": {}. Be more specific.",
                        query,
                        names.join(", ")
                    ),
                )
                .await;
                Ok(())
            }
            TargetResolution::NoMatch => {
                self.reply(
                    server,
                    &issuer.name,
                    &format!("No player matches \"{}\".", query),
                )
                .await;
                Ok(())
            }
        }
    }

    async fn issue_punishment(
        &self,
        server: &ServerEntry,
        issuer: &PlayerRef,
        kind: PunishmentKind,
        target: &PlayerRef,
        reason: &str,
        recently_left: bool,
    ) -> Result<()> {
        let reason = format!("[Game Command by {}] {}", issuer.name, reason);
        let new = NewPunishment::new(&server.server_id, target, issuer.id, kind, reason);
        let punishment = self.store.insert_punishment(&new).await?;
        info!(
            "{} issued {} to {} ({}) on {}",
            issuer.name, kind, target.name, target.id, server.server_id
        );

        best_effort(
            "automation trigger",
            self.automation.trigger(
                PUNISHMENT_ISSUED,
                json!({
                    "serverId": server.server_id,
                    "punishmentId": punishment.id,
                    "type": kind.as_str(),
                    "userId": target.id,
                    "userName": target.name,
                    "moderatorId": issuer.id,
                }),
            ),
        )
        .await;

        let tag = if recently_left { " (recently left)" } else { "" };
        self.reply(
            server,
            &issuer.name,
            &format!("{} issued to {}{}.", kind, target.name, tag),
        )
        .await;
        Ok(())
    }

    /// End every active shift and record the shutdown. Issuing `:shutdown`
    /// with no shifts open still records an event.
    async fn shutdown(&self, server: &ServerEntry, issuer: &PlayerRef) -> Result<()> {
        let now = now_ms();
        let active = self.store.active_shifts(&server.server_id).await?;
        let mut affected = Vec::new();
        for shift in &active {
            match self
                .store
                .end_shift(shift.id, now, shift.elapsed_secs(now))
                .await
            {
                Ok(Some(_)) => affected.push(shift.user_id),
                Ok(None) => {} // Already closed
                Err(e) => error!(
                    "failed to close shift {} during shutdown of {}: {}",
                    shift.id, server.server_id, e
                ),
            }
        }

        let event = ShutdownEvent::new(&server.server_id, now, issuer, affected);
        self.store.insert_shutdown_event(&event).await?;
        info!(
            "shutdown of {} by {}: {} shift(s) closed",
            server.server_id, issuer.name, event.shifts_ended
        );
        Ok(())
    }
}

/// One-line duty summary, e.g. `On duty. This week: 305/600 minutes (51%).`
fn status_line(on_duty: bool, minutes: i64, quota_minutes: i64) -> String {
    let duty = if on_duty { "On duty" } else { "Off duty" };
    if quota_minutes > 0 {
        let pct = ((minutes as f64 / quota_minutes as f64) * 100.0).round() as i64;
        format!(
            "{}. This week: {}/{} minutes ({}%).",
            duty, minutes, quota_minutes, pct
        )
    } else {
        format!("{}. This week: {} minutes (no quota).", duty, minutes)
    }
}

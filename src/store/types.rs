//! Moderation record types.
//!
//! This module defines the entities persisted by the store: ingested log
//! entries, server members, punishments, shifts, and shutdown events.
//!
//! Timestamps named `prc_timestamp` carry the upstream API's epoch-second
//! values unchanged; all other timestamps are epoch milliseconds.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Log stream a record came from.
///
/// Leave events share the `join` kind with joins; the direction lives in
/// [`LogDetails::Join`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogKind {
    /// Join/leave log stream.
    Join,
    /// Kill log stream.
    Kill,
    /// Command log stream.
    Command,
}

impl LogKind {
    /// Convert kind to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogKind::Join => "join",
            LogKind::Kill => "kill",
            LogKind::Command => "command",
        }
    }
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LogKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "join" => Ok(LogKind::Join),
            "kill" => Ok(LogKind::Kill),
            "command" => Ok(LogKind::Command),
            _ => Err(format!("unknown log kind: {s}")),
        }
    }
}

/// A player reference as the upstream reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRef {
    /// Display name at the time of the event.
    pub name: String,
    /// Canonical numeric player id.
    pub id: i64,
}

impl PlayerRef {
    pub fn new(name: impl Into<String>, id: i64) -> Self {
        Self {
            name: name.into(),
            id,
        }
    }

    /// Parse a combined `"Name:Id"` field.
    ///
    /// Splits on the last colon so names containing colons survive. Returns
    /// None when the id part is missing or non-numeric.
    pub fn parse(combined: &str) -> Option<Self> {
        let (name, id) = combined.rsplit_once(':')?;
        let id = id.trim().parse::<i64>().ok()?;
        if name.is_empty() {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            id,
        })
    }
}

impl fmt::Display for PlayerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// Kind-specific payload of a log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogDetails {
    /// A player joined or left the server.
    Join {
        player: PlayerRef,
        /// True for a join, false for a leave.
        joined: bool,
    },
    /// A player killed another player.
    Kill {
        killer: PlayerRef,
        victim: PlayerRef,
    },
    /// A player ran a chat command.
    Command {
        player: PlayerRef,
        /// Full command text including the leading `:`.
        command: String,
    },
}

impl LogDetails {
    /// Log kind this payload belongs to.
    pub fn kind(&self) -> LogKind {
        match self {
            LogDetails::Join { .. } => LogKind::Join,
            LogDetails::Kill { .. } => LogKind::Kill,
            LogDetails::Command { .. } => LogKind::Command,
        }
    }
}

/// Dedup key of a log entry within one server.
///
/// The upstream provides no log ids; a record is identified by its stream and
/// its upstream timestamp.
pub type LogKey = (LogKind, i64);

/// A persisted log entry.
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Unique entry ID.
    pub id: i64,
    /// Server the entry belongs to.
    pub server_id: String,
    /// Upstream event timestamp (epoch seconds, as received).
    pub prc_timestamp: i64,
    /// Kind-specific payload.
    pub details: LogDetails,
    /// Ingestion timestamp (epoch milliseconds).
    pub created_at: i64,
}

impl LogEntry {
    pub fn kind(&self) -> LogKind {
        self.details.kind()
    }
}

/// Data for persisting a new log entry.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLogEntry {
    /// Server the entry belongs to.
    pub server_id: String,
    /// Upstream event timestamp (epoch seconds, as received).
    pub prc_timestamp: i64,
    /// Kind-specific payload.
    pub details: LogDetails,
}

impl NewLogEntry {
    pub fn new(server_id: impl Into<String>, prc_timestamp: i64, details: LogDetails) -> Self {
        Self {
            server_id: server_id.into(),
            prc_timestamp,
            details,
        }
    }

    pub fn kind(&self) -> LogKind {
        self.details.kind()
    }

    /// Dedup key within this entry's server.
    pub fn key(&self) -> LogKey {
        (self.kind(), self.prc_timestamp)
    }
}

/// A registered staff member of one server.
#[derive(Debug, Clone)]
pub struct Member {
    /// Canonical Roblox id.
    pub user_id: i64,
    /// Server the registration is scoped to.
    pub server_id: String,
    /// Display name at registration time.
    pub username: String,
    /// Staff role name.
    pub role: String,
    /// Linked chat-platform id, if any.
    pub discord_id: Option<String>,
    /// Weekly on-duty minutes target. 0 means no quota.
    pub quota_minutes: i64,
}

/// Data for registering a new member.
#[derive(Debug, Clone)]
pub struct NewMember {
    pub user_id: i64,
    pub server_id: String,
    pub username: String,
    pub role: String,
    pub discord_id: Option<String>,
    pub quota_minutes: i64,
}

impl NewMember {
    /// Create a member registration with minimal required fields.
    pub fn new(
        user_id: i64,
        server_id: impl Into<String>,
        username: impl Into<String>,
        role: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            server_id: server_id.into(),
            username: username.into(),
            role: role.into(),
            discord_id: None,
            quota_minutes: 0,
        }
    }

    /// Set the linked chat-platform id.
    pub fn with_discord_id(mut self, discord_id: impl Into<String>) -> Self {
        self.discord_id = Some(discord_id.into());
        self
    }

    /// Set the weekly quota in minutes.
    pub fn with_quota_minutes(mut self, quota_minutes: i64) -> Self {
        self.quota_minutes = quota_minutes;
        self
    }
}

/// Punishment severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PunishmentKind {
    /// Formal warning.
    Warn,
    /// Removed from the server.
    Kick,
    /// Banned from the server.
    Ban,
    /// Watch and ban on sight; stays open until manually resolved.
    BanBolo,
}

impl PunishmentKind {
    /// Convert kind to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            PunishmentKind::Warn => "Warn",
            PunishmentKind::Kick => "Kick",
            PunishmentKind::Ban => "Ban",
            PunishmentKind::BanBolo => "Ban Bolo",
        }
    }

    /// Whether a punishment of this kind is created already resolved.
    pub fn auto_resolved(&self) -> bool {
        !matches!(self, PunishmentKind::BanBolo)
    }
}

impl fmt::Display for PunishmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PunishmentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "warn" => Ok(PunishmentKind::Warn),
            "kick" => Ok(PunishmentKind::Kick),
            "ban" => Ok(PunishmentKind::Ban),
            "ban bolo" | "bolo" => Ok(PunishmentKind::BanBolo),
            _ => Err(format!("unknown punishment kind: {s}")),
        }
    }
}

/// A persisted punishment.
#[derive(Debug, Clone)]
pub struct Punishment {
    /// Unique punishment ID.
    pub id: i64,
    /// Server the punishment was issued on.
    pub server_id: String,
    /// Target's Roblox id.
    pub user_id: i64,
    /// Target's display name at issue time.
    pub user_name: String,
    /// Issuing moderator's Roblox id.
    pub moderator_id: i64,
    /// Severity.
    pub kind: PunishmentKind,
    /// Free-form reason text.
    pub reason: String,
    /// False while a BOLO is still open.
    pub resolved: bool,
    /// Issue timestamp (epoch milliseconds).
    pub created_at: i64,
}

/// Data for recording a new punishment.
#[derive(Debug, Clone)]
pub struct NewPunishment {
    pub server_id: String,
    pub user_id: i64,
    pub user_name: String,
    pub moderator_id: i64,
    pub kind: PunishmentKind,
    pub reason: String,
    pub resolved: bool,
}

impl NewPunishment {
    pub fn new(
        server_id: impl Into<String>,
        target: &PlayerRef,
        moderator_id: i64,
        kind: PunishmentKind,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            server_id: server_id.into(),
            user_id: target.id,
            user_name: target.name.clone(),
            moderator_id,
            kind,
            reason: reason.into(),
            resolved: kind.auto_resolved(),
        }
    }
}

/// A staff duty shift.
#[derive(Debug, Clone)]
pub struct Shift {
    /// Unique shift ID.
    pub id: i64,
    /// Server the shift belongs to.
    pub server_id: String,
    /// Member's Roblox id.
    pub user_id: i64,
    /// Start timestamp (epoch milliseconds).
    pub start_time: i64,
    /// End timestamp (epoch milliseconds). None while active.
    pub end_time: Option<i64>,
    /// Completed length in seconds. None while active.
    pub duration_secs: Option<i64>,
}

impl Shift {
    pub fn is_active(&self) -> bool {
        self.end_time.is_none()
    }

    /// Seconds elapsed since the shift started.
    pub fn elapsed_secs(&self, now_ms: i64) -> i64 {
        ((now_ms - self.start_time) / 1000).max(0)
    }
}

/// Data for opening a new shift.
#[derive(Debug, Clone)]
pub struct NewShift {
    pub server_id: String,
    pub user_id: i64,
    /// Start timestamp (epoch milliseconds).
    pub start_time: i64,
}

impl NewShift {
    pub fn new(server_id: impl Into<String>, user_id: i64, start_time: i64) -> Self {
        Self {
            server_id: server_id.into(),
            user_id,
            start_time,
        }
    }
}

/// Record of one `:shutdown` issued in game, kept for later display.
#[derive(Debug, Clone)]
pub struct ShutdownEvent {
    /// Unique event ID.
    pub id: String,
    /// Server that was shut down.
    pub server_id: String,
    /// When the shutdown was issued (epoch milliseconds).
    pub timestamp: i64,
    /// Issuer's Roblox id.
    pub initiator_id: i64,
    /// Issuer's display name.
    pub initiator_name: String,
    /// How many active shifts the shutdown closed.
    pub shifts_ended: i64,
    /// Roblox ids whose shifts were closed.
    pub affected_user_ids: Vec<i64>,
}

impl ShutdownEvent {
    /// Create an event with a fresh id.
    pub fn new(
        server_id: impl Into<String>,
        timestamp: i64,
        initiator: &PlayerRef,
        affected_user_ids: Vec<i64>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            server_id: server_id.into(),
            timestamp,
            initiator_id: initiator.id,
            initiator_name: initiator.name.clone(),
            shifts_ended: affected_user_ids.len() as i64,
            affected_user_ids,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_kind_round_trip() {
        for kind in [LogKind::Join, LogKind::Kill, LogKind::Command] {
            assert_eq!(LogKind::from_str(kind.as_str()).unwrap(), kind);
        }
    }

    #[test]
    fn test_log_kind_from_str_unknown() {
        assert!(LogKind::from_str("vehicle").is_err());
    }

    #[test]
    fn test_player_ref_parse() {
        let player = PlayerRef::parse("VexTrex:1234567").unwrap();
        assert_eq!(player.name, "VexTrex");
        assert_eq!(player.id, 1234567);
    }

    #[test]
    fn test_player_ref_parse_name_with_colon() {
        let player = PlayerRef::parse("a:b:42").unwrap();
        assert_eq!(player.name, "a:b");
        assert_eq!(player.id, 42);
    }

    #[test]
    fn test_player_ref_parse_invalid() {
        assert!(PlayerRef::parse("NoColonHere").is_none());
        assert!(PlayerRef::parse("Name:NotANumber").is_none());
        assert!(PlayerRef::parse(":42").is_none());
    }

    #[test]
    fn test_log_details_kind() {
        let details = LogDetails::Join {
            player: PlayerRef::new("A", 1),
            joined: false,
        };
        assert_eq!(details.kind(), LogKind::Join);
    }

    #[test]
    fn test_new_log_entry_key() {
        let entry = NewLogEntry::new(
            "srv",
            1_700_000_000,
            LogDetails::Command {
                player: PlayerRef::new("A", 1),
                command: ":h".to_string(),
            },
        );
        assert_eq!(entry.key(), (LogKind::Command, 1_700_000_000));
    }

    #[test]
    fn test_log_details_json_round_trip() {
        let details = LogDetails::Kill {
            killer: PlayerRef::new("A", 1),
            victim: PlayerRef::new("B", 2),
        };
        let json = serde_json::to_string(&details).unwrap();
        let back: LogDetails = serde_json::from_str(&json).unwrap();
        assert_eq!(back, details);
    }

    #[test]
    fn test_punishment_kind_strings() {
        assert_eq!(PunishmentKind::BanBolo.as_str(), "Ban Bolo");
        assert_eq!(PunishmentKind::from_str("bolo").unwrap(), PunishmentKind::BanBolo);
        assert_eq!(PunishmentKind::from_str("Ban Bolo").unwrap(), PunishmentKind::BanBolo);
        assert_eq!(PunishmentKind::from_str("WARN").unwrap(), PunishmentKind::Warn);
    }

    #[test]
    fn test_punishment_kind_auto_resolved() {
        assert!(PunishmentKind::Warn.auto_resolved());
        assert!(PunishmentKind::Kick.auto_resolved());
        assert!(PunishmentKind::Ban.auto_resolved());
        assert!(!PunishmentKind::BanBolo.auto_resolved());
    }

    #[test]
    fn test_new_punishment_from_target() {
        let target = PlayerRef::new("JaneDoe", 555);
        let p = NewPunishment::new("srv", &target, 99, PunishmentKind::BanBolo, "reason");
        assert_eq!(p.user_id, 555);
        assert_eq!(p.user_name, "JaneDoe");
        assert!(!p.resolved);
    }

    #[test]
    fn test_shift_elapsed() {
        let shift = Shift {
            id: 1,
            server_id: "srv".to_string(),
            user_id: 7,
            start_time: 10_000,
            end_time: None,
            duration_secs: None,
        };
        assert!(shift.is_active());
        assert_eq!(shift.elapsed_secs(25_000), 15);
        assert_eq!(shift.elapsed_secs(5_000), 0);
    }

    #[test]
    fn test_shutdown_event_counts_affected() {
        let initiator = PlayerRef::new("Op", 1);
        let event = ShutdownEvent::new("srv", 1000, &initiator, vec![2, 3, 4]);
        assert_eq!(event.shifts_ended, 3);
        assert!(!event.id.is_empty());
    }
}

//! Wire types for the upstream control API.
//!
//! Response fields arrive PascalCase, with player identities as combined
//! `"Name:Id"` strings. These types mirror the wire exactly; normalization
//! into store records happens in the ingestion pipeline.

use serde::{Deserialize, Serialize};

use crate::store::PlayerRef;

/// `GET /server` response.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ServerStatus {
    pub name: String,
    pub owner_id: i64,
    pub current_players: i64,
    pub max_players: i64,
    pub join_key: String,
}

/// One entry of the `GET /server/players` response.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Player {
    /// Combined `"Name:Id"` identity.
    pub player: String,
    /// Upstream permission label, e.g. "Server Administrator".
    pub permission: String,
    pub team: String,
    pub callsign: Option<String>,
}

impl Player {
    /// Split the combined identity field.
    pub fn player_ref(&self) -> Option<PlayerRef> {
        PlayerRef::parse(&self.player)
    }
}

/// One entry of the `GET /server/joinlogs` response.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct JoinLogRaw {
    /// True for a join, false for a leave.
    pub join: bool,
    /// Event time (epoch seconds).
    pub timestamp: i64,
    /// Combined `"Name:Id"` identity.
    pub player: String,
}

/// One entry of the `GET /server/killlogs` response.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct KillLogRaw {
    /// Combined `"Name:Id"` identity of the victim.
    pub killed: String,
    /// Event time (epoch seconds).
    pub timestamp: i64,
    /// Combined `"Name:Id"` identity of the killer.
    pub killer: String,
}

/// One entry of the `GET /server/commandlogs` response.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CommandLogRaw {
    /// Combined `"Name:Id"` identity.
    pub player: String,
    /// Event time (epoch seconds).
    pub timestamp: i64,
    /// Full command text including the leading `:`.
    pub command: String,
}

/// `POST /server/command` request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRequest {
    pub command: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_players() {
        let json = r#"[
            {"Player": "VexTrex:1234567", "Permission": "Server Administrator", "Team": "Police", "Callsign": "1A-01"},
            {"Player": "JohnSmith123:42", "Permission": "Normal", "Team": "Civilian"}
        ]"#;
        let players: Vec<Player> = serde_json::from_str(json).unwrap();

        assert_eq!(players.len(), 2);
        let first = players[0].player_ref().unwrap();
        assert_eq!(first.name, "VexTrex");
        assert_eq!(first.id, 1234567);
        assert_eq!(players[0].callsign.as_deref(), Some("1A-01"));
        assert!(players[1].callsign.is_none());
    }

    #[test]
    fn test_deserialize_join_logs() {
        let json = r#"[
            {"Join": true, "Timestamp": 1700000000, "Player": "A:1"},
            {"Join": false, "Timestamp": 1700000060, "Player": "B:2"}
        ]"#;
        let logs: Vec<JoinLogRaw> = serde_json::from_str(json).unwrap();

        assert!(logs[0].join);
        assert!(!logs[1].join);
        assert_eq!(logs[1].timestamp, 1_700_000_060);
    }

    #[test]
    fn test_deserialize_kill_logs() {
        let json = r#"[{"Killed": "B:2", "Timestamp": 1700000000, "Killer": "A:1"}]"#;
        let logs: Vec<KillLogRaw> = serde_json::from_str(json).unwrap();
        assert_eq!(logs[0].killer, "A:1");
        assert_eq!(logs[0].killed, "B:2");
    }

    #[test]
    fn test_deserialize_server_status_ignores_unknown_fields() {
        let json = r#"{"Name": "Test", "OwnerId": 7, "CurrentPlayers": 3, "MaxPlayers": 40, "JoinKey": "abc", "TeamBalance": true}"#;
        let status: ServerStatus = serde_json::from_str(json).unwrap();
        assert_eq!(status.name, "Test");
        assert_eq!(status.current_players, 3);
    }

    #[test]
    fn test_command_request_wire_shape() {
        let body = serde_json::to_string(&CommandRequest {
            command: ":pm A hello".to_string(),
        })
        .unwrap();
        assert_eq!(body, r#"{"command":":pm A hello"}"#);
    }
}

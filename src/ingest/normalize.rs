//! Normalization of raw upstream log records.
//!
//! Combined `"Name:Id"` fields are split here; everything downstream works
//! with tagged [`LogDetails`] variants and typed [`PlayerRef`]s. A record
//! whose identity fields do not parse is dropped with a warning.

use tracing::warn;

use crate::gateway::{CommandLogRaw, JoinLogRaw, KillLogRaw};
use crate::store::{LogDetails, NewLogEntry, PlayerRef};

pub fn normalize_join(server_id: &str, raw: &JoinLogRaw) -> Option<NewLogEntry> {
    let Some(player) = PlayerRef::parse(&raw.player) else {
        warn!("unparseable join log player {:?} on {}", raw.player, server_id);
        return None;
    };
    Some(NewLogEntry::new(
        server_id,
        raw.timestamp,
        LogDetails::Join {
            player,
            joined: raw.join,
        },
    ))
}

pub fn normalize_kill(server_id: &str, raw: &KillLogRaw) -> Option<NewLogEntry> {
    let (Some(killer), Some(victim)) =
        (PlayerRef::parse(&raw.killer), PlayerRef::parse(&raw.killed))
    else {
        warn!(
            "unparseable kill log ({:?} -> {:?}) on {}",
            raw.killer, raw.killed, server_id
        );
        return None;
    };
    Some(NewLogEntry::new(
        server_id,
        raw.timestamp,
        LogDetails::Kill { killer, victim },
    ))
}

pub fn normalize_command(server_id: &str, raw: &CommandLogRaw) -> Option<NewLogEntry> {
    let Some(player) = PlayerRef::parse(&raw.player) else {
        warn!(
            "unparseable command log player {:?} on {}",
            raw.player, server_id
        );
        return None;
    };
    Some(NewLogEntry::new(
        server_id,
        raw.timestamp,
        LogDetails::Command {
            player,
            command: raw.command.clone(),
        },
    ))
}

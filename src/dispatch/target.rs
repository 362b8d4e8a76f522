//! Punishment target resolution.
//!
//! A punishment command names its target by a case-insensitive substring of
//! the player name. The online roster is searched first; when nobody online
//! matches, recent leave events are searched so a player cannot dodge a
//! punishment by quitting.

use crate::gateway::Player;
use crate::store::{LogDetails, LogEntry, PlayerRef};

/// Maximum candidate names echoed back on an ambiguous query.
const MAX_CANDIDATES_LISTED: usize = 3;

/// Outcome of matching a target query against the server.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetResolution {
    /// Exactly one online player matched.
    Online(PlayerRef),
    /// Nobody online matched, but exactly one recent leaver did.
    RecentlyLeft(PlayerRef),
    /// More than one player matched; holds up to three candidate names.
    Ambiguous(Vec<String>),
    /// No online or recently-left player matched.
    NoMatch,
}

/// Resolve `query` against the online roster, falling back to recent leave
/// events. `recent_leaves` must be ordered most recent first; only the latest
/// leave per player id is considered.
pub fn resolve_target(
    roster: &[Player],
    recent_leaves: &[LogEntry],
    query: &str,
) -> TargetResolution {
    let needle = query.to_lowercase();

    let online: Vec<PlayerRef> = roster
        .iter()
        .filter_map(|p| p.player_ref())
        .filter(|p| p.name.to_lowercase().contains(&needle))
        .collect();
    match online.as_slice() {
        [] => {}
        [single] => return TargetResolution::Online(single.clone()),
        many => return ambiguous(many),
    }

    let mut seen = std::collections::HashSet::new();
    let left: Vec<PlayerRef> = recent_leaves
        .iter()
        .filter_map(|entry| match &entry.details {
            LogDetails::Join {
                player,
                joined: false,
            } => Some(player.clone()),
            _ => None,
        })
        .filter(|p| seen.insert(p.id))
        .filter(|p| p.name.to_lowercase().contains(&needle))
        .collect();
    match left.as_slice() {
        [] => TargetResolution::NoMatch,
        [single] => TargetResolution::RecentlyLeft(single.clone()),
        many => ambiguous(many),
    }
}

fn ambiguous(candidates: &[PlayerRef]) -> TargetResolution {
    TargetResolution::Ambiguous(
        candidates
            .iter()
            .take(MAX_CANDIDATES_LISTED)
            .map(|p| p.name.clone())
            .collect(),
    )
}

//! Parser for the in-game moderation mini language.
//!
//! Staff drive moderation from the game's chat: `:log shift start`,
//! `:log warn somePlayer reckless driving`, `:shutdown`. Keywords are
//! case-insensitive; anything that is not a `:log`/`:shutdown` command is
//! ignored entirely.

use crate::store::PunishmentKind;

/// Reason recorded when a punishment command carries none.
pub const DEFAULT_REASON: &str = "No reason provided";

/// A parsed in-game moderation command.
#[derive(Debug, Clone, PartialEq)]
pub enum GameCommand {
    /// `:log shift start`
    ShiftStart,
    /// `:log shift end`
    ShiftEnd,
    /// `:log shift status`
    ShiftStatus,
    /// `:log <warn|kick|ban|bolo> <target> [reason...]`
    Punish {
        kind: PunishmentKind,
        /// Substring to match against player names.
        query: String,
        reason: String,
    },
    /// `:shutdown [anything]`
    Shutdown,
    /// A `:log` command with an unrecognized or incomplete verb.
    Unknown { verb: String },
}

/// Parse one command-log line.
///
/// Returns None when the line is not addressed to the moderation system at
/// all. Malformed `:log` commands parse to [`GameCommand::Unknown`] so the
/// issuer can be sent a usage hint.
pub fn parse_game_command(input: &str) -> Option<GameCommand> {
    let mut tokens = input.split_whitespace();
    let head = tokens.next()?.to_lowercase();

    if head == ":shutdown" {
        return Some(GameCommand::Shutdown);
    }
    if head != ":log" {
        return None;
    }

    let Some(verb) = tokens.next() else {
        return Some(GameCommand::Unknown {
            verb: String::new(),
        });
    };

    match verb.to_lowercase().as_str() {
        "shift" => {
            let sub = tokens.next().map(|s| s.to_lowercase());
            match sub.as_deref() {
                Some("start") => Some(GameCommand::ShiftStart),
                Some("end") => Some(GameCommand::ShiftEnd),
                Some("status") => Some(GameCommand::ShiftStatus),
                Some(other) => Some(GameCommand::Unknown {
                    verb: format!("shift {other}"),
                }),
                None => Some(GameCommand::Unknown {
                    verb: "shift".to_string(),
                }),
            }
        }
        punish @ ("warn" | "kick" | "ban" | "bolo") => {
            let kind = match punish {
                "warn" => PunishmentKind::Warn,
                "kick" => PunishmentKind::Kick,
                "ban" => PunishmentKind::Ban,
                _ => PunishmentKind::BanBolo,
            };
            let Some(query) = tokens.next() else {
                return Some(GameCommand::Unknown {
                    verb: punish.to_string(),
                });
            };
            let reason: Vec<&str> = tokens.collect();
            let reason = if reason.is_empty() {
                DEFAULT_REASON.to_string()
            } else {
                reason.join(" ")
            };
            Some(GameCommand::Punish {
                kind,
                query: query.to_string(),
                reason,
            })
        }
        other => Some(GameCommand::Unknown {
            verb: other.to_string(),
        }),
    }
}

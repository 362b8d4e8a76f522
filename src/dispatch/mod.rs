//! In-game command handling.
//!
//! Staff moderate from inside the game through chat commands that surface in
//! the command log stream. [`command`] parses them, [`target`] resolves
//! punishment targets against the roster, and [`dispatcher`] executes them.

pub mod command;
pub mod dispatcher;
pub mod target;

pub use command::{parse_game_command, GameCommand, DEFAULT_REASON};
pub use dispatcher::CommandDispatcher;
pub use target::{resolve_target, TargetResolution};

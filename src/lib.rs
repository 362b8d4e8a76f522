//! Warden - game server moderation bridge
//!
//! Polls ER:LC game servers through the rate-limited control API, keeps a
//! deduplicated moderation record, and executes staff commands issued from
//! in-game chat.

pub mod config;
pub mod datetime;
pub mod dispatch;
pub mod error;
pub mod gateway;
pub mod hooks;
pub mod ingest;
pub mod logging;
pub mod store;

pub use config::{Config, ServerEntry};
pub use dispatch::{parse_game_command, CommandDispatcher, GameCommand, TargetResolution};
pub use error::{Result, WardenError};
pub use gateway::{
    credential_hash, AlertSink, ApiRequest, ApiResponse, Gateway, HttpTransport,
    RateLimitRegistry, UpstreamTransport, WaitPlan,
};
pub use hooks::{
    AutomationHook, Entitlements, MessageQueue, OutboundMessage, RaidDetector, ServerPlan,
};
pub use ingest::{IngestPipeline, Poller, RaidFilter};
#[cfg(feature = "sqlite")]
pub use store::SqliteStore;
pub use store::{MemoryStore, ModerationStore};

//! Gateway to the upstream game-server control API.
//!
//! Owns per-credential rate-limit state and request serialization. All
//! upstream traffic in the crate goes through [`Gateway`].

pub mod alert;
pub mod client;
pub mod queue;
pub mod rate_limit;
pub mod transport;
pub mod types;

pub use alert::{AlertSink, IncidentKind, RateLimitIncident};
pub use client::Gateway;
pub use queue::RequestQueues;
pub use rate_limit::{credential_hash, RateLimitRegistry, RateState, WaitPlan};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Method, UpstreamTransport};
pub use types::{CommandLogRaw, CommandRequest, JoinLogRaw, KillLogRaw, Player, ServerStatus};

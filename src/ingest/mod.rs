//! Log ingestion.
//!
//! [`normalize`] turns raw upstream records into typed entries, [`pipeline`]
//! runs the fetch/dedup/persist/fan-out cycle, [`raid`] screens new command
//! logs, and [`poller`] drives the whole thing on a timer.

pub mod normalize;
pub mod pipeline;
pub mod poller;
pub mod raid;

pub use normalize::{normalize_command, normalize_join, normalize_kill};
pub use pipeline::IngestPipeline;
pub use poller::{Poller, DEFAULT_POLL_INTERVAL_SECS};
pub use raid::RaidFilter;

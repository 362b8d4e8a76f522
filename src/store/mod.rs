//! Persistent moderation record for Warden.
//!
//! This module defines the [`ModerationStore`] trait consumed by the
//! ingestion pipeline and command dispatcher, plus the backends that
//! implement it: [`MemoryStore`] for tests and [`SqliteStore`] for
//! production.

pub mod memory;
#[cfg(feature = "sqlite")]
pub mod schema;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod types;

pub use memory::MemoryStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
pub use types::{
    LogDetails, LogEntry, LogKey, LogKind, Member, NewLogEntry, NewMember, NewPunishment,
    NewShift, PlayerRef, Punishment, PunishmentKind, Shift, ShutdownEvent,
};

use std::collections::HashSet;

use async_trait::async_trait;

use crate::Result;

/// Store operations consumed by the pipeline and dispatcher.
///
/// Implementations are shared behind an `Arc` and called from concurrent
/// per-server poll cycles, so every method takes `&self`.
#[async_trait]
pub trait ModerationStore: Send + Sync {
    /// Return the subset of `keys` already persisted for `server_id`.
    ///
    /// Used for bulk dedup before inserting a polled batch.
    async fn existing_log_keys(
        &self,
        server_id: &str,
        keys: &[LogKey],
    ) -> Result<HashSet<LogKey>>;

    /// Insert a log entry.
    ///
    /// Returns None when an entry with the same `(server, kind, timestamp)`
    /// key already exists. Inserting a duplicate is not an error.
    async fn insert_log(&self, entry: &NewLogEntry) -> Result<Option<LogEntry>>;

    /// Leave events for `server_id` with an upstream timestamp at or after
    /// `since_secs` (epoch seconds), most recent first.
    async fn recent_leaves(&self, server_id: &str, since_secs: i64) -> Result<Vec<LogEntry>>;

    /// Look up a registered member by server and Roblox id.
    async fn find_member(&self, server_id: &str, user_id: i64) -> Result<Option<Member>>;

    /// Register a member.
    async fn insert_member(&self, member: &NewMember) -> Result<Member>;

    /// Record a punishment.
    async fn insert_punishment(&self, punishment: &NewPunishment) -> Result<Punishment>;

    /// The member's active shift on `server_id`, if any.
    async fn active_shift(&self, server_id: &str, user_id: i64) -> Result<Option<Shift>>;

    /// All active shifts on `server_id`.
    async fn active_shifts(&self, server_id: &str) -> Result<Vec<Shift>>;

    /// Open a shift.
    async fn insert_shift(&self, shift: &NewShift) -> Result<Shift>;

    /// Close a shift by id.
    ///
    /// Returns the updated shift, or None if no shift with that id exists.
    async fn end_shift(&self, id: i64, end_time: i64, duration_secs: i64)
        -> Result<Option<Shift>>;

    /// Shifts of one member on `server_id` started at or after `since_ms`
    /// (epoch milliseconds), active ones included.
    async fn shifts_started_since(
        &self,
        server_id: &str,
        user_id: i64,
        since_ms: i64,
    ) -> Result<Vec<Shift>>;

    /// Record a shutdown event.
    async fn insert_shutdown_event(&self, event: &ShutdownEvent) -> Result<()>;
}

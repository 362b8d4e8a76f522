//! In-memory moderation store.
//!
//! Backs tests and short-lived tooling. Data lives in a single `RwLock`ed
//! struct and is lost on drop.

use std::collections::HashSet;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::store::types::{
    LogDetails, LogEntry, LogKey, Member, NewLogEntry, NewMember, NewPunishment, NewShift,
    Punishment, Shift, ShutdownEvent,
};
use crate::store::ModerationStore;
use crate::{Result, WardenError};

use crate::datetime::now_ms;

#[derive(Default)]
struct Inner {
    logs: Vec<LogEntry>,
    members: Vec<Member>,
    punishments: Vec<Punishment>,
    shifts: Vec<Shift>,
    shutdown_events: Vec<ShutdownEvent>,
    next_log_id: i64,
    next_punishment_id: i64,
    next_shift_id: i64,
}

fn next_id(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

/// In-memory [`ModerationStore`] implementation.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|_| WardenError::Database("store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|_| WardenError::Database("store lock poisoned".to_string()))
    }

    /// Snapshot of all persisted log entries.
    pub fn logs(&self) -> Vec<LogEntry> {
        self.read().map(|i| i.logs.clone()).unwrap_or_default()
    }

    /// Snapshot of all recorded punishments.
    pub fn punishments(&self) -> Vec<Punishment> {
        self.read()
            .map(|i| i.punishments.clone())
            .unwrap_or_default()
    }

    /// Snapshot of all shifts, active and completed.
    pub fn shifts(&self) -> Vec<Shift> {
        self.read().map(|i| i.shifts.clone()).unwrap_or_default()
    }

    /// Snapshot of all recorded shutdown events.
    pub fn shutdown_events(&self) -> Vec<ShutdownEvent> {
        self.read()
            .map(|i| i.shutdown_events.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ModerationStore for MemoryStore {
    async fn existing_log_keys(
        &self,
        server_id: &str,
        keys: &[LogKey],
    ) -> Result<HashSet<LogKey>> {
        let wanted: HashSet<LogKey> = keys.iter().copied().collect();
        let inner = self.read()?;
        Ok(inner
            .logs
            .iter()
            .filter(|log| log.server_id == server_id)
            .map(|log| (log.kind(), log.prc_timestamp))
            .filter(|key| wanted.contains(key))
            .collect())
    }

    async fn insert_log(&self, entry: &NewLogEntry) -> Result<Option<LogEntry>> {
        let mut inner = self.write()?;
        let duplicate = inner.logs.iter().any(|log| {
            log.server_id == entry.server_id
                && log.kind() == entry.kind()
                && log.prc_timestamp == entry.prc_timestamp
        });
        if duplicate {
            return Ok(None);
        }

        let log = LogEntry {
            id: next_id(&mut inner.next_log_id),
            server_id: entry.server_id.clone(),
            prc_timestamp: entry.prc_timestamp,
            details: entry.details.clone(),
            created_at: now_ms(),
        };
        inner.logs.push(log.clone());
        Ok(Some(log))
    }

    async fn recent_leaves(&self, server_id: &str, since_secs: i64) -> Result<Vec<LogEntry>> {
        let inner = self.read()?;
        let mut leaves: Vec<LogEntry> = inner
            .logs
            .iter()
            .filter(|log| log.server_id == server_id && log.prc_timestamp >= since_secs)
            .filter(|log| matches!(log.details, LogDetails::Join { joined: false, .. }))
            .cloned()
            .collect();
        leaves.sort_by(|a, b| b.prc_timestamp.cmp(&a.prc_timestamp));
        Ok(leaves)
    }

    async fn find_member(&self, server_id: &str, user_id: i64) -> Result<Option<Member>> {
        let inner = self.read()?;
        Ok(inner
            .members
            .iter()
            .find(|m| m.server_id == server_id && m.user_id == user_id)
            .cloned())
    }

    async fn insert_member(&self, member: &NewMember) -> Result<Member> {
        let mut inner = self.write()?;
        let exists = inner
            .members
            .iter()
            .any(|m| m.server_id == member.server_id && m.user_id == member.user_id);
        if exists {
            return Err(WardenError::Validation(format!(
                "member {} already registered on {}",
                member.user_id, member.server_id
            )));
        }

        let member = Member {
            user_id: member.user_id,
            server_id: member.server_id.clone(),
            username: member.username.clone(),
            role: member.role.clone(),
            discord_id: member.discord_id.clone(),
            quota_minutes: member.quota_minutes,
        };
        inner.members.push(member.clone());
        Ok(member)
    }

    async fn insert_punishment(&self, punishment: &NewPunishment) -> Result<Punishment> {
        let mut inner = self.write()?;
        let punishment = Punishment {
            id: next_id(&mut inner.next_punishment_id),
            server_id: punishment.server_id.clone(),
            user_id: punishment.user_id,
            user_name: punishment.user_name.clone(),
            moderator_id: punishment.moderator_id,
            kind: punishment.kind,
            reason: punishment.reason.clone(),
            resolved: punishment.resolved,
            created_at: now_ms(),
        };
        inner.punishments.push(punishment.clone());
        Ok(punishment)
    }

    async fn active_shift(&self, server_id: &str, user_id: i64) -> Result<Option<Shift>> {
        let inner = self.read()?;
        Ok(inner
            .shifts
            .iter()
            .find(|s| s.server_id == server_id && s.user_id == user_id && s.is_active())
            .cloned())
    }

    async fn active_shifts(&self, server_id: &str) -> Result<Vec<Shift>> {
        let inner = self.read()?;
        Ok(inner
            .shifts
            .iter()
            .filter(|s| s.server_id == server_id && s.is_active())
            .cloned()
            .collect())
    }

    async fn insert_shift(&self, shift: &NewShift) -> Result<Shift> {
        let mut inner = self.write()?;
        let shift = Shift {
            id: next_id(&mut inner.next_shift_id),
            server_id: shift.server_id.clone(),
            user_id: shift.user_id,
            start_time: shift.start_time,
            end_time: None,
            duration_secs: None,
        };
        inner.shifts.push(shift.clone());
        Ok(shift)
    }

    async fn end_shift(
        &self,
        id: i64,
        end_time: i64,
        duration_secs: i64,
    ) -> Result<Option<Shift>> {
        let mut inner = self.write()?;
        let Some(shift) = inner.shifts.iter_mut().find(|s| s.id == id) else {
            return Ok(None);
        };
        shift.end_time = Some(end_time);
        shift.duration_secs = Some(duration_secs);
        Ok(Some(shift.clone()))
    }

    async fn shifts_started_since(
        &self,
        server_id: &str,
        user_id: i64,
        since_ms: i64,
    ) -> Result<Vec<Shift>> {
        let inner = self.read()?;
        let mut shifts: Vec<Shift> = inner
            .shifts
            .iter()
            .filter(|s| {
                s.server_id == server_id && s.user_id == user_id && s.start_time >= since_ms
            })
            .cloned()
            .collect();
        shifts.sort_by_key(|s| s.start_time);
        Ok(shifts)
    }

    async fn insert_shutdown_event(&self, event: &ShutdownEvent) -> Result<()> {
        let mut inner = self.write()?;
        inner.shutdown_events.push(event.clone());
        Ok(())
    }
}

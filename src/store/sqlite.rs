//! SQLite moderation store.
//!
//! This module provides SQLite connectivity and migration management, plus
//! the production [`ModerationStore`] implementation.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::Row;
use tracing::{debug, info};

use crate::datetime::now_ms;
use crate::store::schema::MIGRATIONS;
use crate::store::types::{
    LogDetails, LogEntry, LogKey, LogKind, Member, NewLogEntry, NewMember, NewPunishment,
    NewShift, Punishment, Shift, ShutdownEvent,
};
use crate::store::ModerationStore;
use crate::{Result, WardenError};

/// SQLite-backed [`ModerationStore`].
///
/// Wraps a connection pool; clones share the pool.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open a database at the specified path.
    ///
    /// If the database file doesn't exist, it will be created.
    /// Migrations are automatically applied.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening database at {:?}", path);

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Self::migrate(&pool).await?;
        Ok(Self { pool })
    }

    /// Open an in-memory database for testing.
    pub async fn open_in_memory() -> Result<Self> {
        debug!("Opening in-memory database");
        let options = SqliteConnectOptions::new().in_memory(true).foreign_keys(true);

        // A single never-expiring connection; the database lives and dies
        // with it.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::migrate(&pool).await?;
        Ok(Self { pool })
    }

    /// Get a reference to the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Get the current schema version.
    pub async fn schema_version(&self) -> Result<i64> {
        let version: i64 =
            sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_version")
                .fetch_one(&self.pool)
                .await?;
        Ok(version)
    }

    /// Apply pending migrations.
    async fn migrate(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version     INTEGER PRIMARY KEY,
                applied_at  TEXT NOT NULL DEFAULT (datetime('now'))
            )",
        )
        .execute(pool)
        .await?;

        let current: i64 =
            sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_version")
                .fetch_one(pool)
                .await?;

        if current as usize >= MIGRATIONS.len() {
            debug!("Database is up to date (version {})", current);
            return Ok(());
        }

        info!(
            "Migrating database from version {} to {}",
            current,
            MIGRATIONS.len()
        );

        for (i, migration) in MIGRATIONS.iter().enumerate().skip(current as usize) {
            let version = (i + 1) as i64;
            info!("Applying migration v{}", version);

            let mut tx = pool.begin().await?;
            sqlx::raw_sql(migration).execute(&mut *tx).await?;
            sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
                .bind(version)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;

            debug!("Migration v{} applied successfully", version);
        }

        Ok(())
    }
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish()
    }
}

fn log_from_row(row: &SqliteRow) -> Result<LogEntry> {
    let details: String = row.try_get("details")?;
    let details: LogDetails = serde_json::from_str(&details)
        .map_err(|e| WardenError::Database(format!("bad log details payload: {e}")))?;
    Ok(LogEntry {
        id: row.try_get("id")?,
        server_id: row.try_get("server_id")?,
        prc_timestamp: row.try_get("prc_timestamp")?,
        details,
        created_at: row.try_get("created_at")?,
    })
}

fn member_from_row(row: &SqliteRow) -> Result<Member> {
    Ok(Member {
        user_id: row.try_get("user_id")?,
        server_id: row.try_get("server_id")?,
        username: row.try_get("username")?,
        role: row.try_get("role")?,
        discord_id: row.try_get("discord_id")?,
        quota_minutes: row.try_get("quota_minutes")?,
    })
}

fn shift_from_row(row: &SqliteRow) -> Result<Shift> {
    Ok(Shift {
        id: row.try_get("id")?,
        server_id: row.try_get("server_id")?,
        user_id: row.try_get("user_id")?,
        start_time: row.try_get("start_time")?,
        end_time: row.try_get("end_time")?,
        duration_secs: row.try_get("duration_secs")?,
    })
}

#[async_trait]
impl ModerationStore for SqliteStore {
    async fn existing_log_keys(
        &self,
        server_id: &str,
        keys: &[LogKey],
    ) -> Result<HashSet<LogKey>> {
        if keys.is_empty() {
            return Ok(HashSet::new());
        }

        let wanted: HashSet<LogKey> = keys.iter().copied().collect();
        let timestamps: HashSet<i64> = keys.iter().map(|(_, ts)| *ts).collect();

        let placeholders = vec!["?"; timestamps.len()].join(", ");
        let sql = format!(
            "SELECT kind, prc_timestamp FROM logs
             WHERE server_id = ? AND prc_timestamp IN ({placeholders})"
        );

        let mut query = sqlx::query(&sql).bind(server_id);
        for ts in timestamps {
            query = query.bind(ts);
        }
        let rows = query.fetch_all(&self.pool).await?;

        let mut found = HashSet::new();
        for row in rows {
            let kind: String = row.try_get("kind")?;
            let kind: LogKind = kind.parse().map_err(WardenError::Database)?;
            let key = (kind, row.try_get::<i64, _>("prc_timestamp")?);
            if wanted.contains(&key) {
                found.insert(key);
            }
        }
        Ok(found)
    }

    async fn insert_log(&self, entry: &NewLogEntry) -> Result<Option<LogEntry>> {
        let created_at = now_ms();
        let details = serde_json::to_string(&entry.details)
            .map_err(|e| WardenError::Database(format!("serialize log details: {e}")))?;

        let result = sqlx::query(
            "INSERT OR IGNORE INTO logs (server_id, kind, prc_timestamp, details, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&entry.server_id)
        .bind(entry.kind().as_str())
        .bind(entry.prc_timestamp)
        .bind(&details)
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        Ok(Some(LogEntry {
            id: result.last_insert_rowid(),
            server_id: entry.server_id.clone(),
            prc_timestamp: entry.prc_timestamp,
            details: entry.details.clone(),
            created_at,
        }))
    }

    async fn recent_leaves(&self, server_id: &str, since_secs: i64) -> Result<Vec<LogEntry>> {
        let rows = sqlx::query(
            "SELECT id, server_id, prc_timestamp, details, created_at FROM logs
             WHERE server_id = ? AND kind = 'join' AND prc_timestamp >= ?
             ORDER BY prc_timestamp DESC",
        )
        .bind(server_id)
        .bind(since_secs)
        .fetch_all(&self.pool)
        .await?;

        let mut leaves = Vec::new();
        for row in &rows {
            let entry = log_from_row(row)?;
            if matches!(entry.details, LogDetails::Join { joined: false, .. }) {
                leaves.push(entry);
            }
        }
        Ok(leaves)
    }

    async fn find_member(&self, server_id: &str, user_id: i64) -> Result<Option<Member>> {
        let row = sqlx::query(
            "SELECT user_id, server_id, username, role, discord_id, quota_minutes
             FROM members WHERE server_id = ? AND user_id = ?",
        )
        .bind(server_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| member_from_row(&r)).transpose()
    }

    async fn insert_member(&self, member: &NewMember) -> Result<Member> {
        sqlx::query(
            "INSERT INTO members (user_id, server_id, username, role, discord_id, quota_minutes)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(member.user_id)
        .bind(&member.server_id)
        .bind(&member.username)
        .bind(&member.role)
        .bind(&member.discord_id)
        .bind(member.quota_minutes)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if e.as_database_error()
                .is_some_and(|d| d.is_unique_violation())
            {
                WardenError::Validation(format!(
                    "member {} already registered on {}",
                    member.user_id, member.server_id
                ))
            } else {
                WardenError::from(e)
            }
        })?;

        Ok(Member {
            user_id: member.user_id,
            server_id: member.server_id.clone(),
            username: member.username.clone(),
            role: member.role.clone(),
            discord_id: member.discord_id.clone(),
            quota_minutes: member.quota_minutes,
        })
    }

    async fn insert_punishment(&self, punishment: &NewPunishment) -> Result<Punishment> {
        let created_at = now_ms();
        let result = sqlx::query(
            "INSERT INTO punishments
                (server_id, user_id, user_name, moderator_id, kind, reason, resolved, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&punishment.server_id)
        .bind(punishment.user_id)
        .bind(&punishment.user_name)
        .bind(punishment.moderator_id)
        .bind(punishment.kind.as_str())
        .bind(&punishment.reason)
        .bind(punishment.resolved)
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        Ok(Punishment {
            id: result.last_insert_rowid(),
            server_id: punishment.server_id.clone(),
            user_id: punishment.user_id,
            user_name: punishment.user_name.clone(),
            moderator_id: punishment.moderator_id,
            kind: punishment.kind,
            reason: punishment.reason.clone(),
            resolved: punishment.resolved,
            created_at,
        })
    }

    async fn active_shift(&self, server_id: &str, user_id: i64) -> Result<Option<Shift>> {
        let row = sqlx::query(
            "SELECT id, server_id, user_id, start_time, end_time, duration_secs
             FROM shifts
             WHERE server_id = ? AND user_id = ? AND end_time IS NULL
             LIMIT 1",
        )
        .bind(server_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| shift_from_row(&r)).transpose()
    }

    async fn active_shifts(&self, server_id: &str) -> Result<Vec<Shift>> {
        let rows = sqlx::query(
            "SELECT id, server_id, user_id, start_time, end_time, duration_secs
             FROM shifts
             WHERE server_id = ? AND end_time IS NULL",
        )
        .bind(server_id)
        .fetch_all(&self.pool)
        .await?;

        let mut shifts = Vec::new();
        for row in &rows {
            shifts.push(shift_from_row(row)?);
        }
        Ok(shifts)
    }

    async fn insert_shift(&self, shift: &NewShift) -> Result<Shift> {
        let result = sqlx::query(
            "INSERT INTO shifts (server_id, user_id, start_time) VALUES (?, ?, ?)",
        )
        .bind(&shift.server_id)
        .bind(shift.user_id)
        .bind(shift.start_time)
        .execute(&self.pool)
        .await?;

        Ok(Shift {
            id: result.last_insert_rowid(),
            server_id: shift.server_id.clone(),
            user_id: shift.user_id,
            start_time: shift.start_time,
            end_time: None,
            duration_secs: None,
        })
    }

    async fn end_shift(
        &self,
        id: i64,
        end_time: i64,
        duration_secs: i64,
    ) -> Result<Option<Shift>> {
        let result = sqlx::query("UPDATE shifts SET end_time = ?, duration_secs = ? WHERE id = ?")
            .bind(end_time)
            .bind(duration_secs)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        let row = sqlx::query(
            "SELECT id, server_id, user_id, start_time, end_time, duration_secs
             FROM shifts WHERE id = ?",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(Some(shift_from_row(&row)?))
    }

    async fn shifts_started_since(
        &self,
        server_id: &str,
        user_id: i64,
        since_ms: i64,
    ) -> Result<Vec<Shift>> {
        let rows = sqlx::query(
            "SELECT id, server_id, user_id, start_time, end_time, duration_secs
             FROM shifts
             WHERE server_id = ? AND user_id = ? AND start_time >= ?
             ORDER BY start_time",
        )
        .bind(server_id)
        .bind(user_id)
        .bind(since_ms)
        .fetch_all(&self.pool)
        .await?;

        let mut shifts = Vec::new();
        for row in &rows {
            shifts.push(shift_from_row(row)?);
        }
        Ok(shifts)
    }

    async fn insert_shutdown_event(&self, event: &ShutdownEvent) -> Result<()> {
        let affected = serde_json::to_string(&event.affected_user_ids)
            .map_err(|e| WardenError::Database(format!("serialize affected ids: {e}")))?;

        sqlx::query(
            "INSERT INTO shutdown_events
                (id, server_id, timestamp, initiator_id, initiator_name, shifts_ended, affected_user_ids)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&event.id)
        .bind(&event.server_id)
        .bind(event.timestamp)
        .bind(event.initiator_id)
        .bind(&event.initiator_name)
        .bind(event.shifts_ended)
        .bind(&affected)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::types::{PlayerRef, PunishmentKind};

    fn leave_entry(server_id: &str, name: &str, id: i64, ts: i64) -> NewLogEntry {
        NewLogEntry::new(
            server_id,
            ts,
            LogDetails::Join {
                player: PlayerRef::new(name, id),
                joined: false,
            },
        )
    }

    #[tokio::test]
    async fn test_open_in_memory_applies_migrations() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        assert_eq!(
            store.schema_version().await.unwrap() as usize,
            MIGRATIONS.len()
        );
    }

    #[tokio::test]
    async fn test_insert_log_dedup() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        let entry = leave_entry("srv", "A", 1, 1000);

        assert!(store.insert_log(&entry).await.unwrap().is_some());
        assert!(store.insert_log(&entry).await.unwrap().is_none());

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM logs")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_details_survive_round_trip() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        store
            .insert_log(&leave_entry("srv", "JaneDoe", 555, 2000))
            .await
            .unwrap();

        let leaves = store.recent_leaves("srv", 1000).await.unwrap();
        assert_eq!(leaves.len(), 1);
        match &leaves[0].details {
            LogDetails::Join { player, joined } => {
                assert_eq!(player.name, "JaneDoe");
                assert_eq!(player.id, 555);
                assert!(!joined);
            }
            other => panic!("unexpected details: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_recent_leaves_excludes_joins_and_old_entries() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        store.insert_log(&leave_entry("srv", "Old", 1, 100)).await.unwrap();
        store.insert_log(&leave_entry("srv", "New", 2, 900)).await.unwrap();
        store
            .insert_log(&NewLogEntry::new(
                "srv",
                950,
                LogDetails::Join {
                    player: PlayerRef::new("Joiner", 3),
                    joined: true,
                },
            ))
            .await
            .unwrap();

        let leaves = store.recent_leaves("srv", 500).await.unwrap();
        assert_eq!(leaves.len(), 1);
        assert_eq!(leaves[0].prc_timestamp, 900);
    }

    #[tokio::test]
    async fn test_existing_log_keys() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        store.insert_log(&leave_entry("srv", "A", 1, 1000)).await.unwrap();

        let keys = vec![(LogKind::Join, 1000), (LogKind::Kill, 1000), (LogKind::Join, 2000)];
        let existing = store.existing_log_keys("srv", &keys).await.unwrap();
        assert_eq!(existing.len(), 1);
        assert!(existing.contains(&(LogKind::Join, 1000)));
    }

    #[tokio::test]
    async fn test_member_round_trip() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        let member = NewMember::new(42, "srv", "Mod", "Moderator")
            .with_discord_id("9001")
            .with_quota_minutes(600);
        store.insert_member(&member).await.unwrap();

        let found = store.find_member("srv", 42).await.unwrap().unwrap();
        assert_eq!(found.username, "Mod");
        assert_eq!(found.discord_id.as_deref(), Some("9001"));
        assert_eq!(found.quota_minutes, 600);

        let duplicate = store.insert_member(&member).await;
        assert!(matches!(duplicate, Err(WardenError::Validation(_))));
    }

    #[tokio::test]
    async fn test_punishment_round_trip() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        let target = PlayerRef::new("JaneDoe", 555);
        let new = NewPunishment::new("srv", &target, 99, PunishmentKind::BanBolo, "test");

        let punishment = store.insert_punishment(&new).await.unwrap();
        assert!(punishment.id > 0);
        assert!(!punishment.resolved);

        let (kind, resolved): (String, bool) =
            sqlx::query_as("SELECT kind, resolved FROM punishments WHERE id = ?")
                .bind(punishment.id)
                .fetch_one(store.pool())
                .await
                .unwrap();
        assert_eq!(kind, "Ban Bolo");
        assert!(!resolved);
    }

    #[tokio::test]
    async fn test_shift_lifecycle() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        let shift = store
            .insert_shift(&NewShift::new("srv", 42, 1_000))
            .await
            .unwrap();
        assert!(store.active_shift("srv", 42).await.unwrap().is_some());

        let ended = store.end_shift(shift.id, 61_000, 60).await.unwrap().unwrap();
        assert_eq!(ended.duration_secs, Some(60));
        assert!(store.active_shift("srv", 42).await.unwrap().is_none());

        assert!(store.end_shift(999, 1, 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_shutdown_event_round_trip() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        let initiator = PlayerRef::new("Op", 1);
        let event = ShutdownEvent::new("srv", 5000, &initiator, vec![2, 3]);
        store.insert_shutdown_event(&event).await.unwrap();

        let (shifts_ended, affected): (i64, String) = sqlx::query_as(
            "SELECT shifts_ended, affected_user_ids FROM shutdown_events WHERE id = ?",
        )
        .bind(&event.id)
        .fetch_one(store.pool())
        .await
        .unwrap();
        assert_eq!(shifts_ended, 2);
        assert_eq!(affected, "[2,3]");
    }

    #[tokio::test]
    async fn test_open_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");

        {
            let store = SqliteStore::open(&db_path).await.unwrap();
            store
                .insert_log(&leave_entry("srv", "A", 1, 1000))
                .await
                .unwrap();
        }

        // Reopen: data persists, migrations are not reapplied
        {
            let store = SqliteStore::open(&db_path).await.unwrap();
            assert_eq!(
                store.schema_version().await.unwrap() as usize,
                MIGRATIONS.len()
            );
            assert!(store.insert_log(&leave_entry("srv", "A", 1, 1000)).await.unwrap().is_none());
        }
    }
}

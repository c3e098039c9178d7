//! SQLite database operations for the leaderboard service.
//!
//! Two independent tables: `users` holds the current count per tracked user,
//! `monthly_stats` holds one snapshot per (user, month). Snapshots outlive the
//! user they belong to.

use crate::error::StoreError;
use crate::period::PeriodKey;
use leaderboard_types::{CurrentRecord, PeriodSnapshot};
use parking_lot::{Mutex, MutexGuard};
use rusqlite::{Connection, OptionalExtension};

pub type StoreResult<T> = Result<T, StoreError>;

pub struct Db {
    conn: Mutex<Connection>,
}

impl Db {
    pub fn open(path: &str) -> StoreResult<Self> {
        let conn = if path == ":memory:" {
            Connection::open_in_memory()?
        } else {
            Connection::open(path)?
        };
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.create_tables()?;
        Ok(db)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }

    fn create_tables(&self) -> StoreResult<()> {
        let conn = self.conn();

        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                username TEXT PRIMARY KEY,
                problems_solved INTEGER NOT NULL DEFAULT 0,
                added_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS monthly_stats (
                username TEXT NOT NULL,
                problems_solved INTEGER NOT NULL,
                month TEXT NOT NULL,
                recorded_at TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE(username, month)
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_monthly_stats_month ON monthly_stats(month)",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS service_state (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            )",
            [],
        )?;

        Ok(())
    }

    // =====================================================
    // Identity Operations
    // =====================================================

    /// Register a user with their initial count in a single insert. Fails
    /// with `AlreadyExists` if the user is tracked; the primary key makes this
    /// atomic.
    pub fn create_identity(&self, username: &str, count: u64) -> StoreResult<()> {
        let conn = self.conn();
        let now = chrono::Utc::now().to_rfc3339();
        match conn.execute(
            "INSERT INTO users (username, problems_solved, added_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)",
            rusqlite::params![username, to_sql_count(count), now],
        ) {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
            {
                Err(StoreError::AlreadyExists(username.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Untrack a user. Their monthly snapshots are kept.
    pub fn delete_identity(&self, username: &str) -> StoreResult<()> {
        let conn = self.conn();
        let rows = conn.execute("DELETE FROM users WHERE username = ?1", [username])?;
        if rows == 0 {
            return Err(StoreError::NotFound(username.to_string()));
        }
        Ok(())
    }

    pub fn identity_exists(&self, username: &str) -> StoreResult<bool> {
        let conn = self.conn();
        let found = conn
            .query_row("SELECT 1 FROM users WHERE username = ?1", [username], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    pub fn list_identities(&self) -> StoreResult<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT username FROM users ORDER BY username ASC")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }

    // =====================================================
    // Count Operations
    // =====================================================

    /// Write the current count and the snapshot for `period` in one
    /// transaction. Fails with `NotFound`, writing nothing, if the user is not
    /// tracked.
    pub fn record_count(&self, username: &str, period: &PeriodKey, count: u64) -> StoreResult<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let now = chrono::Utc::now().to_rfc3339();

        let rows = tx.execute(
            "UPDATE users SET problems_solved = ?1, updated_at = ?2 WHERE username = ?3",
            rusqlite::params![to_sql_count(count), now, username],
        )?;
        if rows == 0 {
            return Err(StoreError::NotFound(username.to_string()));
        }
        write_snapshot(&tx, username, period, count, &now)?;

        tx.commit()?;
        Ok(())
    }

    /// Insert or replace a snapshot without touching the current record
    #[cfg(test)]
    pub fn upsert_snapshot(&self, username: &str, period: &PeriodKey, count: u64) -> StoreResult<()> {
        let conn = self.conn();
        let now = chrono::Utc::now().to_rfc3339();
        write_snapshot(&conn, username, period, count, &now)
    }

    pub fn get_current_counts(&self) -> StoreResult<Vec<(String, u64)>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT username, problems_solved FROM users")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, from_sql_count(row.get(1)?))))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn get_current_records(&self) -> StoreResult<Vec<CurrentRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT username, problems_solved, added_at, updated_at
             FROM users ORDER BY username ASC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(CurrentRecord {
                    username: row.get(0)?,
                    problems_solved: from_sql_count(row.get(1)?),
                    added_at: row.get(2)?,
                    updated_at: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn get_snapshots(&self, period: &PeriodKey) -> StoreResult<Vec<(String, u64)>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT username, problems_solved FROM monthly_stats WHERE month = ?1")?;
        let rows = stmt
            .query_map([period.to_string()], |row| {
                Ok((row.get::<_, String>(0)?, from_sql_count(row.get(1)?)))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn get_snapshot_rows(&self, period: &PeriodKey) -> StoreResult<Vec<PeriodSnapshot>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT username, problems_solved, month, recorded_at
             FROM monthly_stats WHERE month = ?1 ORDER BY username ASC",
        )?;
        let rows = stmt
            .query_map([period.to_string()], |row| {
                Ok(PeriodSnapshot {
                    username: row.get(0)?,
                    problems_solved: from_sql_count(row.get(1)?),
                    period: row.get(2)?,
                    recorded_at: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Months that have at least one snapshot, newest first
    pub fn list_periods(&self) -> StoreResult<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT DISTINCT month FROM monthly_stats ORDER BY month DESC")?;
        let months = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(months)
    }

    // =====================================================
    // Service State
    // =====================================================

    pub fn get_state(&self, key: &str) -> StoreResult<Option<String>> {
        let conn = self.conn();
        let value = conn
            .query_row("SELECT value FROM service_state WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    pub fn set_state(&self, key: &str, value: &str) -> StoreResult<()> {
        let conn = self.conn();
        let now = chrono::Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO service_state (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            rusqlite::params![key, value, now],
        )?;
        Ok(())
    }

    /// Run raw SQL against the store, for fault injection in tests
    #[cfg(test)]
    pub fn execute_batch(&self, sql: &str) -> StoreResult<()> {
        self.conn().execute_batch(sql)?;
        Ok(())
    }
}

fn write_snapshot(
    conn: &Connection,
    username: &str,
    period: &PeriodKey,
    count: u64,
    now: &str,
) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO monthly_stats (username, problems_solved, month, recorded_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(username, month) DO UPDATE SET
            problems_solved = excluded.problems_solved,
            recorded_at = excluded.recorded_at",
        rusqlite::params![username, to_sql_count(count), period.to_string(), now],
    )?;
    Ok(())
}

fn to_sql_count(count: u64) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

fn from_sql_count(raw: i64) -> u64 {
    u64::try_from(raw).unwrap_or(0)
}

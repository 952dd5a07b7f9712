use crate::error::{Result, StorageError};
use chrono::{DateTime, Utc};
use ospulse_common::types::{MonitoredService, ServiceState};
use ospulse_search::SavedSearch;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS monitored_services (
    host TEXT NOT NULL,
    name TEXT NOT NULL,
    state TEXT NOT NULL,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (host, name)
);
CREATE TABLE IF NOT EXISTS saved_searches (
    uuid TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    index_prefix TEXT NOT NULL,
    query TEXT NOT NULL,
    aggs TEXT,
    last_start INTEGER,
    last_end INTEGER
);
";

/// SQLite-backed store for monitored-service rows and saved-search
/// watermarks.
pub struct StatusStore {
    conn: Mutex<Connection>,
}

fn millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
}

impl StatusStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Lock the connection, recovering from a poisoned Mutex if necessary.
    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn list_services(&self) -> Result<Vec<MonitoredService>> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare("SELECT host, name, state FROM monitored_services ORDER BY host, name")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut services = Vec::new();
        for row in rows {
            let (host, name, state) = row?;
            let state = state
                .parse::<ServiceState>()
                .map_err(StorageError::InvalidState)?;
            services.push(MonitoredService { host, name, state });
        }
        Ok(services)
    }

    /// Insert a newly discovered service row. Fails if the (host, name)
    /// pair already exists.
    pub fn create_service(&self, service: &MonitoredService) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO monitored_services (host, name, state, updated_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                service.host,
                service.name,
                service.state.to_string(),
                Utc::now().timestamp_millis()
            ],
        )?;
        Ok(())
    }

    pub fn update_state(&self, host: &str, name: &str, state: ServiceState) -> Result<()> {
        let conn = self.lock();
        let updated = conn.execute(
            "UPDATE monitored_services SET state = ?1, updated_at = ?2
             WHERE host = ?3 AND name = ?4",
            params![state.to_string(), Utc::now().timestamp_millis(), host, name],
        )?;
        if updated == 0 {
            return Err(StorageError::NotFound {
                entity: "monitored_service",
                id: format!("{host}/{name}"),
            });
        }
        Ok(())
    }

    pub fn get_saved_search(&self, uuid: &str) -> Result<SavedSearch> {
        let conn = self.lock();
        let row = conn
            .query_row(
                "SELECT uuid, name, index_prefix, query, aggs, last_start, last_end
                 FROM saved_searches WHERE uuid = ?1",
                params![uuid],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, Option<i64>>(5)?,
                        row.get::<_, Option<i64>>(6)?,
                    ))
                },
            )
            .optional()?
            .ok_or_else(|| StorageError::NotFound {
                entity: "saved_search",
                id: uuid.to_string(),
            })?;

        let (uuid, name, index_prefix, query, aggs, last_start, last_end) = row;
        Ok(SavedSearch {
            uuid,
            name,
            index_prefix,
            query: serde_json::from_str::<Value>(&query)?,
            aggs: aggs.map(|a| serde_json::from_str::<Value>(&a)).transpose()?,
            last_start: last_start.and_then(from_millis),
            last_end: last_end.and_then(from_millis),
        })
    }

    /// Insert a saved search if no row with its uuid exists yet. Existing
    /// rows (and their watermarks) are left untouched.
    pub fn seed_saved_search(&self, search: &SavedSearch) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT OR IGNORE INTO saved_searches
             (uuid, name, index_prefix, query, aggs, last_start, last_end)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                search.uuid,
                search.name,
                search.index_prefix,
                serde_json::to_string(&search.query)?,
                search
                    .aggs
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()?,
                search.last_start.map(millis),
                search.last_end.map(millis),
            ],
        )?;
        Ok(())
    }

    /// Advance a saved search's recency window. Called only after a run
    /// completed without error.
    pub fn update_search_window(
        &self,
        uuid: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.lock();
        let updated = conn.execute(
            "UPDATE saved_searches SET last_start = ?1, last_end = ?2 WHERE uuid = ?3",
            params![millis(start), millis(end), uuid],
        )?;
        if updated == 0 {
            return Err(StorageError::NotFound {
                entity: "saved_search",
                id: uuid.to_string(),
            });
        }
        Ok(())
    }
}

use super::traits::{Storage, StorageError, StoredEvent};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use duckdb::{Connection, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// DuckDB implementation of the Storage trait
pub struct DuckDbStorage {
    conn: Arc<Mutex<Connection>>,
}

impl DuckDbStorage {
    /// Open (or create) a database file
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StorageError::Database(format!(
                        "failed to create directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let conn = Connection::open(path).map_err(|e| {
            let message = e.to_string();
            if message.contains("Could not set lock") {
                tracing::error!(
                    path = %path.display(),
                    "Database is locked by another process"
                );
            }
            StorageError::Database(message)
        })?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory DuckDB storage instance (for testing)
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>, StorageError> {
    conn.lock()
        .map_err(|_| StorageError::Database("connection mutex poisoned".to_string()))
}

fn from_micros(us: i64) -> Result<DateTime<Utc>, StorageError> {
    DateTime::from_timestamp_micros(us)
        .ok_or_else(|| StorageError::InvalidData(format!("timestamp out of range: {}", us)))
}

/// Stored timestamps have microsecond precision
fn truncate_to_micros(at: DateTime<Utc>) -> Result<DateTime<Utc>, StorageError> {
    from_micros(at.timestamp_micros())
}

const EVENT_COLUMNS: &str = "event_id, manager_id, source, status, generation_id, message_index, \
                             starts_at_us, full_data, ingested_at_us";

fn event_from_row(row: &Row<'_>) -> Result<StoredEvent, StorageError> {
    let event_id: String = row.get(0)?;
    let starts_at_us: Option<i64> = row.get(6)?;
    let full_data: String = row.get(7)?;

    Ok(StoredEvent {
        event_id: Uuid::parse_str(&event_id)
            .map_err(|e| StorageError::InvalidData(format!("bad event id {}: {}", event_id, e)))?,
        manager_id: row.get(1)?,
        source: row.get(2)?,
        status: row.get(3)?,
        generation_id: row.get(4)?,
        message_index: row.get(5)?,
        starts_at: starts_at_us.map(from_micros).transpose()?,
        full_data: serde_json::from_str(&full_data)?,
        ingested_at: from_micros(row.get::<_, i64>(8)?)?,
    })
}

fn read_problem_started_at(
    conn: &Connection,
    manager_id: &str,
) -> Result<Option<DateTime<Utc>>, StorageError> {
    let mut stmt = conn.prepare(
        "SELECT last_collection_problem_started_at_us FROM managers WHERE manager_id = ?",
    )?;
    let mut rows = stmt.query(duckdb::params![manager_id])?;

    match rows.next()? {
        Some(row) => {
            let started: Option<i64> = row.get(0)?;
            started.map(from_micros).transpose()
        }
        None => Ok(None),
    }
}

fn write_problem_started_at(
    conn: &Connection,
    manager_id: &str,
    started_at: Option<DateTime<Utc>>,
) -> Result<(), StorageError> {
    conn.execute(
        "INSERT OR REPLACE INTO managers (manager_id, last_collection_problem_started_at_us)
         VALUES (?, ?)",
        duckdb::params![manager_id, started_at.map(|t| t.timestamp_micros())],
    )?;
    Ok(())
}

#[async_trait]
impl Storage for DuckDbStorage {
    async fn init_schema(&self) -> Result<(), StorageError> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || -> Result<(), StorageError> {
            let conn = lock(&conn)?;

            conn.execute("CREATE SEQUENCE IF NOT EXISTS events_seq START 1", [])?;

            conn.execute(
                "CREATE TABLE IF NOT EXISTS events (
                    event_seq BIGINT PRIMARY KEY DEFAULT nextval('events_seq'),
                    event_id UUID NOT NULL,
                    manager_id VARCHAR NOT NULL,
                    source VARCHAR NOT NULL,
                    status VARCHAR NOT NULL,
                    generation_id VARCHAR,
                    message_index UBIGINT,
                    starts_at_us BIGINT,
                    full_data VARCHAR NOT NULL,
                    ingested_at_us BIGINT NOT NULL
                )",
                [],
            )?;

            conn.execute(
                "CREATE INDEX IF NOT EXISTS idx_events_manager_source ON events(manager_id, source)",
                [],
            )?;

            conn.execute(
                "CREATE TABLE IF NOT EXISTS managers (
                    manager_id VARCHAR PRIMARY KEY,
                    last_collection_problem_started_at_us BIGINT
                )",
                [],
            )?;

            Ok(())
        })
        .await
        .map_err(|e| StorageError::Database(format!("Task join error: {}", e)))?
    }

    async fn write_events(&self, events: &[StoredEvent]) -> Result<(), StorageError> {
        if events.is_empty() {
            return Ok(());
        }

        let conn = self.conn.clone();
        let events = events.to_vec();

        tokio::task::spawn_blocking(move || -> Result<(), StorageError> {
            let mut conn = lock(&conn)?;
            let tx = conn.transaction()?;

            {
                let mut stmt = tx.prepare(
                    "INSERT INTO events (event_id, manager_id, source, status, generation_id,
                                         message_index, starts_at_us, full_data, ingested_at_us)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )?;

                for event in events {
                    let full_data = serde_json::to_string(&event.full_data)?;
                    stmt.execute(duckdb::params![
                        event.event_id.to_string(),
                        event.manager_id,
                        event.source,
                        event.status,
                        event.generation_id,
                        event.message_index,
                        event.starts_at.map(|t| t.timestamp_micros()),
                        full_data,
                        event.ingested_at.timestamp_micros(),
                    ])?;
                }
            }

            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(|e| StorageError::Database(format!("Task join error: {}", e)))?
    }

    async fn last_stamped_event(
        &self,
        manager_id: &str,
        source: &str,
    ) -> Result<Option<StoredEvent>, StorageError> {
        let conn = self.conn.clone();
        let manager_id = manager_id.to_string();
        let source = source.to_string();

        tokio::task::spawn_blocking(move || -> Result<Option<StoredEvent>, StorageError> {
            let conn = lock(&conn)?;
            let sql = format!(
                "SELECT {} FROM events
                 WHERE manager_id = ? AND source = ? AND generation_id IS NOT NULL
                 ORDER BY event_seq DESC
                 LIMIT 1",
                EVENT_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(duckdb::params![manager_id, source])?;

            match rows.next()? {
                Some(row) => Ok(Some(event_from_row(row)?)),
                None => Ok(None),
            }
        })
        .await
        .map_err(|e| StorageError::Database(format!("Task join error: {}", e)))?
    }

    async fn recent_events(
        &self,
        manager_id: &str,
        limit: usize,
    ) -> Result<Vec<StoredEvent>, StorageError> {
        let conn = self.conn.clone();
        let manager_id = manager_id.to_string();

        tokio::task::spawn_blocking(move || -> Result<Vec<StoredEvent>, StorageError> {
            let conn = lock(&conn)?;
            let sql = format!(
                "SELECT {} FROM events
                 WHERE manager_id = ?
                 ORDER BY event_seq DESC
                 LIMIT {}",
                EVENT_COLUMNS, limit
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(duckdb::params![manager_id])?;

            let mut events = Vec::new();
            while let Some(row) = rows.next()? {
                events.push(event_from_row(row)?);
            }
            Ok(events)
        })
        .await
        .map_err(|e| StorageError::Database(format!("Task join error: {}", e)))?
    }

    async fn collection_problem_started_at(
        &self,
        manager_id: &str,
    ) -> Result<Option<DateTime<Utc>>, StorageError> {
        let conn = self.conn.clone();
        let manager_id = manager_id.to_string();

        tokio::task::spawn_blocking(move || -> Result<Option<DateTime<Utc>>, StorageError> {
            let conn = lock(&conn)?;
            read_problem_started_at(&conn, &manager_id)
        })
        .await
        .map_err(|e| StorageError::Database(format!("Task join error: {}", e)))?
    }

    async fn start_collection_problem(
        &self,
        manager_id: &str,
        at: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, StorageError> {
        let conn = self.conn.clone();
        let manager_id = manager_id.to_string();

        tokio::task::spawn_blocking(move || -> Result<DateTime<Utc>, StorageError> {
            // Holding the connection lock across read and write serialises
            // concurrent readers of the same manager.
            let conn = lock(&conn)?;
            if let Some(started) = read_problem_started_at(&conn, &manager_id)? {
                return Ok(started);
            }

            let started = truncate_to_micros(at)?;
            write_problem_started_at(&conn, &manager_id, Some(started))?;
            Ok(started)
        })
        .await
        .map_err(|e| StorageError::Database(format!("Task join error: {}", e)))?
    }

    async fn clear_collection_problem(
        &self,
        manager_id: &str,
    ) -> Result<Option<DateTime<Utc>>, StorageError> {
        let conn = self.conn.clone();
        let manager_id = manager_id.to_string();

        tokio::task::spawn_blocking(move || -> Result<Option<DateTime<Utc>>, StorageError> {
            let conn = lock(&conn)?;
            let previous = read_problem_started_at(&conn, &manager_id)?;
            write_problem_started_at(&conn, &manager_id, None)?;
            Ok(previous)
        })
        .await
        .map_err(|e| StorageError::Database(format!("Task join error: {}", e)))?
    }
}

//! Mailbox watermark — last observed mailbox size and check time.
//!
//! New-message detection compares the stored size against the live mailbox
//! size; message identifiers are never stored individually. Rows are
//! append-only so the table doubles as a poll history. The absence of any
//! row is a distinct first-run state, not a zero count.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, params};
use tracing::info;

use crate::error::DatabaseError;

/// Last observed mailbox state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Watermark {
    pub count: u64,
    pub observed_at: DateTime<Utc>,
}

/// Outcome of comparing the stored watermark against the live mailbox size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delta {
    /// First run: adopt the current size without processing the backlog.
    Bootstrap,
    /// Stored count >= current count; nothing to fetch.
    UpToDate,
    /// `delta` new messages, assumed to be the last `delta` entries of the
    /// ordered id listing (append-only mailbox assumption).
    NewMessages { delta: u64 },
}

/// Pure delta computation; persistence ordering is the poller's concern.
pub fn compute_delta(stored: Option<&Watermark>, current: u64) -> Delta {
    match stored {
        None => Delta::Bootstrap,
        Some(w) if current > w.count => Delta::NewMessages {
            delta: current - w.count,
        },
        Some(_) => Delta::UpToDate,
    }
}

/// Watermark persistence.
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    /// Most recently appended watermark, or `None` on first run.
    async fn read_last(&self) -> Result<Option<Watermark>, DatabaseError>;

    /// Append a new watermark row.
    async fn append(&self, count: u64, observed_at: DateTime<Utc>) -> Result<(), DatabaseError>;
}

/// libSQL-backed watermark store.
pub struct LibSqlWatermarkStore {
    #[allow(dead_code)]
    db: Arc<libsql::Database>,
    conn: Connection,
}

impl LibSqlWatermarkStore {
    /// Open (or create) a local database file and ensure the schema.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Connection(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Connection(format!("Failed to open database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Connection(format!("Failed to create connection: {e}")))?;

        let store = Self {
            db: Arc::new(db),
            conn,
        };
        store.init_schema().await?;
        info!(path = %path.display(), "Watermark database opened");
        Ok(store)
    }

    /// Create an in-memory store (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Connection(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Connection(format!("Failed to create connection: {e}")))?;

        let store = Self {
            db: Arc::new(db),
            conn,
        };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), DatabaseError> {
        self.conn
            .execute(
                "CREATE TABLE IF NOT EXISTS mail_watermark (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    mail_count INTEGER NOT NULL,
                    observed_at TEXT NOT NULL
                )",
                (),
            )
            .await
            .map_err(|e| DatabaseError::Migration(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl WatermarkStore for LibSqlWatermarkStore {
    async fn read_last(&self) -> Result<Option<Watermark>, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                "SELECT mail_count, observed_at FROM mail_watermark ORDER BY id DESC LIMIT 1",
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?
        else {
            return Ok(None);
        };

        let count: i64 = row.get(0).map_err(|e| DatabaseError::Query(e.to_string()))?;
        let observed_str: String = row.get(1).map_err(|e| DatabaseError::Query(e.to_string()))?;

        Ok(Some(Watermark {
            count: count.max(0) as u64,
            observed_at: parse_datetime(&observed_str),
        }))
    }

    async fn append(&self, count: u64, observed_at: DateTime<Utc>) -> Result<(), DatabaseError> {
        self.conn
            .execute(
                "INSERT INTO mail_watermark (mail_count, observed_at) VALUES (?1, ?2)",
                params![count as i64, observed_at.to_rfc3339()],
            )
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;
        Ok(())
    }
}

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

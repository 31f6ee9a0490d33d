//! Append-only audit trail of authentication and verification attempts
//!
//! Every request handled by the pipeline produces exactly one
//! [`AuditRecord`], written once through an [`AuditStore`]. Rows are never
//! updated or deleted, and identical records are stored as separate rows.

use crate::error::PersistError;
use crate::registry::DeviceSession;
use chrono::{SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use strum_macros::Display;
use tracing::info;

use crate::constants::{ACCESS_CHANNEL, VERIFY_CHANNEL};

/// Which kind of request produced a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    #[strum(to_string = "verify")]
    Verify,
    #[strum(to_string = "access")]
    Access,
    #[strum(to_string = "none")]
    None,
}

impl Topic {
    /// Map an inbound channel name to its topic
    pub fn from_channel(channel: &str) -> Self {
        match channel {
            VERIFY_CHANNEL => Topic::Verify,
            ACCESS_CHANNEL => Topic::Access,
            _ => Topic::None,
        }
    }

    fn from_column(value: &str) -> Option<Self> {
        match value {
            "verify" => Some(Topic::Verify),
            "access" => Some(Topic::Access),
            "none" => Some(Topic::None),
            _ => None,
        }
    }
}

/// One audit entry, built fresh for each request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub username: String,
    pub password: String,
    pub auth_state: bool,
    pub topic: Topic,
    pub uid_tag: Option<String>,
    pub tag_state: bool,
    /// ISO 8601, UTC, millisecond precision
    pub timestamp: String,
    pub error: Option<String>,
}

impl AuditRecord {
    /// Start a record for a request arriving on `session`
    pub fn begin(session: &DeviceSession, topic: Topic) -> Self {
        Self {
            username: session.device_id.clone(),
            password: session.secret.clone(),
            auth_state: session.authenticated,
            topic,
            uid_tag: None,
            tag_state: false,
            timestamp: now_iso8601(),
            error: None,
        }
    }

    /// Set the timestamp to the moment the outcome became known
    pub fn stamp(&mut self) {
        self.timestamp = now_iso8601();
    }
}

fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Row id assigned by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RowId(pub i64);

impl std::fmt::Display for RowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A persisted record together with its row id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: RowId,
    #[serde(flatten)]
    pub record: AuditRecord,
}

/// Append-only sink for audit records
pub trait AuditStore: Send + Sync {
    fn append(&self, record: AuditRecord) -> impl Future<Output = Result<RowId, PersistError>> + Send;
}

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS access_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL,
    password TEXT NOT NULL,
    auth_state INTEGER NOT NULL,
    topic TEXT NOT NULL,
    uid_tag TEXT,
    tag_state INTEGER NOT NULL,
    timestamp TEXT NOT NULL,
    error TEXT
)";

/// SQLite-backed audit store
///
/// Clones share one connection. Writes run on the blocking pool so a slow
/// disk does not stall other requests.
#[derive(Clone)]
pub struct SqliteAuditStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteAuditStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, PersistError> {
        let conn = Connection::open(path.as_ref())?;
        let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        info!(journal_mode = %mode, "Audit store opened at {:?}", path.as_ref());
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, PersistError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, PersistError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Newest records first
    pub fn recent(&self, limit: usize) -> Result<Vec<StoredRecord>, PersistError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, username, password, auth_state, topic, uid_tag, tag_state, timestamp, error
             FROM access_logs ORDER BY id DESC LIMIT ?1",
        )?;
        // SQLite takes a signed limit; anything larger means "all rows"
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![limit], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, bool>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, bool>(6)?,
                row.get::<_, String>(7)?,
                row.get::<_, Option<String>>(8)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, username, password, auth_state, topic, uid_tag, tag_state, timestamp, error) = row?;
            let topic = Topic::from_column(&topic).ok_or_else(|| PersistError::CorruptRow {
                id,
                message: format!("unknown topic {:?}", topic),
            })?;
            records.push(StoredRecord {
                id: RowId(id),
                record: AuditRecord {
                    username,
                    password,
                    auth_state,
                    topic,
                    uid_tag,
                    tag_state,
                    timestamp,
                    error,
                },
            });
        }
        Ok(records)
    }

    pub fn count(&self) -> Result<u64, PersistError> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM access_logs", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn insert(conn: &Connection, record: &AuditRecord) -> Result<RowId, PersistError> {
        conn.execute(
            "INSERT INTO access_logs (username, password, auth_state, topic, uid_tag, tag_state, timestamp, error)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.username,
                record.password,
                record.auth_state,
                record.topic.to_string(),
                record.uid_tag,
                record.tag_state,
                record.timestamp,
                record.error,
            ],
        )?;
        Ok(RowId(conn.last_insert_rowid()))
    }
}

impl AuditStore for SqliteAuditStore {
    async fn append(&self, record: AuditRecord) -> Result<RowId, PersistError> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            Self::insert(&conn, &record)
        })
        .await?
    }
}

//! Persisted scan log
//!
//! Every verified scan is appended as one row `(timestamp, "<label> [<code>]")`
//! to a SQLite database. The database and its schema are created on the first
//! append, so a session that scans nothing leaves no file behind. Each append
//! is a single INSERT: the row is either fully written or an error is returned.

use crate::core::error::{Result, ScanError};
use chrono::{DateTime, Local};
use log::{debug, info};
use rusqlite::{params, Connection, OpenFlags};
use std::fs;
use std::path::{Path, PathBuf};

/// Format of the timestamp column
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Bumped whenever the table layout changes
const SCHEMA_VERSION: i32 = 1;

const CREATE_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS scans (
        id        INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp TEXT NOT NULL,
        entry     TEXT NOT NULL
    );
";

/// Durable destination for verified scans
pub trait PersistenceSink: Send {
    /// Append one row
    fn append(&mut self, timestamp: &DateTime<Local>, label: &str, payload: &str) -> Result<()>;
}

/// One stored row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanLogRow {
    pub id: i64,
    pub timestamp: String,
    pub entry: String,
}

/// Composite text stored in the entry column
pub fn format_entry(label: &str, payload: &str) -> String {
    format!("{} [{}]", label, payload)
}

/// SQLite-backed scan log
pub struct ScanLog {
    path: PathBuf,
    conn: Option<Connection>,
}

impl ScanLog {
    /// Log at `path`; nothing is touched on disk until the first append
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            conn: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connection(&mut self) -> Result<&Connection> {
        if self.conn.is_none() {
            let conn = Self::open_and_migrate(&self.path)?;
            self.conn = Some(conn);
        }
        self.conn
            .as_ref()
            .ok_or_else(|| ScanError::Persistence("scan log connection unavailable".to_string()))
    }

    fn open_and_migrate(path: &Path) -> Result<Connection> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    ScanError::Persistence(format!(
                        "Failed to create scan log directory '{}': {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let is_new = !path.exists();
        let mut conn = Connection::open(path).map_err(|e| {
            ScanError::Persistence(format!("Failed to open scan log '{}': {}", path.display(), e))
        })?;
        run_migrations(&mut conn)?;

        if is_new {
            info!("Created scan log at {}", path.display());
        } else {
            debug!("Opened scan log at {}", path.display());
        }
        Ok(conn)
    }

    /// Newest rows first
    ///
    /// A log that was never written reads as empty.
    pub fn recent(&self, limit: usize) -> Result<Vec<ScanLogRow>> {
        let Some(conn) = self.read_connection()? else {
            return Ok(Vec::new());
        };

        let mut stmt = conn.prepare(
            "SELECT id, timestamp, entry FROM scans ORDER BY id DESC LIMIT ?1",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![limit], |row| {
            Ok(ScanLogRow {
                id: row.get(0)?,
                timestamp: row.get(1)?,
                entry: row.get(2)?,
            })
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Number of stored rows
    pub fn count(&self) -> Result<u64> {
        let Some(conn) = self.read_connection()? else {
            return Ok(0);
        };
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM scans", [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    fn read_connection(&self) -> Result<Option<ReadConn<'_>>> {
        if let Some(conn) = self.conn.as_ref() {
            return Ok(Some(ReadConn::Borrowed(conn)));
        }
        if !self.path.exists() {
            return Ok(None);
        }
        let conn = Connection::open_with_flags(&self.path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|e| {
                ScanError::Persistence(format!(
                    "Failed to open scan log '{}': {}",
                    self.path.display(),
                    e
                ))
            })?;
        Ok(Some(ReadConn::Owned(conn)))
    }
}

enum ReadConn<'a> {
    Borrowed(&'a Connection),
    Owned(Connection),
}

impl std::ops::Deref for ReadConn<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        match self {
            ReadConn::Borrowed(conn) => conn,
            ReadConn::Owned(conn) => conn,
        }
    }
}

impl PersistenceSink for ScanLog {
    fn append(&mut self, timestamp: &DateTime<Local>, label: &str, payload: &str) -> Result<()> {
        let stamp = timestamp.format(TIMESTAMP_FORMAT).to_string();
        let entry = format_entry(label, payload);
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO scans (timestamp, entry) VALUES (?1, ?2)",
            params![stamp, entry],
        )
        .map_err(|e| ScanError::Persistence(format!("Failed to append scan: {}", e)))?;
        Ok(())
    }
}

fn run_migrations(conn: &mut Connection) -> Result<()> {
    let version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    if version > SCHEMA_VERSION {
        return Err(ScanError::Persistence(format!(
            "scan log schema version {} is newer than supported version {}",
            version, SCHEMA_VERSION
        )));
    }
    if version < SCHEMA_VERSION {
        let tx = conn.transaction()?;
        tx.execute_batch(CREATE_SCHEMA)?;
        tx.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        tx.commit()?;
        debug!("Migrated scan log schema {} -> {}", version, SCHEMA_VERSION);
    }
    Ok(())
}

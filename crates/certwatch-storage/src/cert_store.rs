use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::error::Result;

/// File name of the database inside the data directory.
pub const DB_FILE_NAME: &str = "data.db";

const CERTIFICATES_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS certificates (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    domain TEXT NOT NULL,
    issuer TEXT,
    subject TEXT,
    not_before DATETIME,
    not_after DATETIME,
    days_remaining INTEGER,
    is_valid BOOLEAN,
    status TEXT,
    serial_number TEXT,
    version INTEGER,
    query_time DATETIME DEFAULT (datetime('now', 'localtime'))
);
CREATE INDEX IF NOT EXISTS idx_certificates_query_time ON certificates(query_time);
";

const WATCHED_DOMAINS_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS watched_domains (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    domain TEXT NOT NULL UNIQUE,
    nickname TEXT,
    added_time DATETIME DEFAULT (datetime('now', 'localtime')),
    last_check_time DATETIME,
    notify_enabled BOOLEAN DEFAULT 0,
    notify_threshold INTEGER DEFAULT 7,
    is_manual BOOLEAN DEFAULT 0,
    manual_expire_date DATETIME,
    manual_start_date DATETIME
);
";

/// Columns added after the first release, applied to databases that lack them.
const ADDED_COLUMNS: &[(&str, &str, &str)] = &[
    ("watched_domains", "notify_enabled", "BOOLEAN DEFAULT 0"),
    ("watched_domains", "notify_threshold", "INTEGER DEFAULT 7"),
    ("watched_domains", "is_manual", "BOOLEAN DEFAULT 0"),
    ("watched_domains", "manual_expire_date", "DATETIME"),
    ("watched_domains", "manual_start_date", "DATETIME"),
    ("certificates", "san_domains", "TEXT"),
];

/// Selects a watchlist row either by primary key or by its unique domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckTarget<'a> {
    Id(i64),
    Domain(&'a str),
}

/// Single-connection SQLite store holding the `certificates` history log and
/// the `watched_domains` table.
///
/// Every public method is one atomic statement (or one lock-protected
/// check-and-write), so the store can be shared as `Arc<CertStore>` across
/// probe tasks.
pub struct CertStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl CertStore {
    /// Opens (creating if needed) `<data_dir>/data.db`.
    pub fn new(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        Self::open(&data_dir.join(DB_FILE_NAME))
    }

    /// Opens the database at an explicit path and brings its schema up to date.
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(CERTIFICATES_SCHEMA)?;
        conn.execute_batch(WATCHED_DOMAINS_SCHEMA)?;
        Self::migrate_added_columns(&conn)?;

        tracing::info!(path = %db_path.display(), "Initialized cert store");
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: db_path.to_path_buf(),
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Lock the connection, recovering from a poisoned Mutex if necessary.
    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn migrate_added_columns(conn: &Connection) -> Result<()> {
        for (table, column, decl) in ADDED_COLUMNS {
            if !Self::table_has_column(conn, table, column)? {
                conn.execute_batch(&format!("ALTER TABLE {table} ADD COLUMN {column} {decl};"))?;
                tracing::info!(table, column, "Added missing column");
            }
        }
        Ok(())
    }

    fn table_has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
        let sql = format!("PRAGMA table_info({table})");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            row.get::<_, String>(1) // column name is at index 1
        })?;
        for row in rows {
            if row? == column {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

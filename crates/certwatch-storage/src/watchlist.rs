use certwatch_common::datetime::{format_canonical, normalize};
use certwatch_common::types::{
    ImportDomainItem, ImportSummary, WatchedDomain, DEFAULT_NOTIFY_THRESHOLD,
    MAX_NOTIFY_THRESHOLD, MIN_NOTIFY_THRESHOLD,
};
use rusqlite::{params, Connection, OptionalExtension};

use crate::cert_store::{CertStore, CheckTarget};
use crate::error::{Result, StorageError};

const WATCHED_COLUMNS: &str = "id, domain, nickname,
    strftime('%Y-%m-%d %H:%M:%S', added_time),
    strftime('%Y-%m-%d %H:%M:%S', last_check_time),
    notify_enabled, notify_threshold, is_manual,
    strftime('%Y-%m-%d %H:%M:%S', manual_expire_date),
    strftime('%Y-%m-%d %H:%M:%S', manual_start_date)";

impl CertStore {
    // ---- watched_domains CRUD ----

    /// Starts watching `domain` with notifications off and the default threshold.
    ///
    /// Fails with [`StorageError::Duplicate`] when the domain is already watched.
    pub fn add_watched(&self, domain: &str, nickname: Option<&str>) -> Result<WatchedDomain> {
        let domain = domain.trim();
        if domain.is_empty() {
            return Err(StorageError::Validation("domain must not be empty".to_string()));
        }
        let nickname = non_empty(nickname);

        let conn = self.conn();
        let id = Self::insert_watched(&conn, domain, nickname)?;
        let watched = Self::query_watched(&conn, CheckTarget::Id(id))?.ok_or_else(|| {
            StorageError::Other(format!("watched domain {domain} could not be read back"))
        })?;
        tracing::info!(domain, id, "Added watched domain");
        Ok(watched)
    }

    /// Inserts each item not yet watched. Failures are counted per item and
    /// never stop the import.
    pub fn import_domains(&self, items: &[ImportDomainItem]) -> ImportSummary {
        let mut summary = ImportSummary {
            total: items.len(),
            ..ImportSummary::default()
        };

        for item in items {
            match self.add_watched(&item.domain, item.nickname.as_deref()) {
                Ok(_) => summary.succeeded += 1,
                Err(e) if e.is_duplicate() => summary.skipped += 1,
                Err(e) => {
                    tracing::warn!(
                        domain = %item.domain,
                        error = %e,
                        "Failed to import watched domain"
                    );
                    summary.failed += 1;
                    summary.failed_domains.push(format!("{} ({e})", item.domain));
                }
            }
        }

        tracing::info!(
            total = summary.total,
            succeeded = summary.succeeded,
            skipped = summary.skipped,
            failed = summary.failed,
            "Imported watched domains"
        );
        summary
    }

    /// All watched domains, most recently added first.
    pub fn list_watched(&self) -> Result<Vec<WatchedDomain>> {
        let conn = self.conn();
        let sql = format!(
            "SELECT {WATCHED_COLUMNS} FROM watched_domains ORDER BY added_time DESC, id DESC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], Self::row_to_watched)?;

        let mut domains = Vec::new();
        for row in rows {
            domains.push(row?);
        }
        Ok(domains)
    }

    pub fn get_watched(&self, id: i64) -> Result<Option<WatchedDomain>> {
        let conn = self.conn();
        Self::query_watched(&conn, CheckTarget::Id(id))
    }

    pub fn get_watched_by_domain(&self, domain: &str) -> Result<Option<WatchedDomain>> {
        let conn = self.conn();
        Self::query_watched(&conn, CheckTarget::Domain(domain))
    }

    /// Returns whether a row was removed; an unknown id is not an error.
    pub fn remove_watched(&self, id: i64) -> Result<bool> {
        let conn = self.conn();
        let affected = conn.execute("DELETE FROM watched_domains WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    }

    pub fn rename_watched(&self, id: i64, nickname: &str) -> Result<bool> {
        let conn = self.conn();
        let affected = conn.execute(
            "UPDATE watched_domains SET nickname = ?1 WHERE id = ?2",
            params![non_empty(Some(nickname)), id],
        )?;
        Ok(affected > 0)
    }

    /// Updates the notify flag and threshold together. The threshold must lie
    /// in `1..=365`; otherwise nothing is written.
    pub fn set_notify_settings(&self, id: i64, enabled: bool, threshold: i64) -> Result<bool> {
        if !(MIN_NOTIFY_THRESHOLD..=MAX_NOTIFY_THRESHOLD).contains(&threshold) {
            return Err(StorageError::Validation(format!(
                "notify threshold must be between {MIN_NOTIFY_THRESHOLD} and \
                 {MAX_NOTIFY_THRESHOLD} days, got {threshold}"
            )));
        }

        let conn = self.conn();
        let affected = conn.execute(
            "UPDATE watched_domains SET notify_enabled = ?1, notify_threshold = ?2 WHERE id = ?3",
            params![enabled, threshold, id],
        )?;
        tracing::info!(id, enabled, threshold, "Updated notify settings");
        Ok(affected > 0)
    }

    /// Switches a watched domain to manually declared validity dates.
    ///
    /// `expire_date` is required; `start_date` may be empty. Both accept
    /// `YYYY-MM-DD` or `YYYY-MM-DD HH:MM:SS`, and a start date must fall
    /// strictly before the expire date.
    pub fn set_manual_cert_info(
        &self,
        id: i64,
        start_date: &str,
        expire_date: &str,
    ) -> Result<bool> {
        let expire = normalize(expire_date)?
            .ok_or_else(|| StorageError::Validation("expire date must not be empty".to_string()))?;
        let start = normalize(start_date)?;

        if let Some(start) = start {
            if start >= expire {
                return Err(StorageError::Validation(
                    "start date must be earlier than expire date".to_string(),
                ));
            }
        }

        let start = start.map(|ts| format_canonical(&ts));
        let expire = format_canonical(&expire);
        let conn = self.conn();
        let affected = conn.execute(
            "UPDATE watched_domains
             SET is_manual = 1, manual_start_date = ?1, manual_expire_date = ?2
             WHERE id = ?3",
            params![start, expire, id],
        )?;
        tracing::info!(id, start = ?start, expire = %expire, "Enabled manual certificate dates");
        Ok(affected > 0)
    }

    /// Returns the entry to live probing and forgets its manual dates.
    pub fn disable_manual(&self, id: i64) -> Result<bool> {
        let conn = self.conn();
        let affected = conn.execute(
            "UPDATE watched_domains
             SET is_manual = 0, manual_expire_date = NULL, manual_start_date = NULL
             WHERE id = ?1",
            params![id],
        )?;
        tracing::info!(id, "Disabled manual certificate dates");
        Ok(affected > 0)
    }

    /// Stamps `last_check_time` with the store-local current time.
    pub fn touch_last_check(&self, target: CheckTarget<'_>) -> Result<bool> {
        let conn = self.conn();
        let affected = match target {
            CheckTarget::Id(id) => conn.execute(
                "UPDATE watched_domains SET last_check_time = datetime('now', 'localtime')
                 WHERE id = ?1",
                params![id],
            )?,
            CheckTarget::Domain(domain) => conn.execute(
                "UPDATE watched_domains SET last_check_time = datetime('now', 'localtime')
                 WHERE domain = ?1",
                params![domain],
            )?,
        };
        Ok(affected > 0)
    }

    fn insert_watched(conn: &Connection, domain: &str, nickname: Option<&str>) -> Result<i64> {
        let exists: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM watched_domains WHERE domain = ?1",
            params![domain],
            |row| row.get(0),
        )?;
        if exists {
            return Err(StorageError::Duplicate {
                domain: domain.to_string(),
            });
        }

        let inserted = conn.execute(
            "INSERT INTO watched_domains
                (domain, nickname, notify_enabled, notify_threshold, is_manual)
             VALUES (?1, ?2, 0, ?3, 0)",
            params![domain, nickname, DEFAULT_NOTIFY_THRESHOLD],
        );
        match inserted {
            Ok(_) => Ok(conn.last_insert_rowid()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StorageError::Duplicate {
                    domain: domain.to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn query_watched(conn: &Connection, target: CheckTarget<'_>) -> Result<Option<WatchedDomain>> {
        let watched = match target {
            CheckTarget::Id(id) => conn
                .query_row(
                    &format!("SELECT {WATCHED_COLUMNS} FROM watched_domains WHERE id = ?1"),
                    params![id],
                    Self::row_to_watched,
                )
                .optional()?,
            CheckTarget::Domain(domain) => conn
                .query_row(
                    &format!("SELECT {WATCHED_COLUMNS} FROM watched_domains WHERE domain = ?1"),
                    params![domain],
                    Self::row_to_watched,
                )
                .optional()?,
        };
        Ok(watched)
    }

    fn row_to_watched(row: &rusqlite::Row<'_>) -> rusqlite::Result<WatchedDomain> {
        let nickname: Option<String> = row.get(2)?;
        Ok(WatchedDomain {
            id: row.get(0)?,
            domain: row.get(1)?,
            nickname: nickname.filter(|n| !n.is_empty()),
            added_time: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
            last_check_time: row.get(4)?,
            notify_enabled: row.get::<_, Option<bool>>(5)?.unwrap_or(false),
            notify_threshold: row
                .get::<_, Option<i64>>(6)?
                .unwrap_or(DEFAULT_NOTIFY_THRESHOLD),
            is_manual: row.get::<_, Option<bool>>(7)?.unwrap_or(false),
            manual_expire_date: row.get(8)?,
            manual_start_date: row.get(9)?,
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

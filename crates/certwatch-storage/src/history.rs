use certwatch_common::types::{CertStatus, CertificateInfo, HistoryRecord};
use rusqlite::params;

use crate::cert_store::CertStore;
use crate::error::Result;

/// Rows returned by [`CertStore::list_history`] when the caller passes no
/// positive limit.
pub const DEFAULT_HISTORY_LIMIT: i64 = 50;

impl CertStore {
    // ---- certificates (history log) ----

    /// Appends one probe result. The query time is assigned by the store.
    pub fn append_history(&self, cert: &CertificateInfo) -> Result<i64> {
        let san_json = serde_json::to_string(&cert.san_domains)?;
        let conn = self.conn();
        conn.execute(
            "INSERT INTO certificates (domain, issuer, subject, not_before, not_after,
                days_remaining, is_valid, status, serial_number, version, san_domains)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                cert.domain,
                cert.issuer,
                cert.subject,
                cert.not_before,
                cert.not_after,
                cert.days_remaining,
                cert.is_valid,
                cert.status.as_str(),
                cert.serial_number,
                cert.version,
                san_json,
            ],
        )?;
        let id = conn.last_insert_rowid();
        tracing::debug!(domain = %cert.domain, id, "Appended certificate to history");
        Ok(id)
    }

    /// Most recent history rows, newest first.
    pub fn list_history(&self, limit: i64) -> Result<Vec<HistoryRecord>> {
        let limit = if limit <= 0 {
            DEFAULT_HISTORY_LIMIT
        } else {
            limit
        };
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, domain, issuer, subject, not_before, not_after, days_remaining,
                    is_valid, status, serial_number, version,
                    strftime('%Y-%m-%d %H:%M:%S', query_time), san_domains
             FROM certificates
             ORDER BY query_time DESC, id DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], |row| Ok(Self::row_to_history(row)))?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row??);
        }
        Ok(records)
    }

    pub fn count_history(&self) -> Result<u64> {
        let conn = self.conn();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM certificates", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Deletes every history row. Returns the number of rows removed.
    pub fn clear_history(&self) -> Result<usize> {
        let conn = self.conn();
        let removed = conn.execute("DELETE FROM certificates", [])?;
        tracing::info!(removed, "Cleared certificate history");
        Ok(removed)
    }

    fn row_to_history(row: &rusqlite::Row<'_>) -> Result<HistoryRecord> {
        let days_remaining: i64 = row.get::<_, Option<i64>>(6)?.unwrap_or_default();
        let status: Option<String> = row.get(8)?;
        let status = status
            .and_then(|s| s.parse::<CertStatus>().ok())
            .unwrap_or_else(|| CertStatus::from_days_remaining(days_remaining));
        let san_domains = match row.get::<_, Option<String>>(12)? {
            Some(json) if !json.is_empty() => serde_json::from_str(&json)?,
            _ => Vec::new(),
        };

        Ok(HistoryRecord {
            id: row.get(0)?,
            certificate: CertificateInfo {
                domain: row.get(1)?,
                issuer: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                subject: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                not_before: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                not_after: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
                days_remaining,
                is_valid: row.get::<_, Option<bool>>(7)?.unwrap_or_default(),
                status,
                serial_number: row.get::<_, Option<String>>(9)?.unwrap_or_default(),
                version: row.get::<_, Option<i32>>(10)?.unwrap_or_default(),
                query_time: row.get(11)?,
                san_domains,
            },
        })
    }
}

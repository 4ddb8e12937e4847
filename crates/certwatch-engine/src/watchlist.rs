use certwatch_common::datetime::{now_utc, parse_canonical};
use certwatch_common::types::{
    CertificateFields, CertificateInfo, ImportDomainItem, ImportSummary, WatchedDomain,
    WatchedDomainView, MANUAL_ISSUER, PLACEHOLDER,
};
use certwatch_storage::{CertStore, CheckTarget, StorageError};
use chrono::NaiveDateTime;
use std::sync::{Arc, Mutex};

use crate::cert::checker::{CertificateProbe, ProbeError};

/// Lines starting with this marker are ignored by [`parse_import_text`].
pub const COMMENT_MARKER: char = '#';

/// Attaches live certificate status to watched domains.
///
/// Status is computed on every read and never persisted; only
/// `last_check_time` is written back after a successful probe.
pub struct WatchlistService {
    store: Arc<CertStore>,
    probe: Arc<dyn CertificateProbe>,
}

impl WatchlistService {
    pub fn new(store: Arc<CertStore>, probe: Arc<dyn CertificateProbe>) -> Self {
        Self { store, probe }
    }

    pub fn store(&self) -> &Arc<CertStore> {
        &self.store
    }

    /// Lists every watched domain with freshly computed status.
    ///
    /// Manual entries are synthesized from their stored dates. The rest are
    /// probed concurrently; a failed probe leaves `cert_info` empty without
    /// failing the listing. History is never written here.
    pub async fn list_with_live_status(&self) -> Result<Vec<WatchedDomainView>, StorageError> {
        let watched = self.store.list_watched()?;
        if watched.is_empty() {
            return Ok(Vec::new());
        }

        let slots: Arc<Mutex<Vec<WatchedDomainView>>> = Arc::new(Mutex::new(
            watched
                .iter()
                .cloned()
                .map(|watched| WatchedDomainView {
                    watched,
                    cert_info: None,
                })
                .collect(),
        ));

        let mut handles = Vec::with_capacity(watched.len());
        for (index, entry) in watched.into_iter().enumerate() {
            let store = self.store.clone();
            let probe = self.probe.clone();
            let slots = slots.clone();
            let domain = entry.domain.clone();

            let handle = tokio::spawn(async move {
                if entry.is_manual && entry.manual_expire_date.is_some() {
                    let cert = manual_certificate(&entry, &now_utc());
                    if cert.is_none() {
                        tracing::warn!(
                            domain = %entry.domain,
                            "Stored manual expire date is unreadable"
                        );
                    }
                    let mut slots = slots.lock().unwrap_or_else(|p| p.into_inner());
                    slots[index].cert_info = cert;
                    return;
                }

                match probe.probe(&entry.domain).await {
                    Ok(cert) => {
                        let mut slots = slots.lock().unwrap_or_else(|p| p.into_inner());
                        slots[index].cert_info = Some(cert);
                        if let Err(e) = store.touch_last_check(CheckTarget::Id(entry.id)) {
                            tracing::error!(
                                domain = %entry.domain,
                                error = %e,
                                "Failed to update last check time"
                            );
                        } else if let Ok(Some(row)) = store.get_watched(entry.id) {
                            slots[index].watched = row;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(
                            domain = %entry.domain,
                            error = %e,
                            "Watched domain probe failed"
                        );
                    }
                }
            });
            handles.push((domain, handle));
        }

        for (domain, handle) in handles {
            if let Err(e) = handle.await {
                tracing::error!(domain = %domain, error = %e, "Watchlist refresh task panicked");
            }
        }

        let mut slots = slots.lock().unwrap_or_else(|p| p.into_inner());
        let views = std::mem::take(&mut *slots);
        tracing::info!(
            count = views.len(),
            with_status = views.iter().filter(|v| v.cert_info.is_some()).count(),
            "Refreshed watched domains"
        );
        Ok(views)
    }

    /// Probes one domain and stamps its last check time. Never writes history.
    pub async fn refresh_one(&self, domain: &str) -> Result<CertificateInfo, ProbeError> {
        let cert = self.probe.probe(domain).await?;
        match self.store.touch_last_check(CheckTarget::Domain(domain)) {
            Ok(true) => {}
            Ok(false) => tracing::debug!(domain, "Refreshed domain is not on the watchlist"),
            Err(e) => tracing::error!(domain, error = %e, "Failed to update last check time"),
        }
        Ok(cert)
    }

    pub fn import_from_text(&self, text: &str) -> ImportSummary {
        let items = parse_import_text(text);
        self.store.import_domains(&items)
    }
}

/// Builds the certificate view of a manual entry, or `None` when it has no
/// readable expire date.
pub fn manual_certificate(
    watched: &WatchedDomain,
    now: &NaiveDateTime,
) -> Option<CertificateInfo> {
    let not_after = watched.manual_expire_date.as_deref().and_then(parse_canonical)?;
    let not_before = watched
        .manual_start_date
        .clone()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| PLACEHOLDER.to_string());

    let fields = CertificateFields {
        domain: watched.domain.clone(),
        issuer: MANUAL_ISSUER.to_string(),
        subject: watched.domain.clone(),
        not_before,
        not_after,
        serial_number: PLACEHOLDER.to_string(),
        version: 0,
        san_domains: Vec::new(),
    };
    Some(CertificateInfo::classify(fields, now))
}

/// Parses `domain[,nickname,...]` lines, skipping blanks and `#` comments.
///
/// Only the second column is kept as the nickname, so CSV exports with extra
/// columns import cleanly. Lines with an empty domain are dropped.
pub fn parse_import_text(text: &str) -> Vec<ImportDomainItem> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with(COMMENT_MARKER))
        .filter_map(|line| {
            let mut columns = line.split(',').map(str::trim);
            let domain = columns.next().filter(|d| !d.is_empty())?;
            let nickname = columns.next().filter(|n| !n.is_empty());
            Some(ImportDomainItem {
                domain: domain.to_string(),
                nickname: nickname.map(str::to_string),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use certwatch_common::types::CertStatus;
    use chrono::NaiveDate;

    fn watched(start: Option<&str>, expire: Option<&str>) -> WatchedDomain {
        WatchedDomain {
            id: 1,
            domain: "internal.example".to_string(),
            nickname: None,
            added_time: "2024-01-01 00:00:00".to_string(),
            last_check_time: None,
            notify_enabled: false,
            notify_threshold: 7,
            is_manual: true,
            manual_expire_date: expire.map(str::to_string),
            manual_start_date: start.map(str::to_string),
        }
    }

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn manual_certificate_uses_stored_dates() {
        let entry = watched(Some("2024-01-01 00:00:00"), Some("2030-01-01 00:00:00"));
        let cert = manual_certificate(&entry, &at(2029, 12, 1)).unwrap();
        assert_eq!(cert.issuer, MANUAL_ISSUER);
        assert_eq!(cert.subject, "internal.example");
        assert_eq!(cert.not_before, "2024-01-01 00:00:00");
        assert_eq!(cert.not_after, "2030-01-01 00:00:00");
        assert_eq!(cert.days_remaining, 31);
        assert_eq!(cert.status, CertStatus::Safe);
        assert_eq!(cert.serial_number, "-");
        assert_eq!(cert.version, 0);
        assert!(cert.san_domains.is_empty());
    }

    #[test]
    fn manual_certificate_without_start_uses_placeholder() {
        let entry = watched(None, Some("2030-01-01 00:00:00"));
        let cert = manual_certificate(&entry, &at(2030, 1, 2)).unwrap();
        assert_eq!(cert.not_before, PLACEHOLDER);
        assert_eq!(cert.days_remaining, -1);
        assert_eq!(cert.status, CertStatus::Expired);
        assert!(!cert.is_valid);
    }

    #[test]
    fn manual_certificate_needs_expire_date() {
        assert!(manual_certificate(&watched(None, None), &at(2030, 1, 1)).is_none());
        assert!(manual_certificate(&watched(None, Some("garbage")), &at(2030, 1, 1)).is_none());
    }

    #[test]
    fn parse_import_text_skips_comments_and_blanks() {
        let items = parse_import_text("a.com\n#comment\n\n  b.com , Bob \nc.com,\n");
        assert_eq!(
            items,
            vec![
                ImportDomainItem {
                    domain: "a.com".to_string(),
                    nickname: None
                },
                ImportDomainItem {
                    domain: "b.com".to_string(),
                    nickname: Some("Bob".to_string())
                },
                ImportDomainItem {
                    domain: "c.com".to_string(),
                    nickname: None
                },
            ]
        );
    }

    #[test]
    fn parse_import_text_keeps_only_second_column_as_nickname() {
        let items = parse_import_text("a.com,Bob,safe,42\nb.com,,Team\n");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].domain, "a.com");
        assert_eq!(items[0].nickname.as_deref(), Some("Bob"));
        assert_eq!(items[1].domain, "b.com");
        assert_eq!(items[1].nickname, None);
    }

    #[test]
    fn parse_import_text_drops_lines_without_domain() {
        let items = parse_import_text("a.com\n,Bob\n  , \n");
        assert_eq!(
            items,
            vec![ImportDomainItem {
                domain: "a.com".to_string(),
                nickname: None
            }]
        );
    }
}

//! Public operations consumed by a presentation layer.
//!
//! Every operation returns a serializable result with a success flag and a
//! human-readable message; no error escapes to the caller.

use certwatch_common::types::{
    CertificateInfo, HistoryRecord, NotificationItem, WatchedDomainView,
};
use certwatch_storage::{CertStore, StorageError};
use serde::Serialize;
use std::sync::Arc;

use crate::cert::batch::{check_and_record, BatchOrchestrator};
use crate::cert::checker::{CertificateProbe, ProbeError, TlsProbe};
use crate::config::CertWatchConfig;
use crate::watchlist::WatchlistService;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<CertificateInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchQueryResult {
    pub success: bool,
    pub message: String,
    pub total: usize,
    pub results: Vec<CertificateInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQueryResult {
    pub success: bool,
    pub message: String,
    pub total: usize,
    pub records: Vec<HistoryRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchedDomainsResult {
    pub success: bool,
    pub message: String,
    pub total: usize,
    pub domains: Vec<WatchedDomainView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationResult {
    pub success: bool,
    pub message: String,
    pub total: usize,
    pub items: Vec<NotificationItem>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportDomainsResult {
    pub success: bool,
    pub message: String,
    pub total: usize,
    pub success_count: usize,
    pub skipped_count: usize,
    pub failed_count: usize,
    pub failed_domains: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OperationResult {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            error: None,
        }
    }

    fn failed(message: impl Into<String>, error: impl ToString) -> Self {
        Self {
            success: false,
            message: message.into(),
            error: Some(error.to_string()),
        }
    }
}

impl QueryResult {
    fn failed(message: impl Into<String>, error: Option<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            error,
        }
    }

    fn from_probe_error(e: &ProbeError) -> Self {
        let message = match e {
            ProbeError::Connect { domain, .. } => format!("cannot connect to {domain}"),
            ProbeError::NoCertificate { .. } => "server returned no certificate".to_string(),
            ProbeError::Parse { domain, .. } => format!("cannot parse certificate of {domain}"),
        };
        Self::failed(message, Some(e.to_string()))
    }
}

/// Entry point owning the store, the probe and the services built on them.
pub struct CertWatchApp {
    store: Arc<CertStore>,
    probe: Arc<dyn CertificateProbe>,
    batch: BatchOrchestrator,
    watchlist: Arc<WatchlistService>,
    history_limit: i64,
}

impl CertWatchApp {
    pub fn new(store: Arc<CertStore>, probe: Arc<dyn CertificateProbe>) -> Self {
        Self {
            batch: BatchOrchestrator::new(store.clone(), probe.clone()),
            watchlist: Arc::new(WatchlistService::new(store.clone(), probe.clone())),
            store,
            probe,
            history_limit: certwatch_storage::DEFAULT_HISTORY_LIMIT,
        }
    }

    /// Opens the database under `data_dir` and probes over real TLS.
    pub fn from_config(config: &CertWatchConfig) -> anyhow::Result<Self> {
        let store = Arc::new(CertStore::new(&config.data_path())?);
        let probe: Arc<dyn CertificateProbe> = Arc::new(TlsProbe::new(config.connect_timeout())?);
        Ok(Self::new(store, probe).with_history_limit(config.history.default_limit))
    }

    /// Limit applied by [`Self::get_history`] when called with `limit <= 0`.
    pub fn with_history_limit(mut self, limit: i64) -> Self {
        if limit > 0 {
            self.history_limit = limit;
        }
        self
    }

    pub fn store(&self) -> &Arc<CertStore> {
        &self.store
    }

    pub fn watchlist(&self) -> &Arc<WatchlistService> {
        &self.watchlist
    }

    // ---- certificate checks ----

    pub async fn check_certificate(&self, domain: &str) -> QueryResult {
        let domain = domain.trim();
        if domain.is_empty() {
            return QueryResult::failed("domain must not be empty", None);
        }

        match check_and_record(self.probe.as_ref(), &self.store, domain).await {
            Ok(recorded) => {
                let mut message = "certificate retrieved".to_string();
                if let Some(warning) = recorded.history_warning {
                    message.push_str(&format!(" (history not saved: {warning})"));
                }
                tracing::info!(
                    domain,
                    days_remaining = recorded.certificate.days_remaining,
                    status = %recorded.certificate.status,
                    "Certificate checked"
                );
                QueryResult {
                    success: true,
                    message,
                    data: Some(recorded.certificate),
                    error: None,
                }
            }
            Err(e) => {
                tracing::warn!(domain, error = %e, "Certificate check failed");
                QueryResult::from_probe_error(&e)
            }
        }
    }

    pub async fn batch_check_certificates(&self, domains: &str) -> BatchQueryResult {
        let empty = |message: &str| BatchQueryResult {
            success: false,
            message: message.to_string(),
            total: 0,
            results: Vec::new(),
            errors: Vec::new(),
        };

        if domains.trim().is_empty() {
            return empty("domain list must not be empty");
        }

        let batch = self.batch.check_batch(domains).await;
        BatchQueryResult {
            success: batch.success,
            message: format!(
                "checked {} domains, {} succeeded",
                batch.total,
                batch.results.len()
            ),
            total: batch.total,
            results: batch.results,
            errors: batch.errors,
        }
    }

    // ---- history ----

    pub fn get_history(&self, limit: i64) -> HistoryQueryResult {
        let limit = if limit > 0 { limit } else { self.history_limit };
        match self.store.list_history(limit) {
            Ok(records) => HistoryQueryResult {
                success: true,
                message: format!("found {} history records", records.len()),
                total: records.len(),
                records,
                error: None,
            },
            Err(e) => {
                tracing::error!(error = %e, "Failed to read history");
                HistoryQueryResult {
                    success: false,
                    message: "failed to read history".to_string(),
                    total: 0,
                    records: Vec::new(),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    pub fn clear_history(&self) -> OperationResult {
        match self.store.clear_history() {
            Ok(removed) => {
                tracing::info!(removed, "Cleared history");
                OperationResult::ok(format!("cleared {removed} history records"))
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to clear history");
                OperationResult::failed("failed to clear history", e)
            }
        }
    }

    // ---- watchlist ----

    pub fn add_watched_domain(&self, domain: &str, nickname: Option<&str>) -> OperationResult {
        let domain = domain.trim();
        match self.store.add_watched(domain, nickname) {
            Ok(_) => OperationResult::ok(format!("now watching {domain}")),
            Err(e @ StorageError::Duplicate { .. }) => {
                OperationResult::failed(format!("{domain} is already being watched"), e)
            }
            Err(e) if e.is_validation() => OperationResult::failed(e.to_string(), e),
            Err(e) => {
                tracing::error!(domain, error = %e, "Failed to add watched domain");
                OperationResult::failed("failed to add watched domain", e)
            }
        }
    }

    /// Lists the watchlist with live status; probes every non-manual entry.
    pub async fn get_watched_domains(&self) -> WatchedDomainsResult {
        match self.watchlist.list_with_live_status().await {
            Ok(domains) => WatchedDomainsResult {
                success: true,
                message: format!("found {} watched domains", domains.len()),
                total: domains.len(),
                domains,
                error: None,
            },
            Err(e) => {
                tracing::error!(error = %e, "Failed to list watched domains");
                WatchedDomainsResult {
                    success: false,
                    message: "failed to list watched domains".to_string(),
                    total: 0,
                    domains: Vec::new(),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    pub async fn refresh_all_watched_domains(&self) -> WatchedDomainsResult {
        tracing::info!("Refreshing all watched domains");
        let mut result = self.get_watched_domains().await;
        if result.success {
            result.message = format!("refreshed {} watched domains", result.total);
        }
        result
    }

    pub fn remove_watched_domain(&self, id: i64) -> OperationResult {
        match self.store.remove_watched(id) {
            Ok(true) => OperationResult::ok("watched domain removed"),
            Ok(false) => OperationResult::ok(format!("no watched domain with id {id}")),
            Err(e) => OperationResult::failed("failed to remove watched domain", e),
        }
    }

    pub fn update_watched_domain_nickname(&self, id: i64, nickname: &str) -> OperationResult {
        match self.store.rename_watched(id, nickname) {
            Ok(true) => OperationResult::ok("nickname updated"),
            Ok(false) => OperationResult::ok(format!("no watched domain with id {id}")),
            Err(e) => OperationResult::failed("failed to update nickname", e),
        }
    }

    /// Probes one domain on demand without writing history.
    pub async fn refresh_watched_domain(&self, domain: &str) -> QueryResult {
        let domain = domain.trim();
        if domain.is_empty() {
            return QueryResult::failed("domain must not be empty", None);
        }

        match self.watchlist.refresh_one(domain).await {
            Ok(cert) => QueryResult {
                success: true,
                message: "certificate refreshed".to_string(),
                data: Some(cert),
                error: None,
            },
            Err(e) => {
                tracing::warn!(domain, error = %e, "Watched domain refresh failed");
                QueryResult::from_probe_error(&e)
            }
        }
    }

    pub fn update_notify_settings(
        &self,
        id: i64,
        enabled: bool,
        threshold: i64,
    ) -> OperationResult {
        match self.store.set_notify_settings(id, enabled, threshold) {
            Ok(_) => OperationResult::ok("notify settings updated"),
            Err(e) if e.is_validation() => OperationResult::failed(e.to_string(), e),
            Err(e) => OperationResult::failed("failed to update notify settings", e),
        }
    }

    pub fn update_manual_cert_info(
        &self,
        id: i64,
        start_date: &str,
        expire_date: &str,
    ) -> OperationResult {
        match self.store.set_manual_cert_info(id, start_date, expire_date) {
            Ok(_) => OperationResult::ok("manual certificate dates saved"),
            Err(e) if e.is_validation() => OperationResult::failed(e.to_string(), e),
            Err(e) => OperationResult::failed("failed to save manual certificate dates", e),
        }
    }

    pub fn disable_manual_mode(&self, id: i64) -> OperationResult {
        match self.store.disable_manual(id) {
            Ok(_) => OperationResult::ok("manual mode disabled"),
            Err(e) => OperationResult::failed("failed to disable manual mode", e),
        }
    }

    // ---- notifications ----

    /// Refreshes the watchlist and returns entries within their threshold.
    pub async fn check_notifications(&self) -> NotificationResult {
        let views = match self.watchlist.list_with_live_status().await {
            Ok(views) => views,
            Err(e) => {
                tracing::error!(error = %e, "Failed to list watched domains for notifications");
                return NotificationResult {
                    success: false,
                    message: format!("failed to list watched domains: {e}"),
                    total: 0,
                    items: Vec::new(),
                };
            }
        };

        let items = certwatch_alert::evaluate(&views);
        let message = if items.is_empty() {
            "no domains need attention".to_string()
        } else {
            format!("{} domains need attention", items.len())
        };
        NotificationResult {
            success: true,
            message,
            total: items.len(),
            items,
        }
    }

    // ---- import ----

    pub fn import_domains_from_text(&self, text: &str) -> ImportDomainsResult {
        let rejected = |message: &str| ImportDomainsResult {
            success: false,
            message: message.to_string(),
            total: 0,
            success_count: 0,
            skipped_count: 0,
            failed_count: 0,
            failed_domains: Vec::new(),
        };

        if text.trim().is_empty() {
            return rejected("import text must not be empty");
        }
        let summary = self.watchlist.import_from_text(text);
        if summary.total == 0 {
            return rejected("no valid domains");
        }

        ImportDomainsResult {
            success: summary.succeeded > 0,
            message: format!(
                "import finished: total {}, succeeded {}, skipped {}, failed {}",
                summary.total, summary.succeeded, summary.skipped, summary.failed
            ),
            total: summary.total,
            success_count: summary.succeeded,
            skipped_count: summary.skipped,
            failed_count: summary.failed,
            failed_domains: summary.failed_domains,
        }
    }
}

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::datetime::{days_remaining, format_canonical};

/// Smallest accepted notify threshold, in days.
pub const MIN_NOTIFY_THRESHOLD: i64 = 1;
/// Largest accepted notify threshold, in days.
pub const MAX_NOTIFY_THRESHOLD: i64 = 365;
/// Threshold given to newly watched domains.
pub const DEFAULT_NOTIFY_THRESHOLD: i64 = 7;

/// Issuer shown on certificates synthesized from manual dates.
pub const MANUAL_ISSUER: &str = "Manual Entry";
/// Rendered in place of a missing manual start date or serial number.
pub const PLACEHOLDER: &str = "-";

/// Expiry risk bucket derived from the remaining days.
///
/// # Examples
///
/// ```
/// use certwatch_common::types::CertStatus;
///
/// assert_eq!(CertStatus::from_days_remaining(-1), CertStatus::Expired);
/// assert_eq!(CertStatus::from_days_remaining(0), CertStatus::Danger);
/// assert_eq!(CertStatus::from_days_remaining(8), CertStatus::Warning);
/// assert_eq!(CertStatus::from_days_remaining(31), CertStatus::Safe);
/// assert_eq!("warning".parse::<CertStatus>().unwrap(), CertStatus::Warning);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CertStatus {
    Safe,
    Warning,
    Danger,
    Expired,
}

impl CertStatus {
    pub fn from_days_remaining(days: i64) -> Self {
        if days < 0 {
            CertStatus::Expired
        } else if days <= 7 {
            CertStatus::Danger
        } else if days <= 30 {
            CertStatus::Warning
        } else {
            CertStatus::Safe
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CertStatus::Safe => "safe",
            CertStatus::Warning => "warning",
            CertStatus::Danger => "danger",
            CertStatus::Expired => "expired",
        }
    }
}

impl std::fmt::Display for CertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CertStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "safe" => Ok(CertStatus::Safe),
            "warning" => Ok(CertStatus::Warning),
            "danger" => Ok(CertStatus::Danger),
            "expired" => Ok(CertStatus::Expired),
            other => Err(format!("unknown certificate status: {other}")),
        }
    }
}

/// Immutable snapshot of one certificate, produced by a probe or
/// synthesized from manual dates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateInfo {
    pub domain: String,
    /// Issuer common name
    pub issuer: String,
    /// Subject common name
    pub subject: String,
    pub not_before: String,
    pub not_after: String,
    pub days_remaining: i64,
    pub is_valid: bool,
    pub status: CertStatus,
    pub serial_number: String,
    pub version: i32,
    /// Set only once the snapshot has been written to history.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_time: Option<String>,
    /// Subject alternative DNS names; empty when the certificate has none.
    #[serde(default)]
    pub san_domains: Vec<String>,
}

/// Validity window and identity of a certificate, before classification.
#[derive(Debug, Clone)]
pub struct CertificateFields {
    pub domain: String,
    pub issuer: String,
    pub subject: String,
    /// Canonical timestamp, or [`PLACEHOLDER`] when unknown.
    pub not_before: String,
    pub not_after: NaiveDateTime,
    pub serial_number: String,
    pub version: i32,
    pub san_domains: Vec<String>,
}

impl CertificateInfo {
    /// Computes days remaining and status against `now` and freezes the result.
    pub fn classify(fields: CertificateFields, now: &NaiveDateTime) -> Self {
        let days = days_remaining(&fields.not_after, now);
        Self {
            domain: fields.domain,
            issuer: fields.issuer,
            subject: fields.subject,
            not_before: fields.not_before,
            not_after: format_canonical(&fields.not_after),
            days_remaining: days,
            is_valid: days > 0,
            status: CertStatus::from_days_remaining(days),
            serial_number: fields.serial_number,
            version: fields.version,
            query_time: None,
            san_domains: fields.san_domains,
        }
    }
}

/// One appended row of the check history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: i64,
    #[serde(flatten)]
    pub certificate: CertificateInfo,
}

/// Durable watchlist row. Carries no live status; see [`WatchedDomainView`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchedDomain {
    pub id: i64,
    pub domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    pub added_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_check_time: Option<String>,
    pub notify_enabled: bool,
    pub notify_threshold: i64,
    pub is_manual: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_expire_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_start_date: Option<String>,
}

/// A watchlist row joined with its freshly computed certificate status.
///
/// Built on every read and never written back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchedDomainView {
    #[serde(flatten)]
    pub watched: WatchedDomain,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert_info: Option<CertificateInfo>,
}

/// A watched domain whose remaining validity is at or below its threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationItem {
    pub id: i64,
    pub domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    pub days_remaining: i64,
    pub not_after: String,
    pub threshold: i64,
    pub status: CertStatus,
}

/// One `domain[,nickname]` line of an import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportDomainItem {
    pub domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
}

/// Counters produced by a bulk import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub total: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub failed_domains: Vec<String>,
}

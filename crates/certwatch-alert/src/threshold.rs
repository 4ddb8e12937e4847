use certwatch_common::types::{NotificationItem, WatchedDomainView};

use crate::NotificationRule;

/// Per-domain expiry threshold rule.
///
/// An entry qualifies when notifications are enabled, a certificate is
/// attached, and `0 <= days_remaining <= notify_threshold`. Expired
/// certificates are a terminal state and never produce a threshold warning.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpiryThresholdRule;

impl NotificationRule for ExpiryThresholdRule {
    fn name(&self) -> &str {
        "expiry-threshold"
    }

    fn evaluate(&self, entry: &WatchedDomainView) -> Option<NotificationItem> {
        let watched = &entry.watched;
        if !watched.notify_enabled {
            return None;
        }

        let cert = entry.cert_info.as_ref()?;
        if cert.days_remaining < 0 || cert.days_remaining > watched.notify_threshold {
            return None;
        }

        Some(NotificationItem {
            id: watched.id,
            domain: watched.domain.clone(),
            nickname: watched.nickname.clone(),
            days_remaining: cert.days_remaining,
            not_after: cert.not_after.clone(),
            threshold: watched.notify_threshold,
            status: cert.status,
        })
    }
}

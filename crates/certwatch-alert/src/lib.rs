//! Threshold evaluation over the live-status view of the watchlist.
//!
//! A rule looks at one watched domain together with its freshly computed
//! certificate and decides whether it deserves a warning. The default
//! [`threshold::ExpiryThresholdRule`] implements the per-domain
//! notify-threshold policy; [`evaluate`] applies it to a whole listing.

pub mod threshold;


use certwatch_common::types::{NotificationItem, WatchedDomainView};

pub use threshold::ExpiryThresholdRule;

/// A notification rule evaluated against a single watchlist entry.
pub trait NotificationRule: Send + Sync {
    /// Short identifier used in logs (e.g., `"expiry-threshold"`).
    fn name(&self) -> &str;

    /// Returns a notification item when the entry qualifies, `None` otherwise.
    fn evaluate(&self, entry: &WatchedDomainView) -> Option<NotificationItem>;
}

/// Applies `rule` to every entry, keeping input order.
pub fn evaluate_with(
    rule: &dyn NotificationRule,
    entries: &[WatchedDomainView],
) -> Vec<NotificationItem> {
    entries.iter().filter_map(|entry| rule.evaluate(entry)).collect()
}

/// Entries that are notify-enabled, not yet expired, and at or below their
/// own threshold.
pub fn evaluate(entries: &[WatchedDomainView]) -> Vec<NotificationItem> {
    evaluate_with(&ExpiryThresholdRule, entries)
}

use certwatch_common::types::NotificationItem;
use std::sync::Arc;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::watchlist::WatchlistService;

/// Periodically refreshes the whole watchlist and logs every entry that
/// crossed its notify threshold.
pub struct RefreshScheduler {
    watchlist: Arc<WatchlistService>,
    interval: Duration,
}

impl RefreshScheduler {
    pub fn new(watchlist: Arc<WatchlistService>, interval: Duration) -> Self {
        Self { watchlist, interval }
    }

    pub async fn run(&self) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            "Watchlist refresh scheduler started"
        );

        let mut tick = interval(self.interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tick.tick().await;
            self.run_once().await;
        }
    }

    /// Runs a single refresh cycle and returns the qualifying notifications.
    pub async fn run_once(&self) -> Vec<NotificationItem> {
        let views = match self.watchlist.list_with_live_status().await {
            Ok(views) => views,
            Err(e) => {
                tracing::error!(error = %e, "Watchlist refresh cycle failed");
                return Vec::new();
            }
        };

        let items = certwatch_alert::evaluate(&views);
        for item in &items {
            tracing::warn!(
                domain = %item.domain,
                nickname = ?item.nickname,
                days_remaining = item.days_remaining,
                threshold = item.threshold,
                not_after = %item.not_after,
                "Certificate expiring soon"
            );
        }
        tracing::info!(
            watched = views.len(),
            expiring = items.len(),
            "Watchlist refresh cycle finished"
        );
        items
    }
}

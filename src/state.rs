use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use tracing::{debug, info};

use crate::aggregator::{default_range, summarize};
use crate::api::{ActivityFeedClient, PageOptions, fetch_all_activity_while};
use crate::error::TrackerError;
use crate::types::{ActivitySummary, TimeRange};

/// Everything loaded for one account.
#[derive(Debug, Clone)]
pub struct LoadedAccount {
    pub address: String,
    pub summary: ActivitySummary,
    /// Range to show first, picked from how long ago the account joined.
    pub default_range: TimeRange,
}

/// Loads accounts one at a time. Starting a load supersedes any load still in
/// flight; the older one resolves to `TrackerError::Superseded`.
pub struct TrackerSession<C> {
    client: C,
    opts: PageOptions,
    generation: AtomicU64,
}

impl<C: ActivityFeedClient> TrackerSession<C> {
    pub fn new(client: C, opts: PageOptions) -> Self {
        Self {
            client,
            opts,
            generation: AtomicU64::new(0),
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Fetch and aggregate all activity for `address`.
    pub async fn load(&self, address: &str) -> Result<LoadedAccount, TrackerError> {
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let is_current = || self.generation.load(Ordering::SeqCst) == ticket;
        debug!("Load #{ticket} started for {address}");

        let raws = fetch_all_activity_while(&self.client, address, &self.opts, &is_current).await?;
        let fetched = raws.len();
        let summary = summarize(raws);

        if !is_current() {
            debug!("Load #{ticket} for {address} superseded, discarding");
            return Err(TrackerError::Superseded);
        }
        info!(
            "Processed {} activities ({} fetched) for {address}",
            summary.records.len(),
            fetched
        );

        let default_range = default_range(summary.stats.date_joined, Utc::now());
        Ok(LoadedAccount {
            address: address.to_string(),
            summary,
            default_range,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::Notify;

    use crate::types::RawActivity;

    /// Account "slow" blocks on its second page until account "fast" finishes.
    struct GatedFeed {
        gate: Notify,
    }

    fn activity(ts: i64, market: &str) -> RawActivity {
        serde_json::from_value(json!({
            "type": "TRADE",
            "timestamp": ts,
            "conditionId": market,
            "side": "BUY",
        }))
        .unwrap()
    }

    #[async_trait]
    impl ActivityFeedClient for GatedFeed {
        async fn fetch_page(
            &self,
            user: &str,
            limit: u32,
            offset: u32,
        ) -> Result<Vec<RawActivity>, TrackerError> {
            match (user, offset) {
                ("slow", 0) => Ok((0..limit).map(|i| activity(1_700_000_000 + i as i64, "m1")).collect()),
                ("slow", _) => {
                    self.gate.notified().await;
                    Ok(vec![activity(1_600_000_000, "m2")])
                }
                _ => {
                    self.gate.notify_one();
                    Ok(vec![activity(1_700_000_000, "m3"), activity(1_700_086_400, "m4")])
                }
            }
        }
    }

    fn opts() -> PageOptions {
        PageOptions {
            page_size: 5,
            max_items: 1_000,
            page_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn load_builds_summary() {
        let session = TrackerSession::new(GatedFeed { gate: Notify::new() }, opts());
        let loaded = session.load("fast").await.unwrap();
        assert_eq!(loaded.address, "fast");
        assert_eq!(loaded.summary.records.len(), 2);
        assert_eq!(loaded.summary.stats.total_markets, 2);
        assert_eq!(loaded.summary.stats.total_predictions, 2);
        assert_eq!(loaded.default_range, TimeRange::Year);
    }

    #[tokio::test]
    async fn newer_load_supersedes_older() {
        let session = TrackerSession::new(GatedFeed { gate: Notify::new() }, opts());
        let (slow, fast) = tokio::join!(session.load("slow"), async {
            tokio::task::yield_now().await;
            session.load("fast").await
        });
        assert!(matches!(slow, Err(TrackerError::Superseded)));
        assert_eq!(fast.unwrap().summary.records.len(), 2);
    }
}

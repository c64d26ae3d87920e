//! Service counters, exported as Prometheus text.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use tracing::info;

#[derive(Debug)]
pub struct ServiceMetrics {
    pub bids_accepted: AtomicU64,
    pub bids_rejected: AtomicU64,
    pub bids_race_lost: AtomicU64,
    pub bids_replayed: AtomicU64,
    pub settlements_completed: AtomicU64,
    pub settlements_failed: AtomicU64,
    pub oracle_failures: AtomicU64,
    pub ledger_failures: AtomicU64,
    pub identity_failures: AtomicU64,
    started: Instant,
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self {
            bids_accepted: AtomicU64::new(0),
            bids_rejected: AtomicU64::new(0),
            bids_race_lost: AtomicU64::new(0),
            bids_replayed: AtomicU64::new(0),
            settlements_completed: AtomicU64::new(0),
            settlements_failed: AtomicU64::new(0),
            oracle_failures: AtomicU64::new(0),
            ledger_failures: AtomicU64::new(0),
            identity_failures: AtomicU64::new(0),
            started: Instant::now(),
        }
    }
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_bid_accepted(&self) {
        self.bids_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bid_rejected(&self) {
        self.bids_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bid_race_lost(&self) {
        self.bids_race_lost.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bid_replayed(&self) {
        self.bids_replayed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_settlement(&self, success: bool) {
        if success {
            self.settlements_completed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.settlements_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_oracle_failure(&self) {
        self.oracle_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ledger_failure(&self) {
        self.ledger_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_identity_failure(&self) {
        self.identity_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn log_summary(&self) {
        info!(
            bids_accepted = self.bids_accepted.load(Ordering::Relaxed),
            bids_rejected = self.bids_rejected.load(Ordering::Relaxed),
            bids_race_lost = self.bids_race_lost.load(Ordering::Relaxed),
            settlements_completed = self.settlements_completed.load(Ordering::Relaxed),
            settlements_failed = self.settlements_failed.load(Ordering::Relaxed),
            oracle_failures = self.oracle_failures.load(Ordering::Relaxed),
            ledger_failures = self.ledger_failures.load(Ordering::Relaxed),
            uptime_secs = self.started.elapsed().as_secs(),
            "Service metrics"
        );
    }

    pub fn to_prometheus_text(&self) -> String {
        let counters: [(&str, &str, &AtomicU64); 9] = [
            ("house_bids_accepted_total", "Bids recorded in the read-model", &self.bids_accepted),
            ("house_bids_rejected_total", "Bids refused by the validator", &self.bids_rejected),
            (
                "house_bids_race_lost_total",
                "Bids that lost a concurrent highest-bid race",
                &self.bids_race_lost,
            ),
            (
                "house_bids_replayed_total",
                "Bid attempts answered from the idempotency record",
                &self.bids_replayed,
            ),
            (
                "house_settlements_completed_total",
                "Auctions settled",
                &self.settlements_completed,
            ),
            (
                "house_settlements_failed_total",
                "Settlement attempts that left the auction unchanged",
                &self.settlements_failed,
            ),
            (
                "house_oracle_failures_total",
                "Spot price lookups that returned no price",
                &self.oracle_failures,
            ),
            ("house_ledger_failures_total", "Ledger reads that failed", &self.ledger_failures),
            (
                "house_identity_failures_total",
                "Identity lookups that fell back to placeholders",
                &self.identity_failures,
            ),
        ];

        let mut output = String::with_capacity(2048);
        for (name, help, value) in counters {
            output.push_str(&format!(
                "# HELP {name} {help}\n# TYPE {name} counter\n{name} {}\n",
                value.load(Ordering::Relaxed)
            ));
        }
        output.push_str(&format!(
            "# HELP house_uptime_seconds Process uptime\n\
             # TYPE house_uptime_seconds gauge\n\
             house_uptime_seconds {}\n",
            self.started.elapsed().as_secs()
        ));
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prometheus_text_contains_counters() {
        let metrics = ServiceMetrics::new();
        metrics.record_bid_accepted();
        metrics.record_bid_accepted();
        metrics.record_settlement(false);

        let text = metrics.to_prometheus_text();
        assert!(text.contains("house_bids_accepted_total 2"));
        assert!(text.contains("house_settlements_failed_total 1"));
        assert!(text.contains("# TYPE house_uptime_seconds gauge"));
    }
}

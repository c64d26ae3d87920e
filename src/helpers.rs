use std::sync::Mutex;

use alloy::primitives::Address;
use chrono::{DateTime, Duration, Utc};

use crate::{consts::IDENTICON_URL, types::wallet_key};

/// Short display form of a wallet: `0x1234...abcd`.
pub fn truncate_address(wallet: &Address) -> String {
    let full = wallet_key(wallet);
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}

/// Deterministic generated avatar for a wallet.
pub fn identicon_url(wallet: &Address) -> String {
    format!("{IDENTICON_URL}?seed={}", wallet_key(wallet))
}

/// Source of "now" for every time-dependent rule.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *guard += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    #[test]
    fn test_truncate_address() {
        let wallet = address!("833589fCD6eDb6E08f4c7C32D4f71b54bdA02913");
        assert_eq!(truncate_address(&wallet), "0x8335...2913");
    }

    #[test]
    fn test_identicon_seed_is_lowercase() {
        let wallet = address!("833589fCD6eDb6E08f4c7C32D4f71b54bdA02913");
        assert_eq!(
            identicon_url(&wallet),
            "https://api.dicebear.com/5.x/identicon/svg?seed=0x833589fcd6edb6e08f4c7c32d4f71b54bda02913"
        );
    }

    #[test]
    fn test_manual_clock_advances() {
        let start = Utc::now();
        let clock = ManualClock::new(start);
        clock.advance(Duration::hours(2));
        assert_eq!(clock.now(), start + Duration::hours(2));
    }
}

//! Per-auction critical sections.
//!
//! Each auction gets one async mutex that serializes bid commits and the
//! settlement commit, plus a `settling` flag. While the flag is set, bid
//! ingestion fails fast with `AuctionEnded` instead of queueing behind the
//! settlement.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, MutexGuard};

use crate::{types::LedgerAuctionId, Error};

#[derive(Debug, Default)]
pub(crate) struct AuctionGate {
    lock: AsyncMutex<()>,
    settling: AtomicBool,
}

impl AuctionGate {
    pub(crate) async fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().await
    }

    pub(crate) fn is_settling(&self) -> bool {
        self.settling.load(Ordering::Acquire)
    }

    /// Claim the gate for settlement. Only one claim can be held at a time.
    pub(crate) fn begin_settlement(self: &Arc<Self>) -> Result<SettlingGuard, Error> {
        self.settling
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::SettlementInProgress)?;
        Ok(SettlingGuard {
            gate: Arc::clone(self),
        })
    }
}

/// Clears the settling flag when dropped, whatever the outcome.
#[derive(Debug)]
pub(crate) struct SettlingGuard {
    gate: Arc<AuctionGate>,
}

impl Drop for SettlingGuard {
    fn drop(&mut self) {
        self.gate.settling.store(false, Ordering::Release);
    }
}

#[derive(Debug, Default)]
pub(crate) struct GateMap {
    gates: Mutex<HashMap<LedgerAuctionId, Arc<AuctionGate>>>,
}

impl GateMap {
    pub(crate) fn gate(&self, id: &LedgerAuctionId) -> Arc<AuctionGate> {
        let mut gates = self.gates.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(gates.entry(id.clone()).or_default())
    }

    pub(crate) fn is_settling(&self, id: &LedgerAuctionId) -> bool {
        let gates = self.gates.lock().unwrap_or_else(|e| e.into_inner());
        gates.get(id).is_some_and(|g| g.is_settling())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_id_shares_gate() {
        let map = GateMap::default();
        let a = map.gate(&LedgerAuctionId::new("a"));
        let b = map.gate(&LedgerAuctionId::new("a"));
        let c = map.gate(&LedgerAuctionId::new("c"));
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn test_settlement_claim_is_exclusive_and_released() {
        let map = GateMap::default();
        let id = LedgerAuctionId::new("a");
        let gate = map.gate(&id);

        let guard = gate.begin_settlement().unwrap();
        assert!(map.is_settling(&id));
        assert!(matches!(
            gate.begin_settlement(),
            Err(Error::SettlementInProgress)
        ));

        drop(guard);
        assert!(!map.is_settling(&id));
        assert!(gate.begin_settlement().is_ok());
    }

    #[tokio::test]
    async fn test_lock_serializes() {
        let gate = Arc::new(AuctionGate::default());
        let held = gate.lock().await;
        assert!(gate.lock.try_lock().is_err());
        drop(held);
        assert!(gate.lock.try_lock().is_ok());
    }
}

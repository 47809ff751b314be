//! Protocol fee collection.

use std::sync::{PoisonError, RwLock};

use crate::models::{AccountId, FeePurpose, FeeRecord};

/// Append-only ledger of collected protocol fees plus the cumulative
/// balance. Withdrawal and administration of the balance belong to an
/// external collaborator.
pub struct FeeTreasury {
    inner: RwLock<TreasuryInner>,
}

#[derive(Default)]
struct TreasuryInner {
    balance: u64,
    records: Vec<FeeRecord>,
}

impl FeeTreasury {
    pub(crate) fn new() -> Self {
        Self {
            inner: RwLock::new(TreasuryInner::default()),
        }
    }

    /// Collects a fee and returns the appended record as the receipt.
    pub fn collect(&self, amount: u64, payer: AccountId, purpose: FeePurpose) -> FeeRecord {
        let record = FeeRecord::new(amount, payer, purpose);
        self.collect_record(record.clone());
        record
    }

    pub(crate) fn collect_record(&self, record: FeeRecord) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.balance = inner.balance.saturating_add(record.amount);
        inner.records.push(record);
    }

    /// Removes a fee whose surrounding operation failed to commit. Only the
    /// most recent record can be revoked, which is the only case the callers
    /// ever need.
    pub(crate) fn revoke(&self, record: &FeeRecord) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if inner.records.last() == Some(record) {
            inner.records.pop();
            inner.balance = inner.balance.saturating_sub(record.amount);
        }
    }

    /// Re-adds a journaled fee during replay.
    pub(crate) fn restore(&self, record: FeeRecord) {
        self.collect_record(record);
    }

    /// Cumulative collected balance in wei.
    pub fn balance(&self) -> u64 {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .balance
    }

    /// Every collected fee, in collection order.
    pub fn records(&self) -> Vec<FeeRecord> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .records
            .clone()
    }
}

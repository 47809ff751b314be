//! The event ticket inventory and sales ledger.
//!
//! `TicketLedger` is the single entry point: it owns the event registry, the
//! purchase book, the fee treasury and the durable journal, and it serializes
//! all mutations of one event behind a per-event lock. Operations on
//! different events never contend.
//!
//! Outbound fund transfers are slow and fallible, so they never run under a
//! lock. Every mutating flow follows the same discipline: reserve and record
//! under the lock, release, attempt the transfer with a bounded timeout, and
//! on failure reacquire the lock and apply the compensating rollback before
//! surfacing the error.

mod query;
mod refunds;
mod registry;
mod sales;
mod treasury;

pub use registry::EventRegistry;
pub use treasury::FeeTreasury;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::journal::{Journal, JournalEntry};
use crate::models::AccountId;
use crate::transfer::{FundTransfer, TransferError, TransferId};
use crate::utils::error::LedgerError;

use sales::PurchaseBook;

/// Default creation fee: 200 gwei, the amount the original system attached
/// to every event-creation call.
pub const DEFAULT_CREATION_FEE_WEI: u64 = 200_000_000_000;

/// Tunables for a ledger instance, normally derived from [`crate::config::Config`].
#[derive(Debug, Clone)]
pub struct LedgerSettings {
    pub journal_path: PathBuf,
    /// Exact fee required by `create_event`, in wei.
    pub creation_fee: u64,
    /// Bound on a single outbound transfer; elapsing counts as failure.
    pub transfer_timeout: Duration,
    /// Bound on waiting for a per-event lock before reporting a conflict.
    pub lock_wait: Duration,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            journal_path: PathBuf::from("ticketchain.journal"),
            creation_fee: DEFAULT_CREATION_FEE_WEI,
            transfer_timeout: Duration::from_secs(5),
            lock_wait: Duration::from_secs(2),
        }
    }
}

/// Shared, concurrency-safe ticket ledger.
pub struct TicketLedger {
    pub(crate) registry: EventRegistry,
    pub(crate) purchases: PurchaseBook,
    pub(crate) treasury: FeeTreasury,
    pub(crate) journal: Journal,
    locks: LockTable,
    transfer: Arc<dyn FundTransfer>,
    creation_fee: u64,
    transfer_timeout: Duration,
    lock_wait: Duration,
}

impl TicketLedger {
    /// Opens the ledger, replaying the journal at `settings.journal_path`
    /// to restore state from previous runs.
    pub fn open(
        settings: LedgerSettings,
        transfer: Arc<dyn FundTransfer>,
    ) -> Result<Self, LedgerError> {
        let entries = Journal::replay(&settings.journal_path)?;
        let journal = Journal::open(&settings.journal_path)?;

        let ledger = Self {
            registry: EventRegistry::new(),
            purchases: PurchaseBook::new(),
            treasury: FeeTreasury::new(),
            journal,
            locks: LockTable::new(),
            transfer,
            creation_fee: settings.creation_fee,
            transfer_timeout: settings.transfer_timeout,
            lock_wait: settings.lock_wait,
        };

        let replayed = entries.len();
        for entry in entries {
            ledger.apply_replayed(entry)?;
        }
        if replayed > 0 {
            tracing::info!(
                entries = replayed,
                events = ledger.registry.len(),
                "ledger state restored from journal"
            );
        }

        Ok(ledger)
    }

    /// The exact fee `create_event` requires, in wei.
    pub fn creation_fee(&self) -> u64 {
        self.creation_fee
    }

    /// Rebuilds one journaled mutation. Replay bypasses validation and the
    /// journal itself; the entries were validated when first committed, so
    /// any inconsistency here means the journal file is corrupt.
    fn apply_replayed(&self, entry: JournalEntry) -> Result<(), LedgerError> {
        match entry {
            JournalEntry::EventCreated { event, fee } => {
                self.registry.insert(event)?;
                self.treasury.restore(fee);
            }
            JournalEntry::TicketsPurchased { purchase } => {
                let (event_id, quantity) = (purchase.event_id, purchase.quantity);
                self.registry.with_event_mut(event_id, |ev| {
                    ev.tickets_sold += quantity;
                    Ok(())
                })?;
                self.purchases.insert(purchase);
            }
            JournalEntry::PurchaseRefunded {
                event_id,
                purchase_id,
            } => {
                let purchase = self.purchases.mark_refunded(purchase_id)?;
                self.registry.with_event_mut(event_id, |ev| {
                    ev.tickets_sold -= purchase.quantity;
                    Ok(())
                })?;
            }
            JournalEntry::EventDeactivated { event_id } => {
                self.registry.with_event_mut(event_id, |ev| {
                    ev.is_active = false;
                    Ok(())
                })?;
            }
            // Audit-only compensation records. The mutations they compensate
            // never reached the journal, so there is nothing to undo.
            JournalEntry::PurchaseRolledBack { purchase_id, .. }
            | JournalEntry::RefundRolledBack { purchase_id, .. } => {
                tracing::debug!(%purchase_id, "skipping audit-only rollback entry");
            }
        }
        Ok(())
    }

    /// Bounded-wait acquisition of the per-event lock. Exceeding the bound
    /// is reported as a retryable conflict.
    pub(crate) async fn lock_event(
        &self,
        event_id: u64,
    ) -> Result<OwnedMutexGuard<()>, LedgerError> {
        self.locks.acquire(event_id, self.lock_wait).await
    }

    /// Unbounded acquisition, used by refund settlements and compensating
    /// rollbacks: these must complete, so they may not fail on contention.
    pub(crate) async fn lock_event_for_rollback(&self, event_id: u64) -> OwnedMutexGuard<()> {
        self.locks.acquire_unbounded(event_id).await
    }

    /// Runs one outbound transfer under the configured timeout. A timeout is
    /// indistinguishable from failure: the funds are assumed not to have
    /// moved and the caller rolls back.
    pub(crate) async fn attempt_transfer(
        &self,
        to: &AccountId,
        amount: u64,
    ) -> Result<TransferId, TransferError> {
        match tokio::time::timeout(self.transfer_timeout, self.transfer.send(to, amount)).await {
            Ok(result) => result,
            Err(_) => Err(TransferError::Timeout),
        }
    }

    /// Number of per-event locks that have been materialized. Locks are
    /// created only for events that exist, so this stays bounded by the
    /// registry size.
    #[cfg(test)]
    pub(crate) fn lock_count(&self) -> usize {
        self.locks.len()
    }

    /// Journals one entry whose effects already stand, either a settled
    /// mutation or a completed rollback. A write failure must not unwind
    /// the operation; it is logged and the in-memory state stands.
    pub(crate) fn journal_settled(&self, entry: &JournalEntry) {
        if let Err(e) = self.journal.append(entry) {
            tracing::error!(error = ?e, ?entry, "failed to journal a settled operation");
        }
    }
}

/// Per-event async locks, created lazily.
struct LockTable {
    inner: Mutex<HashMap<u64, Arc<AsyncMutex<()>>>>,
}

impl LockTable {
    fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    fn handle(&self, event_id: u64) -> Arc<AsyncMutex<()>> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(event_id)
            .or_default()
            .clone()
    }

    async fn acquire(
        &self,
        event_id: u64,
        wait: Duration,
    ) -> Result<OwnedMutexGuard<()>, LedgerError> {
        tokio::time::timeout(wait, self.handle(event_id).lock_owned())
            .await
            .map_err(|_| LedgerError::ConcurrencyConflict(event_id))
    }

    async fn acquire_unbounded(&self, event_id: u64) -> OwnedMutexGuard<()> {
        self.handle(event_id).lock_owned().await
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

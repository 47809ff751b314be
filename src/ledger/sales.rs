//! Ticket sales: the purchase book and the buy path.

use std::collections::HashMap;
use std::io;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::journal::JournalEntry;
use crate::models::{AccountId, PurchaseReceipt, TicketPurchase};
use crate::utils::error::LedgerError;

use super::TicketLedger;

/// Owner of all purchase records, indexed by id and by event. Settled
/// records are never removed; only an unsettled reservation whose payment
/// forwarding failed is taken back out.
pub(crate) struct PurchaseBook {
    inner: RwLock<BookInner>,
}

#[derive(Default)]
struct BookInner {
    by_id: HashMap<Uuid, TicketPurchase>,
    by_event: HashMap<u64, Vec<Uuid>>,
}

impl PurchaseBook {
    pub(crate) fn new() -> Self {
        Self {
            inner: RwLock::new(BookInner::default()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, BookInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BookInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn insert(&self, purchase: TicketPurchase) {
        let mut inner = self.write();
        inner
            .by_event
            .entry(purchase.event_id)
            .or_default()
            .push(purchase.purchase_id);
        inner.by_id.insert(purchase.purchase_id, purchase);
    }

    /// Removes a reservation that never settled.
    pub(crate) fn remove(&self, purchase_id: Uuid) {
        let mut inner = self.write();
        if let Some(purchase) = inner.by_id.remove(&purchase_id) {
            if let Some(ids) = inner.by_event.get_mut(&purchase.event_id) {
                ids.retain(|id| *id != purchase_id);
            }
        }
    }

    pub(crate) fn settle(&self, purchase_id: Uuid) {
        if let Some(purchase) = self.write().by_id.get_mut(&purchase_id) {
            purchase.settled = true;
        }
    }

    /// Places a refund hold on an open purchase. The quantity stays counted
    /// in `tickets_sold` while the hold stands, so the units cannot be sold
    /// to someone else during the refund transfer window.
    pub(crate) fn hold_for_refund(&self, purchase_id: Uuid) -> Result<TicketPurchase, LedgerError> {
        let mut inner = self.write();
        let purchase = inner.by_id.get_mut(&purchase_id).ok_or_else(|| {
            LedgerError::Journal(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unknown purchase {purchase_id}"),
            ))
        })?;
        if purchase.refunded || purchase.refund_pending {
            return Err(LedgerError::AlreadyRefunded(purchase_id));
        }
        purchase.refund_pending = true;
        Ok(purchase.clone())
    }

    /// Flips `refunded` false -> true and clears any hold, returning the
    /// record. A second flip of the same purchase is the terminal
    /// `AlreadyRefunded` state.
    pub(crate) fn mark_refunded(&self, purchase_id: Uuid) -> Result<TicketPurchase, LedgerError> {
        let mut inner = self.write();
        let purchase = inner.by_id.get_mut(&purchase_id).ok_or_else(|| {
            LedgerError::Journal(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unknown purchase {purchase_id}"),
            ))
        })?;
        if purchase.refunded {
            return Err(LedgerError::AlreadyRefunded(purchase_id));
        }
        purchase.refunded = true;
        purchase.refund_pending = false;
        Ok(purchase.clone())
    }

    /// Rollback of `hold_for_refund` after a failed refund transfer. The
    /// purchase goes back to being open.
    pub(crate) fn release_refund_hold(&self, purchase_id: Uuid) {
        if let Some(purchase) = self.write().by_id.get_mut(&purchase_id) {
            purchase.refund_pending = false;
        }
    }

    /// Latest settled purchase by `buyer` on the event that is neither
    /// refunded nor under a refund hold.
    pub(crate) fn find_open(&self, event_id: u64, buyer: &AccountId) -> Option<TicketPurchase> {
        let inner = self.read();
        let ids = inner.by_event.get(&event_id)?;
        ids.iter()
            .rev()
            .filter_map(|id| inner.by_id.get(id))
            .find(|p| p.settled && !p.refunded && !p.refund_pending && &p.buyer == buyer)
            .cloned()
    }

    /// Latest already-refunded purchase by `buyer` on the event, used to
    /// distinguish "already refunded" from "never bought".
    pub(crate) fn last_refunded(&self, event_id: u64, buyer: &AccountId) -> Option<Uuid> {
        let inner = self.read();
        let ids = inner.by_event.get(&event_id)?;
        ids.iter()
            .rev()
            .filter_map(|id| inner.by_id.get(id))
            .find(|p| p.refunded && &p.buyer == buyer)
            .map(|p| p.purchase_id)
    }

    /// Every settled purchase of the event with no refund settled or in
    /// flight, oldest first.
    pub(crate) fn open_for_event(&self, event_id: u64) -> Vec<TicketPurchase> {
        let inner = self.read();
        inner
            .by_event
            .get(&event_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| inner.by_id.get(id))
                    .filter(|p| p.settled && !p.refunded && !p.refund_pending)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every purchase of the event, for display.
    pub(crate) fn for_event(&self, event_id: u64) -> Vec<TicketPurchase> {
        let inner = self.read();
        inner
            .by_event
            .get(&event_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| inner.by_id.get(id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl TicketLedger {
    /// Buys `quantity` tickets for `buyer`, forwarding the payment to the
    /// event creator.
    ///
    /// Preconditions are checked in order: the event exists and is active,
    /// the quantity is at least one, the payment equals quantity x price
    /// exactly, and enough inventory remains. The inventory
    /// check-and-increment and the purchase append happen under the
    /// per-event lock, so concurrent buyers racing for the last units cannot
    /// oversell: at most one claims them, the rest fail with no trace.
    ///
    /// The payment is forwarded after the lock is released; a transfer
    /// failure or timeout rolls the reservation back before the error is
    /// returned.
    pub async fn buy_tickets(
        &self,
        event_id: u64,
        buyer: AccountId,
        quantity: u32,
        payment_amount: u64,
    ) -> Result<PurchaseReceipt, LedgerError> {
        // Checked again under the lock; this keeps scans of nonexistent ids
        // from materializing lock entries.
        if !self.registry.contains(event_id) {
            return Err(LedgerError::EventNotFound(event_id));
        }
        let guard = self.lock_event(event_id).await?;

        let creator = self.registry.with_event_mut(event_id, |event| {
            if !event.is_active {
                return Err(LedgerError::EventInactive(event_id));
            }
            if quantity == 0 {
                return Err(LedgerError::InvalidQuantity);
            }
            let expected = event
                .price_per_ticket
                .checked_mul(u64::from(quantity))
                .ok_or_else(|| {
                    LedgerError::Validation("ticket cost overflows u64".to_string())
                })?;
            if payment_amount != expected {
                return Err(LedgerError::PaymentMismatch {
                    expected,
                    got: payment_amount,
                });
            }
            if quantity > event.remaining() {
                return Err(LedgerError::InsufficientInventory {
                    requested: quantity,
                    available: event.remaining(),
                });
            }
            event.tickets_sold += quantity;
            Ok(event.creator.clone())
        })?;

        let purchase = TicketPurchase::pending(event_id, buyer.clone(), quantity, payment_amount);
        self.purchases.insert(purchase.clone());
        drop(guard);

        debug!(
            event_id,
            %buyer,
            quantity,
            amount = payment_amount,
            "inventory reserved, forwarding payment to creator"
        );

        match self.attempt_transfer(&creator, payment_amount).await {
            Ok(transfer_id) => {
                self.purchases.settle(purchase.purchase_id);
                let mut settled = purchase.clone();
                settled.settled = true;
                self.journal_settled(&JournalEntry::TicketsPurchased { purchase: settled });

                info!(
                    event_id,
                    %buyer,
                    quantity,
                    amount = payment_amount,
                    purchase_id = %purchase.purchase_id,
                    %transfer_id,
                    "tickets purchased"
                );
                Ok(PurchaseReceipt {
                    purchase_id: purchase.purchase_id,
                    event_id,
                    buyer,
                    quantity,
                    amount_paid: payment_amount,
                    transfer_id,
                    timestamp: purchase.timestamp,
                })
            }
            Err(err) => {
                let _guard = self.lock_event_for_rollback(event_id).await;
                self.purchases.remove(purchase.purchase_id);
                let _ = self.registry.with_event_mut(event_id, |event| {
                    event.tickets_sold -= quantity;
                    Ok(())
                });
                self.journal_settled(&JournalEntry::PurchaseRolledBack {
                    event_id,
                    purchase_id: purchase.purchase_id,
                    reason: err.to_string(),
                });
                warn!(
                    event_id,
                    %buyer,
                    quantity,
                    error = %err,
                    "payment forwarding failed, reservation rolled back"
                );
                Err(LedgerError::TransferFailed(err))
            }
        }
    }
}

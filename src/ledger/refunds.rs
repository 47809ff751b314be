//! Refunds: buyer-initiated cancellations and organizer-initiated event
//! cancellation.

use tracing::{info, warn};

use crate::journal::JournalEntry;
use crate::models::{AccountId, BulkRefundReport, FailedRefund, RefundReceipt, TicketPurchase};
use crate::utils::error::LedgerError;

use super::TicketLedger;

impl TicketLedger {
    /// Cancels the buyer's latest open purchase on the event, refunding the
    /// full `amount_paid` and freeing the inventory. Partial-quantity
    /// refunds are not supported.
    ///
    /// A repeat call on a purchase that was already refunded fails with
    /// `AlreadyRefunded`; the refund itself happens at most once.
    pub async fn cancel_purchase(
        &self,
        event_id: u64,
        buyer: AccountId,
    ) -> Result<RefundReceipt, LedgerError> {
        // Checked again under the lock; this keeps scans of nonexistent ids
        // from materializing lock entries.
        if !self.registry.contains(event_id) {
            return Err(LedgerError::EventNotFound(event_id));
        }
        let guard = self.lock_event(event_id).await?;

        if self.registry.snapshot(event_id).is_none() {
            return Err(LedgerError::EventNotFound(event_id));
        }

        let Some(purchase) = self.purchases.find_open(event_id, &buyer) else {
            return Err(match self.purchases.last_refunded(event_id, &buyer) {
                Some(purchase_id) => LedgerError::AlreadyRefunded(purchase_id),
                None => LedgerError::NoPurchaseFound { event_id, buyer },
            });
        };

        self.purchases.hold_for_refund(purchase.purchase_id)?;
        drop(guard);

        match self.attempt_transfer(&buyer, purchase.amount_paid).await {
            Ok(transfer_id) => {
                self.settle_refund(&purchase).await;
                self.journal_settled(&JournalEntry::PurchaseRefunded {
                    event_id,
                    purchase_id: purchase.purchase_id,
                });
                info!(
                    event_id,
                    %buyer,
                    purchase_id = %purchase.purchase_id,
                    amount = purchase.amount_paid,
                    %transfer_id,
                    "purchase refunded"
                );
                Ok(RefundReceipt {
                    purchase_id: purchase.purchase_id,
                    event_id,
                    buyer,
                    quantity: purchase.quantity,
                    amount_refunded: purchase.amount_paid,
                    transfer_id,
                })
            }
            Err(err) => {
                self.rollback_refund(&purchase, &err.to_string()).await;
                warn!(
                    event_id,
                    %buyer,
                    purchase_id = %purchase.purchase_id,
                    error = %err,
                    "refund transfer failed, purchase restored"
                );
                Err(LedgerError::TransferFailed(err))
            }
        }
    }

    /// Deactivates the event and refunds every outstanding purchase.
    ///
    /// Only the event creator may cancel. Deactivation is committed first,
    /// under the same lock `buy_tickets` uses, so no purchase can slip in
    /// afterward. Refunds then proceed buyer by buyer; a failed transfer
    /// restores that purchase and is reported in the returned report instead
    /// of aborting the remainder.
    pub async fn cancel_event(
        &self,
        event_id: u64,
        actor: AccountId,
    ) -> Result<BulkRefundReport, LedgerError> {
        if !self.registry.contains(event_id) {
            return Err(LedgerError::EventNotFound(event_id));
        }
        let guard = self.lock_event(event_id).await?;

        let event = self
            .registry
            .snapshot(event_id)
            .ok_or(LedgerError::EventNotFound(event_id))?;
        if event.creator != actor {
            return Err(LedgerError::Unauthorized { event_id, actor });
        }
        if !event.is_active {
            return Err(LedgerError::EventInactive(event_id));
        }

        self.registry.with_event_mut(event_id, |event| {
            event.is_active = false;
            Ok(())
        })?;
        if let Err(e) = self.journal.append(&JournalEntry::EventDeactivated { event_id }) {
            // Nothing else has happened yet; undo and surface the failure.
            let _ = self.registry.with_event_mut(event_id, |event| {
                event.is_active = true;
                Ok(())
            });
            return Err(e.into());
        }

        let outstanding = self.purchases.open_for_event(event_id);
        drop(guard);

        info!(
            event_id,
            %actor,
            outstanding = outstanding.len(),
            "event cancelled, refunding outstanding purchases"
        );

        let mut report = BulkRefundReport {
            event_id,
            refunded_purchases: 0,
            amount_refunded: 0,
            failed: Vec::new(),
        };

        for purchase in outstanding {
            // A buyer-initiated cancellation may have raced us.
            if self.purchases.hold_for_refund(purchase.purchase_id).is_err() {
                continue;
            }

            match self
                .attempt_transfer(&purchase.buyer, purchase.amount_paid)
                .await
            {
                Ok(transfer_id) => {
                    self.settle_refund(&purchase).await;
                    self.journal_settled(&JournalEntry::PurchaseRefunded {
                        event_id,
                        purchase_id: purchase.purchase_id,
                    });
                    info!(
                        event_id,
                        buyer = %purchase.buyer,
                        amount = purchase.amount_paid,
                        %transfer_id,
                        "bulk refund delivered"
                    );
                    report.refunded_purchases += 1;
                    report.amount_refunded += purchase.amount_paid;
                }
                Err(err) => {
                    self.rollback_refund(&purchase, &err.to_string()).await;
                    warn!(
                        event_id,
                        buyer = %purchase.buyer,
                        purchase_id = %purchase.purchase_id,
                        error = %err,
                        "bulk refund transfer failed, continuing with remaining buyers"
                    );
                    report.failed.push(FailedRefund {
                        purchase_id: purchase.purchase_id,
                        buyer: purchase.buyer.clone(),
                        amount: purchase.amount_paid,
                        reason: err.to_string(),
                    });
                }
            }
        }

        Ok(report)
    }

    /// Marks a held purchase refunded and frees its inventory, after the
    /// refund transfer succeeded. The quantity leaves `tickets_sold` only
    /// here: a refund in flight keeps its units reserved, so a rollback
    /// never has to resurrect tickets that were resold in the meantime.
    async fn settle_refund(&self, purchase: &TicketPurchase) {
        let _guard = self.lock_event_for_rollback(purchase.event_id).await;
        let _ = self.purchases.mark_refunded(purchase.purchase_id);
        let _ = self.registry.with_event_mut(purchase.event_id, |event| {
            event.tickets_sold -= purchase.quantity;
            Ok(())
        });
    }

    /// Releases the refund hold after a failed refund transfer; the purchase
    /// goes back to being open. Inventory never moved, so nothing else to
    /// undo.
    async fn rollback_refund(&self, purchase: &TicketPurchase, reason: &str) {
        let _guard = self.lock_event_for_rollback(purchase.event_id).await;
        self.purchases.release_refund_hold(purchase.purchase_id);
        self.journal_settled(&JournalEntry::RefundRolledBack {
            event_id: purchase.event_id,
            purchase_id: purchase.purchase_id,
            reason: reason.to_string(),
        });
    }
}

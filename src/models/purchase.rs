use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::AccountId;

/// One settled or in-flight ticket purchase. Records are kept for the
/// lifetime of the ledger as an audit trail; a refund flips `refunded`
/// exactly once, it never deletes the record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TicketPurchase {
    pub purchase_id: Uuid,
    pub event_id: u64,
    pub buyer: AccountId,
    pub quantity: u32,
    /// quantity x price_per_ticket, evaluated at purchase time, in wei.
    pub amount_paid: u64,
    pub timestamp: DateTime<Utc>,
    pub refunded: bool,
    /// False only while the buyer's payment is being forwarded. Unsettled
    /// purchases are invisible to the refund paths.
    #[serde(default = "default_settled")]
    pub settled: bool,
    /// True only while a refund transfer for this purchase is in flight.
    /// The quantity stays counted in `tickets_sold` until the transfer
    /// settles, so the units cannot be resold and then resurrected by a
    /// refund rollback.
    #[serde(skip)]
    pub refund_pending: bool,
}

fn default_settled() -> bool {
    true
}

impl TicketPurchase {
    pub(crate) fn pending(
        event_id: u64,
        buyer: AccountId,
        quantity: u32,
        amount_paid: u64,
    ) -> Self {
        Self {
            purchase_id: Uuid::new_v4(),
            event_id,
            buyer,
            quantity,
            amount_paid,
            timestamp: Utc::now(),
            refunded: false,
            settled: false,
            refund_pending: false,
        }
    }
}

/// Returned to the buyer on a successful purchase.
#[derive(Debug, Clone, Serialize)]
pub struct PurchaseReceipt {
    pub purchase_id: Uuid,
    pub event_id: u64,
    pub buyer: AccountId,
    pub quantity: u32,
    pub amount_paid: u64,
    /// Identifier of the outbound payment to the event creator.
    pub transfer_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Returned on a successful buyer-initiated cancellation.
#[derive(Debug, Clone, Serialize)]
pub struct RefundReceipt {
    pub purchase_id: Uuid,
    pub event_id: u64,
    pub buyer: AccountId,
    pub quantity: u32,
    pub amount_refunded: u64,
    pub transfer_id: String,
}

/// Outcome of an organizer-initiated event cancellation. The operation
/// succeeds even when individual refund transfers fail; those buyers are
/// listed in `failed` so the refunds can be retried.
#[derive(Debug, Clone, Serialize)]
pub struct BulkRefundReport {
    pub event_id: u64,
    pub refunded_purchases: u32,
    pub amount_refunded: u64,
    pub failed: Vec<FailedRefund>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedRefund {
    pub purchase_id: Uuid,
    pub buyer: AccountId,
    pub amount: u64,
    pub reason: String,
}

//! Read-side: consistent snapshots for display.
//!
//! Snapshots are record clones taken under the registry read lock, so a
//! reader never sees `tickets_sold` and `total_tickets` from two different
//! versions, even while writers are active. Reads are not linearizable with
//! in-flight writes and do not need to be.

use crate::models::{Event, FeeRecord, TicketPurchase};

use super::TicketLedger;

impl TicketLedger {
    /// One consistent snapshot of an event, if it exists. Pure read.
    pub fn get_event(&self, event_id: u64) -> Option<Event> {
        self.registry.snapshot(event_id)
    }

    /// Snapshots of all events in creation order. Pure read.
    pub fn list_events(&self) -> Vec<Event> {
        self.registry.list()
    }

    /// Every purchase recorded against the event, including refunded ones.
    pub fn purchases_for_event(&self, event_id: u64) -> Vec<TicketPurchase> {
        self.purchases.for_event(event_id)
    }

    /// Cumulative protocol fees collected, in wei.
    pub fn fee_balance(&self) -> u64 {
        self.treasury.balance()
    }

    /// The append-only fee ledger.
    pub fn fee_records(&self) -> Vec<FeeRecord> {
        self.treasury.records()
    }
}

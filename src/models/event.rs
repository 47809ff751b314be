use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::AccountId;

/// A ticketed event with fixed inventory and a per-ticket price.
///
/// All monetary fields are integers in wei; ticket counts are integers.
/// `tickets_sold` is mutated only through the sales and refund paths, never
/// directly by callers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Event {
    pub event_id: u64,
    pub name: String,
    pub total_tickets: u32,
    pub tickets_sold: u32,
    /// Price per ticket in wei. Zero is allowed (free events).
    pub price_per_ticket: u64,
    pub description: String,
    pub is_active: bool,
    pub creator: AccountId,
    /// Unix timestamp supplied by the organizer.
    pub event_date: i64,
    pub created_at: DateTime<Utc>,
    /// Bumped on every mutation of this record.
    pub version: u64,
}

impl Event {
    /// Tickets still purchasable.
    pub fn remaining(&self) -> u32 {
        self.total_tickets - self.tickets_sold
    }
}

/// Organizer-supplied fields for event creation.
#[derive(Debug, Clone, Deserialize)]
pub struct NewEvent {
    pub event_id: u64,
    pub name: String,
    pub total_tickets: u32,
    pub price_per_ticket: u64,
    pub description: String,
    pub event_date: i64,
    pub creator: AccountId,
}

impl NewEvent {
    pub(crate) fn into_event(self, created_at: DateTime<Utc>) -> Event {
        Event {
            event_id: self.event_id,
            name: self.name,
            total_tickets: self.total_tickets,
            tickets_sold: 0,
            price_per_ticket: self.price_per_ticket,
            description: self.description,
            is_active: true,
            creator: self.creator,
            event_date: self.event_date,
            created_at,
            version: 0,
        }
    }
}

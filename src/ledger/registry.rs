//! Event records and their creation.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use tracing::info;

use crate::journal::JournalEntry;
use crate::models::{Event, FeePurpose, FeeRecord, NewEvent};
use crate::utils::error::LedgerError;

use super::TicketLedger;

/// Owner of all [`Event`] records. Uniqueness of `event_id` is enforced
/// here, under the registry write lock; insertion order is preserved for
/// listing.
pub struct EventRegistry {
    inner: RwLock<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    events: HashMap<u64, Event>,
    order: Vec<u64>,
}

impl EventRegistry {
    pub(crate) fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner::default()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn len(&self) -> usize {
        self.read().order.len()
    }

    pub(crate) fn contains(&self, event_id: u64) -> bool {
        self.read().events.contains_key(&event_id)
    }

    /// Registers a new event; the uniqueness check and the insert are one
    /// step under the write lock.
    pub(crate) fn insert(&self, event: Event) -> Result<(), LedgerError> {
        let mut inner = self.write();
        if inner.events.contains_key(&event.event_id) {
            return Err(LedgerError::EventAlreadyExists(event.event_id));
        }
        inner.order.push(event.event_id);
        inner.events.insert(event.event_id, event);
        Ok(())
    }

    /// Undoes an insert whose commit failed. Never part of normal flow.
    pub(crate) fn remove(&self, event_id: u64) {
        let mut inner = self.write();
        if inner.events.remove(&event_id).is_some() {
            inner.order.retain(|id| *id != event_id);
        }
    }

    /// One consistent version of the record; the clone happens under the
    /// read lock, so it can never observe a half-applied mutation.
    pub(crate) fn snapshot(&self, event_id: u64) -> Option<Event> {
        self.read().events.get(&event_id).cloned()
    }

    /// Snapshots of every event, in insertion order.
    pub(crate) fn list(&self) -> Vec<Event> {
        let inner = self.read();
        inner
            .order
            .iter()
            .filter_map(|id| inner.events.get(id).cloned())
            .collect()
    }

    /// Applies `f` to the record under the write lock. The version bump
    /// happens only when `f` succeeds; a rejected closure leaves no trace.
    pub(crate) fn with_event_mut<T>(
        &self,
        event_id: u64,
        f: impl FnOnce(&mut Event) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        let mut inner = self.write();
        let event = inner
            .events
            .get_mut(&event_id)
            .ok_or(LedgerError::EventNotFound(event_id))?;
        let out = f(event)?;
        event.version += 1;
        Ok(out)
    }
}

impl TicketLedger {
    /// Registers a new event. The registration and the creation-fee
    /// collection are one atomic unit: a failed registration charges no fee,
    /// and a fee that cannot be committed voids the registration.
    ///
    /// The fee must match [`TicketLedger::creation_fee`] exactly; there is
    /// no change-giving and no partial acceptance.
    pub fn create_event(&self, new_event: NewEvent, paid_fee: u64) -> Result<Event, LedgerError> {
        if self.registry.contains(new_event.event_id) {
            return Err(LedgerError::EventAlreadyExists(new_event.event_id));
        }
        if new_event.total_tickets == 0 {
            return Err(LedgerError::InvalidTicketCount);
        }
        if paid_fee != self.creation_fee() {
            return Err(LedgerError::InvalidFee {
                expected: self.creation_fee(),
                got: paid_fee,
            });
        }
        if new_event.name.trim().is_empty() {
            return Err(LedgerError::Validation(
                "event name must not be empty".to_string(),
            ));
        }

        let event = new_event.into_event(Utc::now());
        self.registry.insert(event.clone())?;

        let record = FeeRecord::new(paid_fee, event.creator.clone(), FeePurpose::EventCreation);
        self.treasury.collect_record(record.clone());

        // The event and its fee go down as one journal line, so a crash can
        // never persist one without the other.
        let committed = self.journal.append(&JournalEntry::EventCreated {
            event: event.clone(),
            fee: record.clone(),
        });
        if let Err(e) = committed {
            self.treasury.revoke(&record);
            self.registry.remove(event.event_id);
            return Err(e.into());
        }

        info!(
            event_id = event.event_id,
            creator = %event.creator,
            total_tickets = event.total_tickets,
            price_per_ticket = event.price_per_ticket,
            fee = paid_fee,
            "event created"
        );
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn event(id: u64) -> Event {
        NewEvent {
            event_id: id,
            name: format!("event {id}"),
            total_tickets: 5,
            price_per_ticket: 2,
            description: String::new(),
            event_date: 1_900_000_000,
            creator: "0xcreator".into(),
        }
        .into_event(Utc::now())
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let registry = EventRegistry::new();
        registry.insert(event(1)).unwrap();
        assert!(matches!(
            registry.insert(event(1)),
            Err(LedgerError::EventAlreadyExists(1))
        ));
    }

    #[test]
    fn listing_preserves_insertion_order() {
        let registry = EventRegistry::new();
        for id in [3, 1, 2] {
            registry.insert(event(id)).unwrap();
        }
        let ids: Vec<u64> = registry.list().iter().map(|e| e.event_id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[test]
    fn rejected_mutation_leaves_no_trace() {
        let registry = EventRegistry::new();
        registry.insert(event(1)).unwrap();
        let err = registry.with_event_mut(1, |_| {
            Err::<(), _>(LedgerError::InvalidQuantity)
        });
        assert!(err.is_err());
        let snap = registry.snapshot(1).unwrap();
        assert_eq!(snap.version, 0);
        assert_eq!(snap.tickets_sold, 0);
    }
}

//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use ticketchain_server::ledger::{LedgerSettings, TicketLedger, DEFAULT_CREATION_FEE_WEI};
use ticketchain_server::models::{AccountId, NewEvent};
use ticketchain_server::transfer::{FundTransfer, MockTransfer, TransferError, TransferResult};

pub const FEE: u64 = DEFAULT_CREATION_FEE_WEI;
pub const CREATOR: &str = "0xcreator";

pub fn settings(dir: &TempDir) -> LedgerSettings {
    LedgerSettings {
        journal_path: dir.path().join("ledger.journal"),
        lock_wait: Duration::from_secs(10),
        ..Default::default()
    }
}

pub fn open_ledger(dir: &TempDir) -> TicketLedger {
    open_with(dir, MockTransfer::shared())
}

pub fn open_with(dir: &TempDir, transfer: Arc<dyn FundTransfer>) -> TicketLedger {
    TicketLedger::open(settings(dir), transfer).expect("ledger should open")
}

pub fn new_event(event_id: u64, total_tickets: u32, price_per_ticket: u64) -> NewEvent {
    NewEvent {
        event_id,
        name: format!("event {event_id}"),
        total_tickets,
        price_per_ticket,
        description: "integration fixture".to_string(),
        event_date: 1_900_000_000,
        creator: CREATOR.to_string(),
    }
}

/// Transfer collaborator that rejects everything.
pub struct FailingTransfer;

impl FundTransfer for FailingTransfer {
    fn send(
        &self,
        _to: &AccountId,
        _amount: u64,
    ) -> Pin<Box<dyn Future<Output = TransferResult> + Send>> {
        Box::pin(async {
            Err(TransferError::Rejected {
                reason: "declined by test".to_string(),
            })
        })
    }
}

/// Transfer collaborator that fails only for the listed recipients.
pub struct FailFor {
    rejected: HashSet<AccountId>,
}

impl FailFor {
    pub fn accounts(rejected: &[&str]) -> Arc<dyn FundTransfer> {
        Arc::new(Self {
            rejected: rejected.iter().map(|a| a.to_string()).collect(),
        })
    }
}

impl FundTransfer for FailFor {
    fn send(
        &self,
        to: &AccountId,
        _amount: u64,
    ) -> Pin<Box<dyn Future<Output = TransferResult> + Send>> {
        let fail = self.rejected.contains(to);
        let to = to.clone();
        Box::pin(async move {
            if fail {
                Err(TransferError::Rejected {
                    reason: format!("transfers to {to} rejected by test"),
                })
            } else {
                Ok(format!("test_txn_{to}"))
            }
        })
    }
}

/// Transfer collaborator that takes `delay` and then rejects, but only for
/// the listed recipients; everyone else succeeds immediately.
pub struct SlowFailFor {
    rejected: HashSet<AccountId>,
    delay: Duration,
}

impl SlowFailFor {
    pub fn accounts(rejected: &[&str], delay: Duration) -> Arc<dyn FundTransfer> {
        Arc::new(Self {
            rejected: rejected.iter().map(|a| a.to_string()).collect(),
            delay,
        })
    }
}

impl FundTransfer for SlowFailFor {
    fn send(
        &self,
        to: &AccountId,
        _amount: u64,
    ) -> Pin<Box<dyn Future<Output = TransferResult> + Send>> {
        let fail = self.rejected.contains(to);
        let delay = self.delay;
        let to = to.clone();
        Box::pin(async move {
            if fail {
                tokio::time::sleep(delay).await;
                Err(TransferError::Rejected {
                    reason: format!("transfers to {to} rejected by test"),
                })
            } else {
                Ok(format!("test_txn_{to}"))
            }
        })
    }
}

/// Transfer collaborator slower than any sane timeout.
pub struct SlowTransfer {
    pub delay: Duration,
}

impl FundTransfer for SlowTransfer {
    fn send(
        &self,
        _to: &AccountId,
        _amount: u64,
    ) -> Pin<Box<dyn Future<Output = TransferResult> + Send>> {
        let delay = self.delay;
        Box::pin(async move {
            tokio::time::sleep(delay).await;
            Ok("too_late".to_string())
        })
    }
}

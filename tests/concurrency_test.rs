//! Races on a single event's inventory: concurrent buyers must never
//! oversell, and losers must leave no trace.

mod common;

use std::sync::Arc;

use std::time::Duration;

use common::{new_event, open_ledger, open_with, SlowFailFor, CREATOR, FEE};
use ticketchain_server::utils::error::LedgerError;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn one_hundred_buyers_race_for_one_ticket() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = Arc::new(open_ledger(&dir));
    ledger.create_event(new_event(1, 1, 5), FEE).unwrap();

    let mut tasks = Vec::new();
    for i in 0..100u32 {
        let ledger = ledger.clone();
        tasks.push(tokio::spawn(async move {
            ledger.buy_tickets(1, format!("0xbuyer{i}"), 1, 5).await
        }));
    }

    let mut successes = 0;
    let mut sold_out = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => successes += 1,
            Err(LedgerError::InsufficientInventory { .. }) => sold_out += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(sold_out, 99);
    assert_eq!(ledger.get_event(1).unwrap().tickets_sold, 1);
    assert_eq!(ledger.purchases_for_event(1).len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn successful_quantities_never_exceed_inventory() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = Arc::new(open_ledger(&dir));
    ledger.create_event(new_event(1, 10, 2), FEE).unwrap();

    let mut tasks = Vec::new();
    for i in 0..30u32 {
        let ledger = ledger.clone();
        let quantity = i % 3 + 1;
        tasks.push(tokio::spawn(async move {
            ledger
                .buy_tickets(1, format!("0xbuyer{i}"), quantity, u64::from(quantity) * 2)
                .await
                .map(|receipt| receipt.quantity)
        }));
    }

    let mut claimed = 0u32;
    for task in tasks {
        if let Ok(quantity) = task.await.unwrap() {
            claimed += quantity;
        }
    }

    assert!(claimed <= 10);
    let event = ledger.get_event(1).unwrap();
    assert_eq!(event.tickets_sold, claimed);
    assert!(event.tickets_sold <= event.total_tickets);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_buys_and_cancels_keep_the_books_balanced() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = Arc::new(open_ledger(&dir));
    ledger.create_event(new_event(1, 50, 1), FEE).unwrap();

    let mut tasks = Vec::new();
    for i in 0..20u32 {
        let ledger = ledger.clone();
        tasks.push(tokio::spawn(async move {
            let buyer = format!("0xbuyer{i}");
            let _ = ledger.buy_tickets(1, buyer.clone(), 2, 2).await;
            if i % 2 == 0 {
                let _ = ledger.cancel_purchase(1, buyer).await;
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let event = ledger.get_event(1).unwrap();
    let open_quantity: u32 = ledger
        .purchases_for_event(1)
        .iter()
        .filter(|p| !p.refunded)
        .map(|p| p.quantity)
        .sum();
    assert_eq!(event.tickets_sold, open_quantity);
    assert!(event.tickets_sold <= event.total_tickets);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn operations_on_different_events_proceed_independently() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = Arc::new(open_ledger(&dir));
    for id in 1..=4 {
        ledger.create_event(new_event(id, 25, 3), FEE).unwrap();
    }

    let mut tasks = Vec::new();
    for id in 1..=4u64 {
        for i in 0..25u32 {
            let ledger = ledger.clone();
            tasks.push(tokio::spawn(async move {
                ledger
                    .buy_tickets(id, format!("0xbuyer{id}_{i}"), 1, 3)
                    .await
            }));
        }
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    for id in 1..=4 {
        assert_eq!(ledger.get_event(id).unwrap().tickets_sold, 25);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cancellation_racing_buyers_never_oversells_or_double_refunds() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = Arc::new(open_ledger(&dir));
    ledger.create_event(new_event(1, 100, 1), FEE).unwrap();
    for i in 0..10u32 {
        ledger
            .buy_tickets(1, format!("0xbuyer{i}"), 1, 1)
            .await
            .unwrap();
    }

    // Buyers cancel individually while the organizer cancels the event.
    let mut tasks = Vec::new();
    for i in 0..10u32 {
        let ledger = ledger.clone();
        tasks.push(tokio::spawn(async move {
            let _ = ledger.cancel_purchase(1, format!("0xbuyer{i}")).await;
        }));
    }
    let organizer = {
        let ledger = ledger.clone();
        tokio::spawn(async move { ledger.cancel_event(1, CREATOR.into()).await })
    };

    for task in tasks {
        task.await.unwrap();
    }
    organizer.await.unwrap().unwrap();

    // However the race interleaved, every purchase ends refunded exactly
    // once and the inventory count drops to zero.
    let event = ledger.get_event(1).unwrap();
    assert!(!event.is_active);
    assert_eq!(event.tickets_sold, 0);
    assert!(ledger.purchases_for_event(1).iter().all(|p| p.refunded));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn buyers_racing_a_failing_refund_cannot_oversell() {
    let dir = tempfile::tempdir().unwrap();
    // Refunds to alice hang for a while and then fail; everything else,
    // including the payments to the creator, succeeds immediately.
    let ledger = Arc::new(open_with(
        &dir,
        SlowFailFor::accounts(&["0xalice"], Duration::from_millis(300)),
    ));
    ledger.create_event(new_event(1, 10, 1), FEE).unwrap();
    ledger.buy_tickets(1, "0xalice".into(), 4, 4).await.unwrap();
    ledger.buy_tickets(1, "0xbob".into(), 6, 6).await.unwrap();

    // Alice's refund is in flight; her units must stay off the market the
    // whole time, because the refund may yet fail.
    let cancel = {
        let ledger = ledger.clone();
        tokio::spawn(async move { ledger.cancel_purchase(1, "0xalice".into()).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let err = ledger
        .buy_tickets(1, "0xcarol".into(), 1, 1)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::InsufficientInventory { available: 0, .. }
    ));

    let refund = cancel.await.unwrap();
    assert!(matches!(refund, Err(LedgerError::TransferFailed(_))));

    // The failed refund restored alice's purchase; the books still balance
    // and nothing was oversold.
    let event = ledger.get_event(1).unwrap();
    assert_eq!(event.tickets_sold, 10);
    let open_quantity: u32 = ledger
        .purchases_for_event(1)
        .iter()
        .filter(|p| !p.refunded)
        .map(|p| p.quantity)
        .sum();
    assert_eq!(event.tickets_sold, open_quantity);
}

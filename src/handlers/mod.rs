use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::ledger::TicketLedger;
use crate::models::{AccountId, NewEvent};
use crate::utils::error::LedgerError;
use crate::utils::response::{created, success};

/// Shared handler state: the ledger plus the retry budget for lost lock
/// races.
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<TicketLedger>,
    pub conflict_retries: u32,
}

/// Retries `op` while it fails with a retryable conflict, up to `retries`
/// extra attempts with a short growing backoff. All other errors pass
/// through untouched.
async fn with_conflict_retry<T, F, Fut>(retries: u32, mut op: F) -> Result<T, LedgerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LedgerError>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Err(e) if e.is_retryable() && attempt < retries => {
                attempt += 1;
                tokio::time::sleep(Duration::from_millis(20 * u64::from(attempt))).await;
            }
            other => return other,
        }
    }
}

#[derive(Serialize)]
struct HealthPayload {
    status: &'static str,
    service: &'static str,
}

pub async fn health_check() -> Response {
    let payload = HealthPayload {
        status: "ok",
        service: "ticketchain-api",
    };
    success(payload, "Health check successful").into_response()
}

#[derive(Deserialize)]
pub struct CreateEventRequest {
    pub event_id: u64,
    pub name: String,
    pub total_tickets: u32,
    pub price_per_ticket: u64,
    #[serde(default)]
    pub description: String,
    pub event_date: i64,
    pub creator: AccountId,
    /// Must equal the configured creation fee exactly.
    pub paid_fee: u64,
}

pub async fn create_event(
    State(state): State<AppState>,
    Json(req): Json<CreateEventRequest>,
) -> Result<Response, LedgerError> {
    let new_event = NewEvent {
        event_id: req.event_id,
        name: req.name,
        total_tickets: req.total_tickets,
        price_per_ticket: req.price_per_ticket,
        description: req.description,
        event_date: req.event_date,
        creator: req.creator,
    };
    let event = state.ledger.create_event(new_event, req.paid_fee)?;
    Ok(created(event, "Event created").into_response())
}

pub async fn list_events(State(state): State<AppState>) -> Response {
    success(state.ledger.list_events(), "Events fetched").into_response()
}

pub async fn get_event(
    State(state): State<AppState>,
    Path(event_id): Path<u64>,
) -> Result<Response, LedgerError> {
    let event = state
        .ledger
        .get_event(event_id)
        .ok_or(LedgerError::EventNotFound(event_id))?;
    Ok(success(event, "Event fetched").into_response())
}

#[derive(Deserialize)]
pub struct BuyTicketsRequest {
    pub buyer: AccountId,
    pub quantity: u32,
    /// Attached payment in wei; must equal quantity x price exactly.
    pub payment_amount: u64,
}

pub async fn buy_tickets(
    State(state): State<AppState>,
    Path(event_id): Path<u64>,
    Json(req): Json<BuyTicketsRequest>,
) -> Result<Response, LedgerError> {
    let receipt = with_conflict_retry(state.conflict_retries, || {
        let ledger = state.ledger.clone();
        let buyer = req.buyer.clone();
        let quantity = req.quantity;
        let payment_amount = req.payment_amount;
        async move {
            ledger
                .buy_tickets(event_id, buyer, quantity, payment_amount)
                .await
        }
    })
    .await?;
    Ok(success(receipt, "Tickets purchased").into_response())
}

#[derive(Deserialize)]
pub struct CancelPurchaseRequest {
    pub buyer: AccountId,
}

pub async fn cancel_purchase(
    State(state): State<AppState>,
    Path(event_id): Path<u64>,
    Json(req): Json<CancelPurchaseRequest>,
) -> Result<Response, LedgerError> {
    let receipt = with_conflict_retry(state.conflict_retries, || {
        let ledger = state.ledger.clone();
        let buyer = req.buyer.clone();
        async move { ledger.cancel_purchase(event_id, buyer).await }
    })
    .await?;
    Ok(success(receipt, "Purchase refunded").into_response())
}

#[derive(Deserialize)]
pub struct CancelEventRequest {
    /// Must be the event creator.
    pub actor: AccountId,
}

pub async fn cancel_event(
    State(state): State<AppState>,
    Path(event_id): Path<u64>,
    Json(req): Json<CancelEventRequest>,
) -> Result<Response, LedgerError> {
    let report = with_conflict_retry(state.conflict_retries, || {
        let ledger = state.ledger.clone();
        let actor = req.actor.clone();
        async move { ledger.cancel_event(event_id, actor).await }
    })
    .await?;
    Ok(success(report, "Event cancelled").into_response())
}

pub async fn list_purchases(
    State(state): State<AppState>,
    Path(event_id): Path<u64>,
) -> Result<Response, LedgerError> {
    if state.ledger.get_event(event_id).is_none() {
        return Err(LedgerError::EventNotFound(event_id));
    }
    Ok(success(state.ledger.purchases_for_event(event_id), "Purchases fetched").into_response())
}

#[derive(Serialize)]
struct TreasuryView {
    balance: u64,
    collected_fees: usize,
}

pub async fn treasury_view(State(state): State<AppState>) -> Response {
    let payload = TreasuryView {
        balance: state.ledger.fee_balance(),
        collected_fees: state.ledger.fee_records().len(),
    };
    success(payload, "Treasury fetched").into_response()
}

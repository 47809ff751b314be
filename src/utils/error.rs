use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

use crate::models::AccountId;
use crate::transfer::TransferError;
use crate::utils::response::error as error_response;

/// Everything a ledger operation can fail with.
///
/// Validation, not-found, state and authorization errors are terminal and
/// have no side effects. `ConcurrencyConflict` is the only retryable
/// variant. `TransferFailed` is surfaced only after the compensating
/// rollback has already been applied.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Event {0} already exists")]
    EventAlreadyExists(u64),

    #[error("Total tickets must be greater than zero")]
    InvalidTicketCount,

    #[error("Creation fee must be exactly {expected} wei, got {got}")]
    InvalidFee { expected: u64, got: u64 },

    #[error("Event {0} not found")]
    EventNotFound(u64),

    #[error("Event {0} is no longer active")]
    EventInactive(u64),

    #[error("Quantity must be at least one")]
    InvalidQuantity,

    #[error("Payment of {got} wei does not match required {expected} wei")]
    PaymentMismatch { expected: u64, got: u64 },

    #[error("Requested {requested} tickets but only {available} remain")]
    InsufficientInventory { requested: u32, available: u32 },

    #[error("No open purchase for buyer {buyer} on event {event_id}")]
    NoPurchaseFound { event_id: u64, buyer: AccountId },

    #[error("Purchase {0} was already refunded")]
    AlreadyRefunded(Uuid),

    #[error("Account {actor} is not the creator of event {event_id}")]
    Unauthorized { event_id: u64, actor: AccountId },

    #[error("Operation on event {0} lost the lock race")]
    ConcurrencyConflict(u64),

    #[error("Fund transfer failed: {0}")]
    TransferFailed(#[from] TransferError),

    #[error("Journal error")]
    Journal(#[from] std::io::Error),
}

impl LedgerError {
    /// True for errors the caller layer may safely retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::ConcurrencyConflict(_))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            LedgerError::Validation(_)
            | LedgerError::InvalidTicketCount
            | LedgerError::InvalidQuantity
            | LedgerError::InvalidFee { .. }
            | LedgerError::PaymentMismatch { .. } => StatusCode::BAD_REQUEST,
            LedgerError::EventNotFound(_) | LedgerError::NoPurchaseFound { .. } => {
                StatusCode::NOT_FOUND
            }
            LedgerError::EventAlreadyExists(_)
            | LedgerError::EventInactive(_)
            | LedgerError::InsufficientInventory { .. }
            | LedgerError::AlreadyRefunded(_)
            | LedgerError::ConcurrencyConflict(_) => StatusCode::CONFLICT,
            LedgerError::Unauthorized { .. } => StatusCode::FORBIDDEN,
            LedgerError::TransferFailed(_) => StatusCode::BAD_GATEWAY,
            LedgerError::Journal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::Validation(_) => "VALIDATION_ERROR",
            LedgerError::EventAlreadyExists(_) => "EVENT_ALREADY_EXISTS",
            LedgerError::InvalidTicketCount => "INVALID_TICKET_COUNT",
            LedgerError::InvalidFee { .. } => "INVALID_FEE",
            LedgerError::EventNotFound(_) => "EVENT_NOT_FOUND",
            LedgerError::EventInactive(_) => "EVENT_INACTIVE",
            LedgerError::InvalidQuantity => "INVALID_QUANTITY",
            LedgerError::PaymentMismatch { .. } => "PAYMENT_MISMATCH",
            LedgerError::InsufficientInventory { .. } => "INSUFFICIENT_INVENTORY",
            LedgerError::NoPurchaseFound { .. } => "NO_PURCHASE_FOUND",
            LedgerError::AlreadyRefunded(_) => "ALREADY_REFUNDED",
            LedgerError::Unauthorized { .. } => "UNAUTHORIZED",
            LedgerError::ConcurrencyConflict(_) => "CONCURRENCY_CONFLICT",
            LedgerError::TransferFailed(_) => "TRANSFER_FAILED",
            LedgerError::Journal(_) => "JOURNAL_ERROR",
        }
    }

    fn log(&self) {
        match self {
            LedgerError::TransferFailed(e) => {
                error!(error = %e, "outbound transfer failed, state rolled back");
            }
            LedgerError::Journal(e) => {
                error!(error = ?e, "journal error");
            }
            LedgerError::ConcurrencyConflict(event_id) => {
                warn!(event_id, "lock contention, operation may be retried");
            }
            other => {
                warn!(code = other.code(), message = %other, "ledger operation rejected");
            }
        }
    }
}

impl IntoResponse for LedgerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        self.log();

        // Journal failures are internal; everything else is safe to echo.
        let public_message = match &self {
            LedgerError::Journal(_) => "An internal storage error occurred".to_string(),
            LedgerError::TransferFailed(_) => {
                "Fund transfer failed; the operation was rolled back".to_string()
            }
            other => other.to_string(),
        };

        error_response(code, public_message, None, status)
    }
}

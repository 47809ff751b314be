//! Outbound fund transfers.
//!
//! Paying an event creator and refunding a buyer both leave the process and
//! hit a wallet/ledger collaborator. The ledger only needs the narrow
//! interface below; the real chain-backed implementation is wired in by the
//! embedding application, and a mock is provided for development and tests.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;

use crate::models::AccountId;

/// Result of a transfer attempt.
pub type TransferResult = Result<TransferId, TransferError>;

/// Opaque identifier of a completed outbound transfer (transaction hash or
/// gateway reference).
pub type TransferId = String;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransferError {
    /// The collaborator rejected the transfer outright.
    #[error("transfer rejected: {reason}")]
    Rejected { reason: String },

    /// The collaborator could not be reached.
    #[error("transfer endpoint unavailable: {reason}")]
    Unavailable { reason: String },

    /// The transfer did not complete within the configured bound. Treated
    /// identically to failure: the caller rolls back and the transfer is
    /// assumed not to have happened.
    #[error("transfer timed out")]
    Timeout,
}

/// Abstraction over the wallet/ledger collaborator that moves funds.
///
/// Returns boxed futures rather than `async fn` so the trait stays
/// dyn-compatible and the ledger can hold it as `Arc<dyn FundTransfer>`.
pub trait FundTransfer: Send + Sync {
    /// Send `amount` wei to `to`. Must be free of ledger-visible side
    /// effects on failure.
    fn send(
        &self,
        to: &AccountId,
        amount: u64,
    ) -> Pin<Box<dyn Future<Output = TransferResult> + Send>>;
}

/// Transfer implementation that always succeeds, for development and tests.
#[derive(Debug, Clone, Default)]
pub struct MockTransfer;

impl MockTransfer {
    pub const fn new() -> Self {
        Self
    }

    pub fn shared() -> Arc<dyn FundTransfer> {
        Arc::new(Self::new())
    }
}

impl FundTransfer for MockTransfer {
    fn send(
        &self,
        to: &AccountId,
        amount: u64,
    ) -> Pin<Box<dyn Future<Output = TransferResult> + Send>> {
        let to = to.clone();
        Box::pin(async move {
            let transfer_id = format!("mock_txn_{}", uuid::Uuid::new_v4());
            tracing::info!(%to, amount, %transfer_id, "mock transfer completed");
            Ok(transfer_id)
        })
    }
}

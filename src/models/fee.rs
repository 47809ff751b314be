use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::AccountId;

/// Why a fee was collected.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FeePurpose {
    EventCreation,
    Other,
}

/// One collected protocol fee. The fee ledger is append-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeeRecord {
    /// Amount in wei.
    pub amount: u64,
    pub payer: AccountId,
    pub purpose: FeePurpose,
    pub collected_at: DateTime<Utc>,
}

impl FeeRecord {
    pub(crate) fn new(amount: u64, payer: AccountId, purpose: FeePurpose) -> Self {
        Self {
            amount,
            payer,
            purpose,
            collected_at: Utc::now(),
        }
    }
}

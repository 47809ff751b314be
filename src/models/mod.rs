pub mod event;
pub mod fee;
pub mod purchase;

pub use event::{Event, NewEvent};
pub use fee::{FeePurpose, FeeRecord};
pub use purchase::{BulkRefundReport, FailedRefund, PurchaseReceipt, RefundReceipt, TicketPurchase};

/// Account identifier supplied by the wallet layer (hex address as a string).
pub type AccountId = String;

//! Business-event orchestrators.
//!
//! Each orchestrator validates its input, claims the business event (where it
//! has a caller-supplied id), and realizes it as movements inside a single
//! ledger transaction. Any failure aborts the whole event.

pub mod adjustment;
pub mod purchase;
pub mod sale;
pub mod transfer;

pub use adjustment::ManualMovement;
pub use purchase::PurchaseReceipt;
pub use sale::SaleReceipt;
pub use transfer::{TransferReceipt, TransferRequest};

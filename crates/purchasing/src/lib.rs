//! Purchasing collaborator: purchases as read-only causal inputs to the ledger.
//!
//! A purchase is received into a single warehouse; completing it turns every line
//! into one IN movement.

pub mod purchase;

pub use purchase::{Purchase, PurchaseId, PurchaseLine};

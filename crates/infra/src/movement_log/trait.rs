use std::sync::Arc;

use thiserror::Error;

use stockledger_inventory::{Movement, MovementDraft, Reference, StockKey};

use super::query::{MovementFilter, MovementPage, Pagination};

/// Movement log operation error.
///
/// These are storage failures, as opposed to domain errors (stock shortfalls,
/// validation).
#[derive(Debug, Error)]
pub enum MovementLogError {
    #[error("invalid append: {0}")]
    InvalidAppend(String),

    #[error("log unavailable: {0}")]
    Unavailable(String),
}

/// Append-only store of committed movements.
///
/// ## Append semantics
///
/// `append()` is all-or-nothing: either every draft in the batch becomes a
/// movement, or none does. The log assigns each movement a global `sequence`
/// (strictly increasing, no gaps) and a `created_at` that never decreases in
/// sequence order.
///
/// ## Read semantics
///
/// Per-record and per-reference reads return movements in ascending sequence
/// order. `recent()` returns newest first.
pub trait MovementLog: Send + Sync {
    fn append(&self, drafts: Vec<MovementDraft>) -> Result<Vec<Movement>, MovementLogError>;

    fn for_record(&self, key: StockKey) -> Result<Vec<Movement>, MovementLogError>;

    fn by_reference(&self, reference: &Reference) -> Result<Vec<Movement>, MovementLogError>;

    fn recent(&self, limit: usize) -> Result<Vec<Movement>, MovementLogError>;

    /// Every movement, ascending by sequence.
    fn all(&self) -> Result<Vec<Movement>, MovementLogError>;

    /// Filtered, paginated inspection query (newest first).
    fn query(
        &self,
        filter: &MovementFilter,
        pagination: Pagination,
    ) -> Result<MovementPage, MovementLogError> {
        let mut matching: Vec<Movement> = self
            .all()?
            .into_iter()
            .filter(|m| filter.matches(m))
            .collect();
        matching.reverse();
        Ok(MovementPage::slice(matching, pagination))
    }
}

impl<S> MovementLog for Arc<S>
where
    S: MovementLog + ?Sized,
{
    fn append(&self, drafts: Vec<MovementDraft>) -> Result<Vec<Movement>, MovementLogError> {
        (**self).append(drafts)
    }

    fn for_record(&self, key: StockKey) -> Result<Vec<Movement>, MovementLogError> {
        (**self).for_record(key)
    }

    fn by_reference(&self, reference: &Reference) -> Result<Vec<Movement>, MovementLogError> {
        (**self).by_reference(reference)
    }

    fn recent(&self, limit: usize) -> Result<Vec<Movement>, MovementLogError> {
        (**self).recent(limit)
    }

    fn all(&self) -> Result<Vec<Movement>, MovementLogError> {
        (**self).all()
    }

    fn query(
        &self,
        filter: &MovementFilter,
        pagination: Pagination,
    ) -> Result<MovementPage, MovementLogError> {
        (**self).query(filter, pagination)
    }
}

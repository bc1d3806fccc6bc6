use stockledger_core::{DomainError, UserId};
use stockledger_inventory::{Direction, MovementDraft, MovementId, Reference, StockKey, next_quantity};

use super::transaction::LedgerTransaction;
use crate::error::LedgerResult;

impl LedgerTransaction<'_> {
    /// Apply one movement to a locked record.
    ///
    /// OUT fails with `InsufficientStock` if the working quantity would drop
    /// below zero. On failure nothing is staged and the caller is expected to
    /// abandon the transaction.
    pub fn apply(
        &mut self,
        key: StockKey,
        direction: Direction,
        amount: i64,
        reference: Reference,
        actor: Option<UserId>,
    ) -> LedgerResult<MovementId> {
        self.apply_draft(MovementDraft::new(key, direction, amount, reference, actor))
    }

    pub fn apply_draft(&mut self, draft: MovementDraft) -> LedgerResult<MovementId> {
        let current = self.quantity(draft.key).ok_or_else(|| {
            DomainError::invariant(format!(
                "record {} is not locked by this transaction",
                draft.key
            ))
        })?;

        let next = next_quantity(draft.key, current, draft.direction, draft.amount)?;
        self.working.insert(draft.key, next);

        tracing::debug!(
            key = %draft.key,
            direction = %draft.direction,
            amount = draft.amount,
            reference = %draft.reference,
            before = current,
            after = next,
            "movement staged"
        );

        let id = draft.id;
        self.drafts.push(draft);
        Ok(id)
    }
}

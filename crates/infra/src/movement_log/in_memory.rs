use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use stockledger_inventory::{Movement, MovementDraft, Reference, StockKey};

use super::r#trait::{MovementLog, MovementLogError};

#[derive(Debug, Default)]
struct LogState {
    movements: Vec<Movement>,
    by_record: HashMap<StockKey, Vec<usize>>,
    by_reference: HashMap<Reference, Vec<usize>>,
    last_created_at: Option<DateTime<Utc>>,
}

/// In-memory movement log with per-record and per-reference indexes.
#[derive(Debug, Default)]
pub struct InMemoryMovementLog {
    state: RwLock<LogState>,
}

impl InMemoryMovementLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.state.read().movements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MovementLog for InMemoryMovementLog {
    fn append(&self, drafts: Vec<MovementDraft>) -> Result<Vec<Movement>, MovementLogError> {
        if drafts.is_empty() {
            return Ok(vec![]);
        }

        // Validate the whole batch before touching state.
        for (idx, d) in drafts.iter().enumerate() {
            if d.amount <= 0 {
                return Err(MovementLogError::InvalidAppend(format!(
                    "non-positive amount {} (index {idx})",
                    d.amount
                )));
            }
        }

        let mut state = self.state.write();

        // Clock may step backwards; created_at must not.
        let now = Utc::now();
        let created_at = match state.last_created_at {
            Some(last) if last > now => last,
            _ => now,
        };

        let mut next = state.movements.len() as u64 + 1;
        let mut committed = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let movement = draft.commit(next, created_at);
            next += 1;

            let idx = state.movements.len();
            state.by_record.entry(movement.key()).or_default().push(idx);
            state
                .by_reference
                .entry(movement.reference.clone())
                .or_default()
                .push(idx);
            state.movements.push(movement.clone());
            committed.push(movement);
        }
        state.last_created_at = Some(created_at);

        Ok(committed)
    }

    fn for_record(&self, key: StockKey) -> Result<Vec<Movement>, MovementLogError> {
        let state = self.state.read();
        Ok(state
            .by_record
            .get(&key)
            .map(|idxs| idxs.iter().map(|&i| state.movements[i].clone()).collect())
            .unwrap_or_default())
    }

    fn by_reference(&self, reference: &Reference) -> Result<Vec<Movement>, MovementLogError> {
        let state = self.state.read();
        Ok(state
            .by_reference
            .get(reference)
            .map(|idxs| idxs.iter().map(|&i| state.movements[i].clone()).collect())
            .unwrap_or_default())
    }

    fn recent(&self, limit: usize) -> Result<Vec<Movement>, MovementLogError> {
        let state = self.state.read();
        Ok(state.movements.iter().rev().take(limit).cloned().collect())
    }

    fn all(&self) -> Result<Vec<Movement>, MovementLogError> {
        let state = self.state.read();
        Ok(state.movements.clone())
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stockledger_core::{DomainError, DomainResult, ProductId, UserId, WarehouseId};

use crate::stock::StockKey;

/// Movement identifier (UUIDv7, time-ordered).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MovementId(pub Uuid);

impl MovementId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for MovementId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for MovementId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Identifier of a warehouse-to-warehouse transfer. Transfers are not stored as
/// entities; the id only ties the two legs together through their references.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransferId(pub Uuid);

impl TransferId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for TransferId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for TransferId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Direction of a quantity change.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "IN")]
    In,
    #[serde(rename = "OUT")]
    Out,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::In => "IN",
            Direction::Out => "OUT",
        }
    }
}

impl core::fmt::Display for Direction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Causal pointer linking a movement to the business event that produced it.
///
/// Orchestrated events use fixed prefixes (`PUR-`, `SALE-`, `TRANSFER-OUT:`,
/// `TRANSFER-IN:`); manual movements carry caller text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Reference(String);

impl Reference {
    pub fn purchase(purchase_id: impl core::fmt::Display) -> Self {
        Self(format!("PUR-{purchase_id}"))
    }

    pub fn sale(sale_id: impl core::fmt::Display) -> Self {
        Self(format!("SALE-{sale_id}"))
    }

    pub fn transfer_out(transfer_id: TransferId) -> Self {
        Self(format!("TRANSFER-OUT:{transfer_id}"))
    }

    pub fn transfer_in(transfer_id: TransferId) -> Self {
        Self(format!("TRANSFER-IN:{transfer_id}"))
    }

    /// Free-text reference for manual movements. Must not be blank.
    pub fn manual(text: impl Into<String>) -> DomainResult<Self> {
        let text = text.into();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("movement reference cannot be empty"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Reference {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A movement that has been applied inside a transaction but not yet committed.
///
/// The movement log assigns `sequence` and `created_at` when it appends it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementDraft {
    pub id: MovementId,
    pub key: StockKey,
    pub direction: Direction,
    pub amount: i64,
    pub reference: Reference,
    pub actor: Option<UserId>,
    pub notes: Option<String>,
}

impl MovementDraft {
    pub fn new(
        key: StockKey,
        direction: Direction,
        amount: i64,
        reference: Reference,
        actor: Option<UserId>,
    ) -> Self {
        Self {
            id: MovementId::new(),
            key,
            direction,
            amount,
            reference,
            actor,
            notes: None,
        }
    }

    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes.filter(|n| !n.trim().is_empty());
        self
    }

    /// Finalize into an immutable movement at a log position.
    pub fn commit(self, sequence: u64, created_at: DateTime<Utc>) -> Movement {
        Movement {
            id: self.id,
            sequence,
            product_id: self.key.product_id,
            warehouse_id: self.key.warehouse_id,
            direction: self.direction,
            amount: self.amount,
            reference: self.reference,
            actor: self.actor,
            created_at,
            notes: self.notes,
        }
    }
}

/// Immutable audit entry describing one quantity change and its cause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    pub id: MovementId,
    /// Global commit position, strictly increasing.
    pub sequence: u64,
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub direction: Direction,
    pub amount: i64,
    pub reference: Reference,
    pub actor: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub notes: Option<String>,
}

impl Movement {
    pub fn key(&self) -> StockKey {
        StockKey::new(self.product_id, self.warehouse_id)
    }

    /// `+amount` for IN, `-amount` for OUT.
    pub fn signed_amount(&self) -> i64 {
        match self.direction {
            Direction::In => self.amount,
            Direction::Out => -self.amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> StockKey {
        StockKey::new(ProductId::new(), WarehouseId::new())
    }

    #[test]
    fn references_use_the_causal_prefixes() {
        let transfer_id = TransferId::new();
        assert_eq!(Reference::purchase(42).as_str(), "PUR-42");
        assert_eq!(Reference::sale(7).as_str(), "SALE-7");
        assert_eq!(
            Reference::transfer_out(transfer_id).to_string(),
            format!("TRANSFER-OUT:{transfer_id}")
        );
        assert_eq!(
            Reference::transfer_in(transfer_id).to_string(),
            format!("TRANSFER-IN:{transfer_id}")
        );
    }

    #[test]
    fn manual_reference_is_trimmed_and_cannot_be_blank() {
        assert_eq!(Reference::manual("  cycle count ").unwrap().as_str(), "cycle count");
        match Reference::manual("   ") {
            Err(DomainError::Validation(_)) => {}
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn direction_serializes_as_in_out() {
        assert_eq!(serde_json::to_string(&Direction::In).unwrap(), "\"IN\"");
        assert_eq!(serde_json::to_string(&Direction::Out).unwrap(), "\"OUT\"");
        let parsed: Direction = serde_json::from_str("\"OUT\"").unwrap();
        assert_eq!(parsed, Direction::Out);
    }

    #[test]
    fn commit_keeps_draft_fields_and_sets_position() {
        let key = key();
        let actor = UserId::new();
        let draft = MovementDraft::new(key, Direction::Out, 3, Reference::sale(1), Some(actor))
            .with_notes(Some("damaged box".to_string()));
        let draft_id = draft.id;
        let now = Utc::now();

        let movement = draft.commit(17, now);
        assert_eq!(movement.id, draft_id);
        assert_eq!(movement.sequence, 17);
        assert_eq!(movement.key(), key);
        assert_eq!(movement.signed_amount(), -3);
        assert_eq!(movement.actor, Some(actor));
        assert_eq!(movement.created_at, now);
        assert_eq!(movement.notes.as_deref(), Some("damaged box"));
    }

    #[test]
    fn blank_notes_are_dropped() {
        let draft = MovementDraft::new(key(), Direction::In, 1, Reference::purchase(1), None)
            .with_notes(Some("  ".to_string()));
        assert_eq!(draft.notes, None);
    }
}

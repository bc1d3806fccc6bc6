//! Movement inspection queries: filter + pagination.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{ProductId, WarehouseId};
use stockledger_inventory::{Direction, Movement};

pub const DEFAULT_PAGE_LIMIT: usize = 50;
pub const MAX_PAGE_LIMIT: usize = 1000;

/// Pagination parameters for movement queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub limit: usize,
    pub offset: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
        }
    }
}

impl Pagination {
    pub fn new(limit: Option<usize>, offset: Option<usize>) -> Self {
        Self {
            limit: limit.unwrap_or(DEFAULT_PAGE_LIMIT).min(MAX_PAGE_LIMIT),
            offset: offset.unwrap_or(0),
        }
    }
}

/// Filter criteria; `None` fields match everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MovementFilter {
    pub product_id: Option<ProductId>,
    pub warehouse_id: Option<WarehouseId>,
    pub direction: Option<Direction>,
    /// Matches references starting with this text (e.g. `"SALE-"`).
    pub reference_prefix: Option<String>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
}

impl MovementFilter {
    pub fn matches(&self, movement: &Movement) -> bool {
        self.product_id.is_none_or(|p| p == movement.product_id)
            && self.warehouse_id.is_none_or(|w| w == movement.warehouse_id)
            && self.direction.is_none_or(|d| d == movement.direction)
            && self
                .reference_prefix
                .as_deref()
                .is_none_or(|prefix| movement.reference.as_str().starts_with(prefix))
            && self.created_after.is_none_or(|t| movement.created_at > t)
            && self.created_before.is_none_or(|t| movement.created_at < t)
    }
}

/// One page of a movement query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovementPage {
    pub movements: Vec<Movement>,
    /// Number of matching movements across all pages.
    pub total: usize,
    pub pagination: Pagination,
    pub has_more: bool,
}

impl MovementPage {
    pub(crate) fn slice(matching: Vec<Movement>, pagination: Pagination) -> Self {
        let total = matching.len();
        let movements: Vec<Movement> = matching
            .into_iter()
            .skip(pagination.offset)
            .take(pagination.limit)
            .collect();
        let has_more = pagination.offset + movements.len() < total;
        Self {
            movements,
            total,
            pagination,
            has_more,
        }
    }
}

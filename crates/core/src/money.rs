//! Monetary amounts and submitted-total reconciliation.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Largest accepted difference between a submitted total and the computed one
/// (one cent in a two-decimal currency).
pub const DEFAULT_TOTAL_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Monetary amount in the single operating currency (no conversion).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// `unit_price × quantity`, used for line subtotals.
    pub fn times(&self, quantity: i64) -> DomainResult<Self> {
        self.0
            .checked_mul(Decimal::from(quantity))
            .map(Self)
            .ok_or_else(|| DomainError::invalid_amount(format!("{self} x {quantity} overflows")))
    }

    pub fn checked_add(self, rhs: Money) -> DomainResult<Self> {
        self.0
            .checked_add(rhs.0)
            .map(Self)
            .ok_or_else(|| DomainError::invalid_amount("money total overflow"))
    }

    /// Sum of `amounts`, failing instead of wrapping past the decimal range.
    pub fn checked_sum<I>(amounts: I) -> DomainResult<Self>
    where
        I: IntoIterator<Item = DomainResult<Money>>,
    {
        amounts
            .into_iter()
            .try_fold(Money::ZERO, |total, amount| total.checked_add(amount?))
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

/// Check a caller-submitted total against the server-computed one.
///
/// The computed value is authoritative; the submitted one is accepted only when it
/// lies within `tolerance` of it.
pub fn reconcile_total(computed: Money, submitted: Money, tolerance: Decimal) -> DomainResult<()> {
    let within = computed
        .0
        .checked_sub(submitted.0)
        .is_some_and(|diff| diff.abs() <= tolerance);
    if !within {
        return Err(DomainError::total_mismatch(computed.0, submitted.0));
    }
    Ok(())
}

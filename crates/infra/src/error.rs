//! Ledger-level error type.
//!
//! Wraps deterministic domain failures and movement-log (storage) failures, and
//! classifies them for callers (`kind()`, `is_retryable()`).

use thiserror::Error;

use stockledger_core::DomainError;

use crate::movement_log::MovementLogError;

pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("movement log: {0}")]
    Log(#[from] MovementLogError),
}

/// Coarse error classification for the API layer (status-code mapping).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InsufficientStock,
    InvalidAmount,
    NotFound,
    TotalMismatch,
    Conflict,
    Validation,
    Internal,
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Domain(e) => match e {
                DomainError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
                DomainError::InvalidAmount(_) => ErrorKind::InvalidAmount,
                DomainError::NotFound(_) => ErrorKind::NotFound,
                DomainError::TotalMismatch { .. } => ErrorKind::TotalMismatch,
                DomainError::Conflict(_) => ErrorKind::Conflict,
                DomainError::Validation(_) | DomainError::InvalidId(_) => ErrorKind::Validation,
                DomainError::InvariantViolation(_) => ErrorKind::Internal,
            },
            LedgerError::Log(_) => ErrorKind::Internal,
        }
    }

    /// Conflicts may succeed on retry; every other failure is final for the same input.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }

    pub fn domain(&self) -> Option<&DomainError> {
        match self {
            LedgerError::Domain(e) => Some(e),
            LedgerError::Log(_) => None,
        }
    }
}

//! Runtime configuration for the ledger, read from `STOCKLEDGER_*` environment
//! variables with safe defaults.

use std::time::Duration;

use rust_decimal::Decimal;
use thiserror::Error;

use stockledger_core::DEFAULT_TOTAL_TOLERANCE;

use crate::retry::RetryPolicy;

pub const LOCK_TIMEOUT_ENV: &str = "STOCKLEDGER_LOCK_TIMEOUT_MS";
pub const CONFLICT_RETRIES_ENV: &str = "STOCKLEDGER_CONFLICT_RETRIES";
pub const RETRY_BASE_DELAY_ENV: &str = "STOCKLEDGER_RETRY_BASE_DELAY_MS";
pub const RECENT_MOVEMENTS_LIMIT_ENV: &str = "STOCKLEDGER_RECENT_MOVEMENTS_LIMIT";
pub const TOTAL_TOLERANCE_ENV: &str = "STOCKLEDGER_TOTAL_TOLERANCE";

/// Upper bound for the recent-movements listing.
pub const MAX_RECENT_MOVEMENTS: usize = 1000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LedgerConfig {
    /// How long a transaction waits for all of its record locks.
    pub lock_timeout: Duration,
    /// Retries after a `Conflict` before giving up.
    pub conflict_retries: u32,
    pub retry_base_delay: Duration,
    /// Default (and maximum) size of the recent-movements listing.
    pub recent_movements_limit: usize,
    /// Allowed difference between a submitted and a computed total.
    pub total_tolerance: Decimal,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_millis(2000),
            conflict_retries: 3,
            retry_base_delay: Duration::from_millis(10),
            recent_movements_limit: 100,
            total_tolerance: DEFAULT_TOTAL_TOLERANCE,
        }
    }
}

impl LedgerConfig {
    /// Read configuration from the process environment.
    ///
    /// Unset variables fall back to defaults; malformed ones are an error.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let lock_timeout = parse_u64(&lookup, LOCK_TIMEOUT_ENV)?
            .map(Duration::from_millis)
            .unwrap_or(defaults.lock_timeout);
        if lock_timeout.is_zero() {
            return Err(invalid(LOCK_TIMEOUT_ENV, "0", "must be greater than zero"));
        }

        let conflict_retries = match parse_u64(&lookup, CONFLICT_RETRIES_ENV)? {
            Some(n) => u32::try_from(n)
                .map_err(|_| invalid(CONFLICT_RETRIES_ENV, &n.to_string(), "out of range"))?,
            None => defaults.conflict_retries,
        };

        let retry_base_delay = parse_u64(&lookup, RETRY_BASE_DELAY_ENV)?
            .map(Duration::from_millis)
            .unwrap_or(defaults.retry_base_delay);

        let recent_movements_limit = match parse_u64(&lookup, RECENT_MOVEMENTS_LIMIT_ENV)? {
            Some(0) => return Err(invalid(RECENT_MOVEMENTS_LIMIT_ENV, "0", "must be at least 1")),
            Some(n) => {
                let capped = (n as usize).min(MAX_RECENT_MOVEMENTS);
                if capped as u64 != n {
                    tracing::warn!(
                        requested = n,
                        capped,
                        "{RECENT_MOVEMENTS_LIMIT_ENV} above maximum; capping"
                    );
                }
                capped
            }
            None => defaults.recent_movements_limit,
        };

        let total_tolerance = match lookup(TOTAL_TOLERANCE_ENV) {
            Some(raw) => {
                let value: Decimal = raw
                    .trim()
                    .parse()
                    .map_err(|e| invalid(TOTAL_TOLERANCE_ENV, &raw, &format!("{e}")))?;
                if value.is_sign_negative() {
                    return Err(invalid(TOTAL_TOLERANCE_ENV, &raw, "must not be negative"));
                }
                value
            }
            None => defaults.total_tolerance,
        };

        Ok(Self {
            lock_timeout,
            conflict_retries,
            retry_base_delay,
            recent_movements_limit,
            total_tolerance,
        })
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn with_conflict_retries(mut self, retries: u32) -> Self {
        self.conflict_retries = retries;
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        if self.conflict_retries == 0 {
            return RetryPolicy::no_retry();
        }
        RetryPolicy::exponential(
            self.conflict_retries,
            self.retry_base_delay,
            self.retry_base_delay.saturating_mul(16),
        )
    }
}

fn invalid(key: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_u64(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<u64>, ConfigError> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|e| invalid(key, &raw, &e.to_string())),
        None => Ok(None),
    }
}

//! Bounded retries for hardware access.
//!
//! A hardware operation gets one attempt plus `retries` more, and gives up
//! early once it has run longer than the operation timeout.

use std::time::Instant;

use tracing::debug;

use crate::config::RetryPolicy;
use crate::error::{PmdError, PmdResult};

/// Retry accounting for one operation.
#[derive(Debug)]
pub struct RetryBudget {
    policy: RetryPolicy,
    used: u32,
    started: Instant,
}

impl RetryBudget {
    pub fn new(policy: &RetryPolicy) -> Self {
        Self {
            policy: *policy,
            used: 0,
            started: Instant::now(),
        }
    }

    /// Consumes one retry after `err`.
    ///
    /// Returns the retry number, or the error to report when the operation
    /// must give up: `err` itself when it is not retryable or retries are
    /// exhausted, `Timeout` when the wall-clock budget is spent.
    pub fn retry(&mut self, what: &str, err: PmdError) -> PmdResult<u32> {
        if !err.is_retryable() || self.used >= self.policy.retries {
            return Err(err);
        }

        let elapsed = self.started.elapsed();
        if elapsed >= self.policy.operation_timeout {
            return Err(PmdError::Timeout {
                device: what.to_string(),
                elapsed,
            });
        }

        self.used += 1;
        debug!(
            op = what,
            retry = self.used,
            error = %err,
            "Retrying hardware access"
        );
        Ok(self.used)
    }

    pub fn used(&self) -> u32 {
        self.used
    }
}

/// Runs `op` until it succeeds or its retry budget is spent.
pub fn with_retries<T>(
    policy: &RetryPolicy,
    what: &str,
    mut op: impl FnMut() -> PmdResult<T>,
) -> PmdResult<T> {
    let mut budget = RetryBudget::new(policy);
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(err) => {
                budget.retry(what, err)?;
            }
        }
    }
}

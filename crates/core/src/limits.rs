//! Cooperative cancellation and work budgets.

use crate::error::{PdfError, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared flag a caller can set to stop a running invocation.
///
/// Cloning yields a handle to the same flag. The core polls it between pages
/// and periodically while materializing objects; a cancelled run fails with
/// [`PdfError::ResourceLimitExceeded`].
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Polls an optional token every `checkpoint_interval` units of work.
#[derive(Debug)]
pub struct Budget {
    token: Option<CancellationToken>,
    checkpoint_interval: usize,
    ops: usize,
}

impl Budget {
    pub fn new(token: Option<CancellationToken>, checkpoint_interval: usize) -> Self {
        Self {
            token,
            checkpoint_interval: checkpoint_interval.max(1),
            ops: 0,
        }
    }

    /// Count one unit of work, failing if cancellation was requested.
    pub fn tick(&mut self) -> Result<()> {
        self.ops += 1;
        if self.ops.is_multiple_of(self.checkpoint_interval) {
            self.check()?;
        }
        Ok(())
    }

    /// Check the token now.
    pub fn check(&self) -> Result<()> {
        match &self.token {
            Some(token) if token.is_cancelled() => {
                Err(PdfError::ResourceLimitExceeded("cancelled".into()))
            }
            _ => Ok(()),
        }
    }
}

/// Fail with [`PdfError::ResourceLimitExceeded`] when `value > limit`.
pub fn ensure_within(what: &str, value: usize, limit: usize) -> Result<()> {
    if value > limit {
        return Err(PdfError::ResourceLimitExceeded(format!(
            "{what}: {value} exceeds limit {limit}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelled_token_trips_budget() {
        let token = CancellationToken::new();
        let mut budget = Budget::new(Some(token.clone()), 4);
        for _ in 0..8 {
            budget.tick().unwrap();
        }
        token.cancel();
        let err = (0..4).try_for_each(|_| budget.tick()).unwrap_err();
        assert!(err.kind().is_resource_limit());
    }

    #[test]
    fn budget_without_token_never_fails() {
        let mut budget = Budget::new(None, 1);
        assert!((0..100).try_for_each(|_| budget.tick()).is_ok());
    }

    #[test]
    fn ensure_within_boundary() {
        assert!(ensure_within("objects", 10, 10).is_ok());
        assert!(ensure_within("objects", 11, 10).is_err());
    }
}

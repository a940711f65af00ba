//! Session-scoped memory accounting for chunk payloads.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{CursorError, Result};

#[derive(Debug)]
struct BudgetInner {
    limit: u64,
    used: AtomicU64,
}

/// Byte counter shared by every downloader of a session.
///
/// Cloning is cheap and yields a handle to the same counter. The counter
/// never goes negative: uncharging more than is held saturates at zero.
#[derive(Debug, Clone)]
pub struct MemoryBudget {
    inner: Arc<BudgetInner>,
}

impl MemoryBudget {
    #[must_use]
    pub fn new(limit: u64) -> Self {
        Self {
            inner: Arc::new(BudgetInner {
                limit,
                used: AtomicU64::new(0),
            }),
        }
    }

    /// Configured byte limit.
    #[must_use]
    pub fn limit(&self) -> u64 {
        self.inner.limit
    }

    /// Bytes currently charged.
    #[must_use]
    pub fn current_usage(&self) -> u64 {
        self.inner.used.load(Ordering::Acquire)
    }

    /// Bytes that can still be charged without exceeding the limit.
    #[must_use]
    pub fn headroom(&self) -> u64 {
        self.inner.limit.saturating_sub(self.current_usage())
    }

    /// Charge `bytes` if the limit allows it.
    ///
    /// A zero-byte charge always succeeds.
    pub fn try_charge(&self, bytes: u64) -> Result<()> {
        self.inner
            .used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                let next = used.checked_add(bytes)?;
                (bytes == 0 || next <= self.inner.limit).then_some(next)
            })
            .map(|_| ())
            .map_err(|used| {
                CursorError::memory_budget_exceeded(bytes, self.inner.limit.saturating_sub(used))
            })
    }

    /// Charge `bytes` regardless of the limit.
    pub fn charge(&self, bytes: u64) {
        let _ = self
            .inner
            .used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                Some(used.saturating_add(bytes))
            });
    }

    /// Return `bytes` to the budget.
    pub fn uncharge(&self, bytes: u64) {
        let _ = self
            .inner
            .used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                Some(used.saturating_sub(bytes))
            });
    }

    /// Replace a charge of `from` bytes with one of `to` bytes.
    pub fn adjust(&self, from: u64, to: u64) {
        if to >= from {
            self.charge(to - from);
        } else {
            self.uncharge(from - to);
        }
    }
}

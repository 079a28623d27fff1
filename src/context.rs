//! Shared conversion state
//!
//! One [`ConversionContext`] exists per registered device. Every open file
//! sees the same instance, and the last successful write wins. The result
//! text and both counters sit behind a single mutex so a reader never
//! observes half of a write and counter updates cannot be lost.

use crate::token::ResultText;
use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Placeholder returned by reads before the first write
pub const DEFAULT_PLACEHOLDER: &str = "None";

/// Operation counters at a point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConversionStats {
    /// Successful reads since the device was registered
    pub reads: u64,
    /// Successful writes since the device was registered
    pub writes: u64,
}

#[derive(Debug)]
pub(crate) struct ContextState {
    pub(crate) last_result: ResultText,
    pub(crate) stats: ConversionStats,
}

/// Last converted value plus read/write counters
#[derive(Debug)]
pub struct ConversionContext {
    state: Mutex<ContextState>,
}

impl ConversionContext {
    /// Create a context whose result buffer starts out holding `initial`
    pub fn new(initial: ResultText) -> Self {
        Self {
            state: Mutex::new(ContextState {
                last_result: initial,
                stats: ConversionStats::default(),
            }),
        }
    }

    /// Context seeded with the `"None"` placeholder
    pub fn with_placeholder() -> Self {
        Self::new(ResultText::truncating(DEFAULT_PLACEHOLDER.as_bytes()))
    }

    /// Current result text
    pub fn last_result(&self) -> ResultText {
        self.lock().last_result
    }

    /// Snapshot of both counters, taken under the lock
    pub fn stats(&self) -> ConversionStats {
        self.lock().stats
    }

    /// Replace the result and count a successful write in one critical section
    pub(crate) fn commit_write(&self, result: ResultText) -> ConversionStats {
        let mut state = self.lock();
        state.last_result = result;
        state.stats.writes += 1;
        state.stats
    }

    /// Every commit is a pair of plain stores, so a panic while the lock is
    /// held cannot leave the state half-updated and poisoning is ignored.
    pub(crate) fn lock(&self) -> MutexGuard<'_, ContextState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ConversionContext {
    fn default() -> Self {
        Self::with_placeholder()
    }
}

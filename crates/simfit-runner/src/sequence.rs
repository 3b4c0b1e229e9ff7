//! Run identifier allocation.

use std::sync::atomic::{AtomicU64, Ordering};

/// Strictly increasing run id generator owned by a dispatcher.
///
/// An id is reserved before its simulator process is launched and is
/// consumed whether or not the run succeeds, so result files map 1:1 to ids.
#[derive(Debug)]
pub struct RunIdSequence {
    next: AtomicU64,
}

impl RunIdSequence {
    /// Sequence starting at 1.
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Sequence starting at `first` (e.g. to resume after earlier runs).
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first.max(1)),
        }
    }

    /// Reserve the next id.
    pub fn reserve(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }

    /// The id the next `reserve` call will return.
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::SeqCst)
    }
}

impl Default for RunIdSequence {
    fn default() -> Self {
        Self::new()
    }
}

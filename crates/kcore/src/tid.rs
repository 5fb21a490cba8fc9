//! Thread identifier allocation.

use crate::priority::ThreadId;
use crate::sync::Mutex;

/// Hands out strictly increasing thread ids starting at 1.
///
/// The counter sits behind a lock so ids stay unique even when creation is
/// reached from several kernel paths.
pub struct TidAllocator {
    next: Mutex<i32>,
}

impl TidAllocator {
    pub const fn new() -> Self {
        Self {
            next: Mutex::new(1),
        }
    }

    /// Returns the next unused id.
    ///
    /// # Panics
    ///
    /// Panics when the id space is exhausted.
    pub fn allocate(&self) -> ThreadId {
        let mut next = self.next.lock();
        let tid = *next;
        assert!(tid < i32::MAX, "thread id space exhausted");
        *next += 1;
        ThreadId(tid)
    }

    /// The id the next call to [`allocate`](Self::allocate) will return.
    pub fn peek(&self) -> ThreadId {
        ThreadId(*self.next.lock())
    }
}

impl Default for TidAllocator {
    fn default() -> Self {
        Self::new()
    }
}

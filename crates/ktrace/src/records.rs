//! Canonical record identifiers for scheduler trace streams.
//!
//! Thread ids travel as 4-byte little-endian integers; priorities and nice
//! values as single bytes.

/// Dispatch related record identifiers.
pub mod sched {
    /// Context switch. Payload: previous tid, next tid.
    pub const NEXT: u8 = 52;
    /// Dispatch fell back to the idle thread. Payload: idle tid.
    pub const IDLE: u8 = 53;
}

/// Thread lifecycle record identifiers.
pub mod thread {
    /// Thread created and made ready. Payload: tid, priority.
    pub const CREATE: u8 = 70;
    /// Blocked thread made ready. Payload: tid.
    pub const UNBLOCK: u8 = 71;
    /// Running thread blocked. Payload: tid.
    pub const BLOCK: u8 = 72;
    /// Running thread gave up the processor. Payload: tid.
    pub const YIELD: u8 = 73;
    /// Running thread exited. Payload: tid.
    pub const EXIT: u8 = 74;
    /// Storage of a dead thread released. Payload: tid.
    pub const RECLAIM: u8 = 75;
    /// Sleep countdown expired. Payload: tid.
    pub const WAKE: u8 = 76;
}

/// Priority bookkeeping record identifiers.
pub mod prio {
    /// Base or effective priority changed. Payload: tid, base, effective.
    pub const CHANGE: u8 = 80;
    /// Nice value changed. Payload: tid, nice.
    pub const NICE: u8 = 81;
    /// Load average recomputed. Payload: `round(100 * load_avg)` as i32.
    pub const LOAD_AVG: u8 = 82;
}

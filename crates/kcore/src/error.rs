//! Recoverable scheduler errors.
//!
//! Only thread creation can fail at runtime. Everything else the scheduler
//! rejects is an invariant violation and halts with a panic.

use core::fmt;

/// Result alias used across the scheduler crates.
pub type SchedResult<T> = Result<T, SchedError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedError {
    /// The thread control block or its stack could not be allocated.
    ResourceExhausted,
    /// The configured thread cap has been reached.
    ThreadLimit(usize),
    /// A raw priority value fell outside `[PRI_MIN, PRI_MAX]`.
    PriorityOutOfRange(i32),
    /// A raw nice value fell outside `[-20, 20]`.
    NiceOutOfRange(i32),
}

impl SchedError {
    /// True when the error stems from running out of memory or thread slots.
    pub fn is_exhaustion(&self) -> bool {
        matches!(self, Self::ResourceExhausted | Self::ThreadLimit(_))
    }
}

impl fmt::Display for SchedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResourceExhausted => write!(f, "out of memory for thread allocation"),
            Self::ThreadLimit(max) => write!(f, "thread limit of {max} reached"),
            Self::PriorityOutOfRange(value) => {
                write!(f, "priority {value} outside supported range 0..=63")
            }
            Self::NiceOutOfRange(value) => {
                write!(f, "nice value {value} outside supported range -20..=20")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for SchedError {}

//! Priority levels, thread identifiers and niceness.

use core::fmt;

use crate::error::{SchedError, SchedResult};

/// Scheduling priority of a thread.
///
/// Higher values run first. The range is fixed at `[MIN, MAX]`; constructing
/// a value outside it is a programming error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority(u8);

impl Priority {
    /// Lowest priority, used by the idle thread.
    pub const MIN: Self = Self(0);
    /// Priority of the boot thread and the usual default for new threads.
    pub const DEFAULT: Self = Self(31);
    /// Highest priority.
    pub const MAX: Self = Self(63);

    /// Creates a priority.
    ///
    /// # Panics
    ///
    /// Panics if `value` exceeds [`Priority::MAX`].
    pub const fn new(value: u8) -> Self {
        assert!(value <= Self::MAX.0, "priority out of range");
        Self(value)
    }

    /// Creates a priority from an unchecked integer.
    pub fn try_new(value: i32) -> SchedResult<Self> {
        if (Self::MIN.0 as i32..=Self::MAX.0 as i32).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(SchedError::PriorityOutOfRange(value))
        }
    }

    /// Clamps an integer into the priority range.
    pub const fn clamped(value: i32) -> Self {
        if value < Self::MIN.0 as i32 {
            Self::MIN
        } else if value > Self::MAX.0 as i32 {
            Self::MAX
        } else {
            Self(value as u8)
        }
    }

    /// Returns the raw priority value.
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Thread identifier.
///
/// Identifiers are handed out by [`crate::TidAllocator`] starting at 1 and
/// are never reused within a run. [`ThreadId::ERROR`] is reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(pub i32);

impl ThreadId {
    /// Sentinel reported when thread creation fails.
    pub const ERROR: Self = Self(-1);

    /// Collapses a creation result into the sentinel form.
    pub fn from_result<E>(result: Result<Self, E>) -> Self {
        result.unwrap_or(Self::ERROR)
    }

    pub const fn is_error(self) -> bool {
        self.0 == Self::ERROR.0
    }

    /// Little-endian encoding used in trace payloads.
    pub const fn to_le_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tid {}", self.0)
    }
}

/// MLFQS niceness in `[MIN, MAX]`. Higher values yield CPU to others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Nice(i8);

impl Nice {
    pub const MIN: Self = Self(-20);
    pub const ZERO: Self = Self(0);
    pub const MAX: Self = Self(20);

    /// Creates a niceness value.
    ///
    /// # Panics
    ///
    /// Panics if `value` lies outside `[-20, 20]`.
    pub const fn new(value: i8) -> Self {
        assert!(
            value >= Self::MIN.0 && value <= Self::MAX.0,
            "nice value out of range"
        );
        Self(value)
    }

    pub fn try_new(value: i32) -> SchedResult<Self> {
        if (Self::MIN.0 as i32..=Self::MAX.0 as i32).contains(&value) {
            Ok(Self(value as i8))
        } else {
            Err(SchedError::NiceOutOfRange(value))
        }
    }

    pub const fn get(self) -> i32 {
        self.0 as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_bounds() {
        assert_eq!(Priority::MIN.get(), 0);
        assert_eq!(Priority::DEFAULT.get(), 31);
        assert_eq!(Priority::MAX.get(), 63);
        assert!(Priority::new(40) > Priority::new(39));
    }

    #[test]
    fn priority_try_new_rejects_out_of_range() {
        assert_eq!(Priority::try_new(63), Ok(Priority::MAX));
        assert_eq!(
            Priority::try_new(64),
            Err(SchedError::PriorityOutOfRange(64))
        );
        assert_eq!(
            Priority::try_new(-1),
            Err(SchedError::PriorityOutOfRange(-1))
        );
    }

    #[test]
    fn priority_clamps() {
        assert_eq!(Priority::clamped(-17), Priority::MIN);
        assert_eq!(Priority::clamped(99), Priority::MAX);
        assert_eq!(Priority::clamped(12), Priority::new(12));
    }

    #[test]
    #[should_panic(expected = "priority out of range")]
    fn priority_new_panics_above_max() {
        let _ = Priority::new(64);
    }

    #[test]
    fn thread_id_sentinel() {
        let failed: Result<ThreadId, SchedError> = Err(SchedError::ResourceExhausted);
        assert_eq!(ThreadId::from_result(failed), ThreadId::ERROR);
        assert!(ThreadId::ERROR.is_error());
        assert_eq!(ThreadId::from_result::<SchedError>(Ok(ThreadId(4))), ThreadId(4));
    }

    #[test]
    fn nice_range() {
        assert_eq!(Nice::try_new(20), Ok(Nice::MAX));
        assert_eq!(Nice::try_new(21), Err(SchedError::NiceOutOfRange(21)));
        assert_eq!(Nice::new(-5).get(), -5);
    }
}

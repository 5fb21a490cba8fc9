//! Interrupt level bookkeeping.
//!
//! All scheduler state is protected by one rule: it is only touched with
//! interrupts masked or from inside the timer interrupt handler. This
//! module tracks the mask level, whether an external interrupt is being
//! handled, and the two kinds of deferred reschedule requests.

/// Interrupt mask level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntrLevel {
    /// Interrupts are delivered.
    On,
    /// Interrupts are masked.
    Off,
}

#[derive(Debug)]
pub(crate) struct InterruptState {
    level: IntrLevel,
    in_external: bool,
    yield_on_return: bool,
    resched_pending: bool,
}

impl InterruptState {
    /// Boot state: interrupts masked, outside any handler.
    pub(crate) const fn new() -> Self {
        Self {
            level: IntrLevel::Off,
            in_external: false,
            yield_on_return: false,
            resched_pending: false,
        }
    }

    pub(crate) fn level(&self) -> IntrLevel {
        self.level
    }

    pub(crate) fn in_external(&self) -> bool {
        self.in_external
    }

    /// Masks interrupts, returning the previous level.
    pub(crate) fn disable(&mut self) -> IntrLevel {
        core::mem::replace(&mut self.level, IntrLevel::Off)
    }

    /// Restores a level saved by [`disable`](Self::disable).
    pub(crate) fn restore(&mut self, level: IntrLevel) {
        self.level = level;
    }

    pub(crate) fn enter_external(&mut self) {
        assert!(!self.in_external, "nested external interrupt");
        self.in_external = true;
        self.yield_on_return = false;
        self.level = IntrLevel::Off;
    }

    /// Leaves the handler with interrupts still masked and reports whether a
    /// yield was requested while inside it.
    pub(crate) fn leave_external(&mut self) -> bool {
        assert!(self.in_external, "not in an external interrupt");
        self.in_external = false;
        core::mem::take(&mut self.yield_on_return)
    }

    pub(crate) fn request_yield_on_return(&mut self) {
        assert!(self.in_external, "yield-on-return outside interrupt context");
        self.yield_on_return = true;
    }

    /// Asks for a reschedule once interrupts are unmasked again.
    pub(crate) fn request_resched(&mut self) {
        self.resched_pending = true;
    }

    pub(crate) fn take_resched(&mut self) -> bool {
        core::mem::take(&mut self.resched_pending)
    }

    /// A dispatch satisfies any outstanding reschedule request.
    pub(crate) fn clear_resched(&mut self) {
        self.resched_pending = false;
    }
}

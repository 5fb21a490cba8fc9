//! The context-switch capability.
//!
//! Register save/restore and first-run stack layout are platform business.
//! The scheduler only needs a narrow contract, expressed by
//! [`ContextSwitch`], and never looks at how a platform fulfils it.

use kcore::ThreadId;

use crate::thread::{AddressSpace, KernelStack};

/// Platform hooks the scheduler drives during dispatch.
pub trait ContextSwitch {
    /// Transfers control from `current` to `next`.
    ///
    /// Called with interrupts masked. Returns in the continuation of `next`,
    /// still masked, and yields the thread that was running immediately
    /// before control came back to this call site. The scheduler uses that
    /// value to release a dead predecessor.
    fn switch(&mut self, current: ThreadId, next: ThreadId) -> ThreadId;

    /// Lays out the frames a freshly created thread needs for its first
    /// dispatch.
    fn prepare(&mut self, _tid: ThreadId, _stack: &mut KernelStack) {}

    /// Activates the address space of a thread that was just marked
    /// running. Kernel-only threads pass `None`.
    fn activate(&mut self, _tid: ThreadId, _space: Option<AddressSpace>) {}
}

impl<T: ContextSwitch + ?Sized> ContextSwitch for alloc::boxed::Box<T> {
    fn switch(&mut self, current: ThreadId, next: ThreadId) -> ThreadId {
        (**self).switch(current, next)
    }

    fn prepare(&mut self, tid: ThreadId, stack: &mut KernelStack) {
        (**self).prepare(tid, stack)
    }

    fn activate(&mut self, tid: ThreadId, space: Option<AddressSpace>) {
        (**self).activate(tid, space)
    }
}

/// Switch for hosted builds, where every thread shares the caller's stack.
///
/// Control never actually leaves the caller: after `switch` returns, the
/// code that follows is taken to run on behalf of `next`, and the thread
/// that ran just before it is always `current`.
#[derive(Debug, Default)]
pub struct HostSwitch {
    switches: u64,
    last: Option<(ThreadId, ThreadId)>,
}

impl HostSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of switches performed.
    pub fn switches(&self) -> u64 {
        self.switches
    }

    /// The most recent `(from, to)` pair.
    pub fn last(&self) -> Option<(ThreadId, ThreadId)> {
        self.last
    }
}

impl ContextSwitch for HostSwitch {
    fn switch(&mut self, current: ThreadId, next: ThreadId) -> ThreadId {
        self.switches += 1;
        self.last = Some((current, next));
        current
    }
}

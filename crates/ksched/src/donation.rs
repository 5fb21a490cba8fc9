//! Priority mutation and the donation interface.
//!
//! The synchronization layer decides who donates to whom. This module only
//! stores what it is told and keeps the ready queue and the running thread
//! consistent with the result: a queued thread whose effective priority
//! changes is moved to its new band, and a thread that now outranks the
//! running one gets the processor at the next safe point.

use alloc::vec::Vec;

use kcore::{Priority, ThreadId};

use crate::scheduler::Scheduler;
use crate::switch::ContextSwitch;
use crate::thread::{ResourceId, Thread, ThreadStatus};

/// Which priority field a donation mutation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorityField {
    Base,
    Effective,
}

/// Applies a requested priority to a thread.
///
/// Without an active donation both fields take the value. While donated,
/// the `target` field alone changes.
fn apply(thread: &mut Thread, value: Priority, target: PriorityField) {
    if !thread.donated {
        thread.base_priority = value;
        thread.priority = value;
        return;
    }
    match target {
        PriorityField::Base => thread.base_priority = value,
        PriorityField::Effective => thread.priority = value,
    }
}

impl<S: ContextSwitch> Scheduler<S> {
    /// Effective priority of the running thread.
    pub fn get_priority(&self) -> Priority {
        self.current().priority()
    }

    /// Sets the running thread's priority. Ignored under MLFQS.
    ///
    /// While a donation is active a lower value only lands in the base
    /// priority, to take effect once the donation ends; an equal or higher
    /// value replaces the effective priority at once.
    pub fn set_priority(&mut self, value: Priority) {
        if self.config.mode.is_mlfqs() {
            return;
        }
        let old = self.intr.disable();
        let cur = self.current;
        let thread = self.registry.thread_mut(cur);
        let target = if thread.donated && value < thread.priority {
            PriorityField::Base
        } else {
            PriorityField::Effective
        };
        apply(thread, value, target);
        self.emit_priority(cur);
        log::debug!("{cur} set priority {value}");
        self.intr.restore(old);

        self.yield_if_outranked();
    }

    /// Sets a priority field of any registered thread. Ignored under MLFQS.
    ///
    /// Used by the synchronization layer to apply and revoke donations. A
    /// queued thread is re-queued under its new priority; if it or the head
    /// of the queue now outranks the running thread, the running thread
    /// gives way at the next safe point.
    pub fn set_other_priority(&mut self, tid: ThreadId, value: Priority, target: PriorityField) {
        if self.config.mode.is_mlfqs() {
            return;
        }
        let old = self.intr.disable();
        let thread = self.registry.thread_mut(tid);
        apply(thread, value, target);
        let status = thread.status();
        self.emit_priority(tid);
        log::debug!("{tid} {target:?} priority set to {value}");

        if status == ThreadStatus::Ready && self.ready.remove(tid) {
            self.ready.insert(tid, &self.registry);
        }
        self.intr.restore(old);

        if matches!(status, ThreadStatus::Ready | ThreadStatus::Running) && self.outranked() {
            self.request_preemption();
        }
    }

    /// Ends a donation, dropping `tid` back to its base priority.
    pub fn revoke_donation(&mut self, tid: ThreadId) {
        let base = self.registry.thread(tid).base_priority();
        self.set_donated(tid, false);
        self.set_other_priority(tid, base, PriorityField::Effective);
    }

    /// Effective priority of any thread.
    pub fn get_effective_priority(&self, tid: ThreadId) -> Priority {
        self.registry.thread(tid).priority()
    }

    pub fn get_base_priority(&self, tid: ThreadId) -> Priority {
        self.registry.thread(tid).base_priority()
    }

    pub fn is_donated(&self, tid: ThreadId) -> bool {
        self.registry.thread(tid).is_donated()
    }

    /// Marks whether `tid`'s effective priority reflects a donation.
    pub fn set_donated(&mut self, tid: ThreadId, donated: bool) {
        self.registry.thread_mut(tid).donated = donated;
    }

    pub fn held_resources(&self, tid: ThreadId) -> &[ResourceId] {
        self.registry.thread(tid).held_resources()
    }

    /// Resources owned by `tid`, for the synchronization layer to maintain.
    pub fn held_resources_mut(&mut self, tid: ThreadId) -> &mut Vec<ResourceId> {
        &mut self.registry.thread_mut(tid).held_resources
    }

    pub fn awaiting_resource(&self, tid: ThreadId) -> Option<ResourceId> {
        self.registry.thread(tid).awaiting_resource()
    }

    pub fn set_awaiting_resource(&mut self, tid: ThreadId, resource: Option<ResourceId>) {
        self.registry.thread_mut(tid).awaiting = resource;
    }
}

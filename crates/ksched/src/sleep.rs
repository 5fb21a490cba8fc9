//! Timed sleep.
//!
//! A sleeping thread is an ordinary blocked thread with a non-zero
//! countdown. The timer interrupt decrements every countdown once per tick
//! and readies the threads whose countdown reaches zero, in registration
//! order.

use crate::scheduler::{records::thread, Scheduler};
use crate::switch::ContextSwitch;
use crate::thread::ThreadStatus;

impl<S: ContextSwitch> Scheduler<S> {
    /// Blocks the running thread for `ticks` timer ticks. Non-positive
    /// durations return at once.
    pub fn sleep(&mut self, ticks: i64) {
        if ticks <= 0 {
            return;
        }
        assert!(!self.intr.in_external(), "sleep called from interrupt context");
        let old = self.intr.disable();
        let cur = self.current;
        self.registry.thread_mut(cur).sleep_ticks = ticks.unsigned_abs();
        self.block();
        self.intr.restore(old);
    }

    /// Advances every sleeper by one tick, readying those that are due.
    pub(crate) fn wake_sleepers(&mut self) {
        let mut i = 0;
        while i < self.registry.live_len() {
            let tid = self.registry.live()[i];
            i += 1;

            let t = self.registry.thread_mut(tid);
            if t.status() != ThreadStatus::Blocked || t.sleep_ticks == 0 {
                continue;
            }
            t.sleep_ticks -= 1;
            if t.sleep_ticks == 0 {
                self.unblock(tid);
                self.emit_tid(thread::WAKE, tid);
            }
        }
    }
}

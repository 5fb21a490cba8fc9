//! Multi-level feedback queue scheduling.
//!
//! Priorities are derived from recent CPU usage and niceness instead of
//! being assigned:
//!
//! ```text
//! load_avg   = (59/60) * load_avg + (1/60) * ready_threads      every second
//! recent_cpu = (2*load_avg)/(2*load_avg + 1) * recent_cpu + nice every second
//! priority   = PRI_MAX - round(recent_cpu / 4) - 2 * nice       every 4 ticks
//! ```
//!
//! The running thread also gains one unit of `recent_cpu` per tick. All of
//! this runs inside the timer interrupt over preallocated state.

use kcore::{Fixed, Nice, Priority};

use crate::scheduler::{records::prio, Scheduler};
use crate::switch::ContextSwitch;
use crate::thread::ThreadStatus;

/// One load-average step with `ready` runnable threads.
pub fn next_load_avg(load_avg: Fixed, ready: i32) -> Fixed {
    let decay = Fixed::from_int(59).div_int(60);
    let weight = Fixed::from_int(1).div_int(60);
    decay.mul_fixed(load_avg) + weight.mul_int(ready)
}

/// One `recent_cpu` decay step.
pub fn decay_recent_cpu(load_avg: Fixed, recent_cpu: Fixed, nice: Nice) -> Fixed {
    let twice = load_avg.mul_int(2);
    let coefficient = twice.div_fixed(twice.add_int(1));
    coefficient.mul_fixed(recent_cpu).add_int(nice.get())
}

/// Priority for the given usage and niceness, clamped to the valid range.
pub fn mlfqs_priority(recent_cpu: Fixed, nice: Nice) -> Priority {
    let max = i32::from(Priority::MAX.get());
    Priority::clamped(max - recent_cpu.div_int(4).to_int_nearest() - 2 * nice.get())
}

impl<S: ContextSwitch> Scheduler<S> {
    pub(crate) fn mlfqs_tick(&mut self) {
        let cur = self.current;
        if Some(cur) != self.idle {
            let thread = self.registry.thread_mut(cur);
            thread.recent_cpu = thread.recent_cpu.add_int(1);
        }

        if self.ticks % u64::from(self.config.timer_freq) == 0 {
            self.update_load_avg();
            self.decay_all_recent_cpu();
        }
        if self.ticks % u64::from(self.config.priority_period) == 0 {
            self.recompute_priorities();
        }
    }

    fn update_load_avg(&mut self) {
        let running = usize::from(Some(self.current) != self.idle);
        let ready = i32::try_from(self.ready.len() + running).unwrap_or(i32::MAX);
        self.load_avg = next_load_avg(self.load_avg, ready);
        self.emit(prio::LOAD_AVG, &self.get_load_avg().to_le_bytes());
    }

    fn decay_all_recent_cpu(&mut self) {
        let idle = self.idle;
        let load_avg = self.load_avg;
        self.registry.for_each_live_mut(|t| {
            if Some(t.tid()) != idle {
                t.recent_cpu = decay_recent_cpu(load_avg, t.recent_cpu, t.nice);
            }
        });
    }

    fn recompute_priorities(&mut self) {
        let idle = self.idle;
        self.registry.for_each_live_mut(|t| {
            if Some(t.tid()) != idle {
                let priority = mlfqs_priority(t.recent_cpu, t.nice);
                t.base_priority = priority;
                t.priority = priority;
            }
        });
        self.ready.resort(&self.registry);
        if self.outranked() {
            self.request_preemption();
        }
    }

    /// Sets the running thread's niceness.
    ///
    /// Under MLFQS its `recent_cpu` and priority are recomputed at once and
    /// it yields if it no longer leads the ready queue.
    pub fn set_nice(&mut self, nice: Nice) {
        let mlfqs = self.config.mode.is_mlfqs();
        let old = self.intr.disable();
        let cur = self.current;
        let load_avg = self.load_avg;
        let thread = self.registry.thread_mut(cur);
        thread.nice = nice;
        if mlfqs {
            thread.recent_cpu = decay_recent_cpu(load_avg, thread.recent_cpu, nice);
            let priority = mlfqs_priority(thread.recent_cpu, nice);
            thread.base_priority = priority;
            thread.priority = priority;
        }

        let mut payload = [0u8; 5];
        payload[..4].copy_from_slice(&cur.to_le_bytes());
        payload[4] = nice.get() as i8 as u8;
        self.emit(prio::NICE, &payload);
        if mlfqs {
            self.emit_priority(cur);
        }
        self.intr.restore(old);

        if mlfqs {
            self.yield_if_outranked();
        }
    }

    pub fn get_nice(&self) -> Nice {
        self.current().nice()
    }

    /// System load average times 100, rounded to nearest.
    pub fn get_load_avg(&self) -> i32 {
        self.load_avg.hundredths()
    }

    /// Running thread's `recent_cpu` times 100, rounded to nearest.
    pub fn get_recent_cpu(&self) -> i32 {
        self.current().recent_cpu().hundredths()
    }

    /// Raw fixed-point load average.
    pub fn load_avg(&self) -> Fixed {
        self.load_avg
    }

    /// Threads counted as runnable by the next load-average update.
    pub fn runnable_count(&self) -> usize {
        self.registry
            .iter_live()
            .filter(|t| {
                Some(t.tid()) != self.idle
                    && matches!(t.status(), ThreadStatus::Ready | ThreadStatus::Running)
            })
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::switch::HostSwitch;
    use kcore::{SchedulerConfig, ThreadId};

    fn mlfqs() -> Scheduler<HostSwitch> {
        let config = SchedulerConfig::builder().mlfqs(true).build();
        let mut sched = Scheduler::builder(HostSwitch::new()).config(config).build();
        sched.start().unwrap();
        sched
    }

    #[test]
    fn first_load_average_step() {
        let load = next_load_avg(Fixed::ZERO, 1);
        assert_eq!(load.raw(), 273);
        assert_eq!(load.hundredths(), 2);
    }

    #[test]
    fn decay_with_idle_system_leaves_only_nice() {
        let rc = decay_recent_cpu(Fixed::ZERO, Fixed::from_int(50), Nice::new(3));
        assert_eq!(rc, Fixed::from_int(3));
    }

    #[test]
    fn priority_formula_clamps() {
        assert_eq!(mlfqs_priority(Fixed::ZERO, Nice::ZERO), Priority::MAX);
        assert_eq!(mlfqs_priority(Fixed::from_int(4), Nice::ZERO), Priority::new(62));
        assert_eq!(mlfqs_priority(Fixed::from_int(400), Nice::MAX), Priority::MIN);
        assert_eq!(mlfqs_priority(Fixed::ZERO, Nice::MIN), Priority::MAX);
    }

    #[test]
    fn set_nice_recomputes_immediately() {
        let mut sched = mlfqs();
        sched.set_nice(Nice::new(5));
        assert_eq!(sched.get_nice(), Nice::new(5));
        assert_eq!(sched.get_recent_cpu(), 500);
        assert_eq!(sched.get_priority(), Priority::new(52));
    }

    #[test]
    fn set_nice_yields_to_higher_priority() {
        let mut sched = mlfqs();
        let worker = sched.create("worker", Priority::new(30), || {}).unwrap();
        assert_eq!(sched.current_tid(), ThreadId(1));

        sched.set_nice(Nice::MAX);
        assert_eq!(sched.current_tid(), worker);
        assert_eq!(sched.get_effective_priority(ThreadId(1)), Priority::new(18));
    }

    #[test]
    fn strict_mode_only_stores_nice() {
        let mut sched = Scheduler::builder(HostSwitch::new()).build();
        sched.start().unwrap();
        sched.set_nice(Nice::new(-4));
        assert_eq!(sched.get_nice(), Nice::new(-4));
        assert_eq!(sched.get_priority(), Priority::DEFAULT);
        assert_eq!(sched.get_recent_cpu(), 0);
    }

    #[test]
    fn created_threads_inherit_recent_cpu() {
        let mut sched = mlfqs();
        for _ in 0..3 {
            sched.timer_interrupt();
        }
        let child = sched.create("child", Priority::new(1), || {}).unwrap();
        let inherited = sched.thread(child).unwrap().recent_cpu();
        assert_eq!(inherited, Fixed::from_int(3));
        assert_eq!(sched.thread(child).unwrap().nice(), Nice::ZERO);
    }

    #[test]
    fn reporting_survives_large_recent_cpu() {
        let mut sched = mlfqs();
        let cur = sched.current_tid();
        sched.registry.thread_mut(cur).recent_cpu = Fixed::from_int(1500);
        sched.load_avg = Fixed::from_int(40);
        assert_eq!(sched.get_recent_cpu(), 150_000);
        assert_eq!(sched.get_load_avg(), 4_000);
    }

    #[test]
    fn idle_is_not_counted_as_runnable() {
        let sched = mlfqs();
        assert_eq!(sched.runnable_count(), 1);
    }
}

//! Shared probes for scheduler integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use ksched::{
    AddressSpace, ContextSwitch, KernelStack, SchedResult, Scheduler, SchedulerConfig, ThreadId,
};

/// Switch that remembers every transfer and activation it was asked for.
#[derive(Clone, Default)]
pub struct RecordingSwitch {
    switches: Arc<Mutex<Vec<(ThreadId, ThreadId)>>>,
    activations: Arc<Mutex<Vec<(ThreadId, Option<AddressSpace>)>>>,
    clobber_guard: bool,
}

impl RecordingSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    /// A switch whose `prepare` scribbles over the stack guard, as an
    /// overflowing first-run frame would.
    pub fn clobbering() -> Self {
        Self {
            clobber_guard: true,
            ..Self::default()
        }
    }

    pub fn switches(&self) -> Vec<(ThreadId, ThreadId)> {
        self.switches.lock().unwrap().clone()
    }

    /// Threads control was transferred to, in order.
    pub fn targets(&self) -> Vec<ThreadId> {
        self.switches().iter().map(|(_, next)| *next).collect()
    }

    pub fn activations(&self) -> Vec<(ThreadId, Option<AddressSpace>)> {
        self.activations.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.switches.lock().unwrap().clear();
        self.activations.lock().unwrap().clear();
    }
}

impl ContextSwitch for RecordingSwitch {
    fn switch(&mut self, current: ThreadId, next: ThreadId) -> ThreadId {
        self.switches.lock().unwrap().push((current, next));
        current
    }

    fn prepare(&mut self, _tid: ThreadId, stack: &mut KernelStack) {
        if self.clobber_guard {
            stack.memory_mut()[0] = 0;
        }
    }

    fn activate(&mut self, tid: ThreadId, space: Option<AddressSpace>) {
        self.activations.lock().unwrap().push((tid, space));
    }
}

/// Builds and starts a scheduler, returning it with a handle on its switch.
pub fn booted(config: SchedulerConfig) -> SchedResult<(Scheduler<RecordingSwitch>, RecordingSwitch)> {
    let probe = RecordingSwitch::new();
    let mut sched = Scheduler::builder(probe.clone()).config(config).build();
    sched.start()?;
    Ok((sched, probe))
}

/// Blocks the running thread the way a synchronization primitive would.
pub fn block_current<S: ContextSwitch>(sched: &mut Scheduler<S>) {
    let old = sched.intr_disable();
    sched.block();
    sched.intr_set_level(old);
}

/// Delivers `n` timer interrupts.
pub fn ticks<S: ContextSwitch>(sched: &mut Scheduler<S>, n: usize) {
    for _ in 0..n {
        sched.timer_interrupt();
    }
}

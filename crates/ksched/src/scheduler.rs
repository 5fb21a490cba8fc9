//! Scheduler core: thread life cycle and dispatch.
//!
//! ## Life cycle
//!
//! ```text
//!  create ──► Blocked ──► Ready ◄──────── yield_now / unblock
//!                           │                 ▲
//!                 dispatch  ▼                 │
//!                         Running ── block ─► Blocked
//!                           │
//!                      exit ▼
//!                         Dying ──► reclaimed by the next dispatch
//! ```
//!
//! ## Dispatch
//!
//! [`Scheduler::schedule`] pops the head of the ready queue (or falls back to
//! the idle thread), hands control to it through the [`ContextSwitch`]
//! capability and then runs [`Scheduler::finish_switch`] on behalf of the
//! thread that now owns the processor. A thread cannot free the stack it is
//! running on, so an exiting thread parks itself in a pending-reclaim slot
//! and its successor releases it once the switch has completed.
//!
//! ## Hosted builds
//!
//! With [`HostSwitch`](crate::HostSwitch) every call that dispatches returns
//! to its caller, which from then on acts as the newly running thread. On a
//! real platform `exit` never returns and the other calls return only when
//! the calling thread is scheduled again.

use alloc::boxed::Box;

use kcore::{
    Fixed, Priority, SchedError, SchedResult, SchedulerConfig, SchedulerMode, ThreadId,
    TidAllocator, TraceHook,
};

use crate::interrupt::{InterruptState, IntrLevel};
use crate::ready::ReadyQueue;
use crate::registry::Registry;
use crate::switch::ContextSwitch;
use crate::thread::{AddressSpace, KernelStack, Thread, ThreadEntry, ThreadStatus};

#[cfg(feature = "trace")]
pub(crate) use ktrace::records;

#[cfg(not(feature = "trace"))]
pub(crate) mod records {
    pub mod sched {
        pub const NEXT: u8 = 52;
        pub const IDLE: u8 = 53;
    }
    pub mod thread {
        pub const CREATE: u8 = 70;
        pub const UNBLOCK: u8 = 71;
        pub const BLOCK: u8 = 72;
        pub const YIELD: u8 = 73;
        pub const EXIT: u8 = 74;
        pub const RECLAIM: u8 = 75;
        pub const WAKE: u8 = 76;
    }
    pub mod prio {
        pub const CHANGE: u8 = 80;
        pub const NICE: u8 = 81;
        pub const LOAD_AVG: u8 = 82;
    }
}

use records::{sched, thread};

/// Tick and dispatch counters for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThreadStats {
    /// Ticks spent in the idle thread.
    pub idle_ticks: u64,
    /// Ticks spent in kernel threads.
    pub kernel_ticks: u64,
    /// Ticks spent in threads with a user address space.
    pub user_ticks: u64,
    /// Dispatches that actually changed the running thread.
    pub context_switches: u64,
    /// Dead threads whose storage was released.
    pub reclaimed: u64,
}

/// Builder for constructing a [`Scheduler`].
pub struct SchedulerBuilder<S: ContextSwitch> {
    switcher: S,
    config: SchedulerConfig,
    trace: Option<TraceHook>,
}

impl<S: ContextSwitch> SchedulerBuilder<S> {
    pub fn new(switcher: S) -> Self {
        Self {
            switcher,
            config: SchedulerConfig::default(),
            trace: None,
        }
    }

    /// Replaces the default configuration.
    pub fn config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the trace hook for scheduler events.
    pub fn with_trace_hook(mut self, hook: TraceHook) -> Self {
        self.trace = Some(hook);
        self
    }

    /// Adopts the running context as the boot thread and returns the
    /// scheduler, with interrupts still masked.
    pub fn build(self) -> Scheduler<S> {
        Scheduler::new(self.config, self.switcher, self.trace)
    }
}

/// The thread scheduler.
pub struct Scheduler<S: ContextSwitch> {
    pub(crate) config: SchedulerConfig,
    pub(crate) switcher: S,
    pub(crate) registry: Registry,
    pub(crate) ready: ReadyQueue,
    pub(crate) intr: InterruptState,
    pub(crate) current: ThreadId,
    pub(crate) initial: ThreadId,
    pub(crate) idle: Option<ThreadId>,
    /// Ticks since the running thread was last dispatched.
    pub(crate) thread_ticks: u32,
    /// Timer interrupts since boot.
    pub(crate) ticks: u64,
    pub(crate) load_avg: Fixed,
    pub(crate) stats: ThreadStats,
    /// Thread that exited and waits for its successor to release it.
    pub(crate) pending_reclaim: Option<ThreadId>,
    tids: TidAllocator,
    trace: Option<TraceHook>,
}

impl<S: ContextSwitch> Scheduler<S> {
    /// Creates a new scheduler builder around a switch capability.
    pub fn builder(switcher: S) -> SchedulerBuilder<S> {
        SchedulerBuilder::new(switcher)
    }

    fn new(config: SchedulerConfig, switcher: S, trace: Option<TraceHook>) -> Self {
        let tids = TidAllocator::new();
        let tid = tids.allocate();
        let mut boot = Thread::new(tid, config.initial_name, Priority::DEFAULT, KernelStack::boot());
        boot.set_status(ThreadStatus::Running);

        let mut registry = Registry::new();
        registry.insert(Box::new(boot));

        log::info!(
            "scheduler initialised: mode={:?} time_slice={} boot thread {tid}",
            config.mode,
            config.time_slice
        );

        Self {
            config,
            switcher,
            registry,
            ready: ReadyQueue::new(),
            intr: InterruptState::new(),
            current: tid,
            initial: tid,
            idle: None,
            thread_ticks: 0,
            ticks: 0,
            load_avg: Fixed::ZERO,
            stats: ThreadStats::default(),
            pending_reclaim: None,
            tids,
            trace,
        }
    }

    /// Creates the idle thread and unmasks interrupts, starting preemptive
    /// scheduling.
    pub fn start(&mut self) -> SchedResult<ThreadId> {
        assert!(self.idle.is_none(), "scheduler already started");
        let idle = self.spawn("idle", Priority::MIN, None)?;
        self.idle = Some(idle);
        log::info!("scheduler started, idle thread {idle}");
        self.intr_enable();
        Ok(idle)
    }

    // Life cycle

    /// Creates a thread running `entry` and makes it ready.
    ///
    /// If the new thread outranks the caller, the caller yields before this
    /// returns. Fails only when memory or thread slots run out.
    pub fn create<F>(&mut self, name: &str, priority: Priority, entry: F) -> SchedResult<ThreadId>
    where
        F: FnOnce() + Send + 'static,
    {
        let tid = self.spawn(name, priority, Some(Box::new(entry)))?;
        self.emit(thread::CREATE, &priority_payload(tid, priority));
        log::debug!("created {tid} \"{name}\" at priority {priority}");

        self.unblock(tid);

        if priority > self.registry.thread(self.current).priority() {
            self.yield_now();
        }
        Ok(tid)
    }

    /// Allocates, initialises and registers a blocked thread.
    fn spawn(&mut self, name: &str, priority: Priority, entry: Option<ThreadEntry>) -> SchedResult<ThreadId> {
        if let Some(max) = self.config.max_threads {
            if self.registry.live_len() >= max {
                log::warn!("cannot create \"{name}\": {}", SchedError::ThreadLimit(max));
                return Err(SchedError::ThreadLimit(max));
            }
        }

        let mut stack = KernelStack::try_new(self.config.stack_size).map_err(|err| {
            log::warn!("cannot create \"{name}\": {err}");
            err
        })?;
        let tid = self.tids.allocate();
        self.switcher.prepare(tid, &mut stack);

        let mut thread = Thread::new(tid, name, priority, stack);
        thread.set_entry(entry);
        if self.config.mode == SchedulerMode::Mlfqs {
            thread.recent_cpu = self.registry.thread(self.current).recent_cpu();
        }

        let old = self.intr.disable();
        self.registry.insert(Box::new(thread));
        self.ready.ensure_capacity(self.registry.live_len());
        self.intr.restore(old);
        Ok(tid)
    }

    /// Moves a blocked thread to the ready queue.
    ///
    /// Does not preempt the caller. Halts if `tid` is not blocked.
    pub fn unblock(&mut self, tid: ThreadId) {
        assert!(Some(tid) != self.idle, "idle thread cannot be unblocked");
        let old = self.intr.disable();
        let t = self.registry.thread_mut(tid);
        t.assert_valid();
        assert_eq!(
            t.status(),
            ThreadStatus::Blocked,
            "unblock of {tid} which is not blocked"
        );
        t.set_status(ThreadStatus::Ready);
        self.ready.insert(tid, &self.registry);
        self.intr.restore(old);
        self.emit_tid(thread::UNBLOCK, tid);
    }

    /// Puts the running thread to sleep until [`unblock`](Self::unblock).
    ///
    /// Must be called with interrupts masked and outside interrupt context.
    pub fn block(&mut self) {
        assert!(!self.intr.in_external(), "block called from interrupt context");
        assert_eq!(
            self.intr.level(),
            IntrLevel::Off,
            "block requires interrupts disabled"
        );
        let cur = self.current;
        self.registry.thread_mut(cur).set_status(ThreadStatus::Blocked);
        self.emit_tid(thread::BLOCK, cur);
        self.schedule();
    }

    /// Gives up the processor; the caller stays runnable.
    pub fn yield_now(&mut self) {
        assert!(!self.intr.in_external(), "yield called from interrupt context");
        let old = self.intr.disable();
        let cur = self.current;
        if Some(cur) == self.idle {
            // The idle thread is never queued; it is picked only as fallback.
            self.registry.thread_mut(cur).set_status(ThreadStatus::Blocked);
        } else {
            self.registry.thread_mut(cur).set_status(ThreadStatus::Ready);
            self.ready.insert(cur, &self.registry);
        }
        self.emit_tid(thread::YIELD, cur);
        self.schedule();
        self.intr.restore(old);
    }

    /// Terminates the running thread.
    ///
    /// The thread leaves the registry at once and is marked dying; its
    /// storage is released by the next thread to run. The boot thread's
    /// storage is never released.
    pub fn exit(&mut self) {
        assert!(!self.intr.in_external(), "exit called from interrupt context");
        let cur = self.current;
        assert!(Some(cur) != self.idle, "idle thread cannot exit");

        let old = self.intr.disable();
        self.registry.deregister(cur);
        let t = self.registry.thread_mut(cur);
        t.set_status(ThreadStatus::Dying);
        t.set_entry(None);
        if cur != self.initial {
            self.pending_reclaim = Some(cur);
        }
        self.emit_tid(thread::EXIT, cur);
        log::debug!("{cur} exiting");

        self.schedule();
        self.intr.restore(old);
    }

    /// First-run trampoline: unmasks interrupts, runs the running thread's
    /// entry and exits it.
    pub fn run_entry(&mut self) {
        let entry = self.registry.thread_mut(self.current).take_entry();
        self.intr_enable();
        if let Some(entry) = entry {
            entry();
        }
        self.exit();
    }

    /// Takes the entry of `tid` for platform first-run glue.
    pub fn take_entry(&mut self, tid: ThreadId) -> Option<ThreadEntry> {
        self.registry.thread_mut(tid).take_entry()
    }

    /// Attaches or detaches a user address space.
    pub fn set_address_space(&mut self, tid: ThreadId, space: Option<AddressSpace>) {
        self.registry.thread_mut(tid).set_address_space(space);
    }

    // Dispatch

    fn next_thread_to_run(&mut self) -> ThreadId {
        if let Some(next) = self.ready.pop_front() {
            return next;
        }
        match self.idle {
            Some(idle) => {
                self.emit_tid(sched::IDLE, idle);
                idle
            }
            None => panic!("dispatch found no runnable thread"),
        }
    }

    /// Picks the next thread and switches to it.
    ///
    /// The caller must already have moved the running thread out of the
    /// `Running` state, with interrupts masked.
    pub(crate) fn schedule(&mut self) {
        assert_eq!(self.intr.level(), IntrLevel::Off, "schedule with interrupts enabled");
        let cur = self.current;
        assert_ne!(
            self.registry.thread(cur).status(),
            ThreadStatus::Running,
            "schedule while {cur} is still running"
        );
        let next = self.next_thread_to_run();
        self.registry.thread(next).assert_valid();
        self.intr.clear_resched();

        let prev = if cur != next {
            self.current = next;
            self.stats.context_switches += 1;
            self.emit(sched::NEXT, &switch_payload(cur, next));
            log::trace!("switch {cur} -> {next}");
            Some(self.switcher.switch(cur, next))
        } else {
            None
        };
        self.finish_switch(prev);
    }

    /// Completes a switch on behalf of the thread that now runs.
    ///
    /// Marks it running, restarts its time slice, activates its address
    /// space and, if `prev` left through [`exit`](Self::exit), releases
    /// `prev`'s storage. Platforms whose threads first start in a
    /// trampoline call this from there.
    pub fn finish_switch(&mut self, prev: Option<ThreadId>) {
        assert_eq!(self.intr.level(), IntrLevel::Off, "finish_switch with interrupts enabled");
        let cur = self.current;
        let space = {
            let t = self.registry.thread_mut(cur);
            t.set_status(ThreadStatus::Running);
            t.address_space()
        };
        self.thread_ticks = 0;
        self.switcher.activate(cur, space);

        if let Some(prev) = prev {
            if self.pending_reclaim == Some(prev) {
                self.pending_reclaim = None;
                self.reclaim(prev);
            }
        }
    }

    fn reclaim(&mut self, tid: ThreadId) {
        assert_ne!(tid, self.current, "{tid} reclaiming itself");
        let dead = self.registry.reclaim(tid);
        assert_eq!(dead.status(), ThreadStatus::Dying, "{tid} reclaimed while alive");
        drop(dead);
        self.stats.reclaimed += 1;
        self.emit_tid(thread::RECLAIM, tid);
        log::debug!("reclaimed {tid}");
    }

    // Timer

    /// Timer interrupt entry point.
    ///
    /// Counts the tick, wakes expired sleepers and runs [`tick`](Self::tick)
    /// in interrupt context. On the way out it honours a yield request, and
    /// lets the idle thread step aside if something became ready.
    pub fn timer_interrupt(&mut self) {
        assert_eq!(
            self.intr.level(),
            IntrLevel::On,
            "timer interrupt while interrupts are disabled"
        );
        self.intr.enter_external();
        self.ticks += 1;
        self.wake_sleepers();
        self.tick();
        let yield_requested = self.intr.leave_external();

        if yield_requested {
            self.yield_now();
        } else if Some(self.current) == self.idle && !self.ready.is_empty() {
            self.block();
        }
        self.intr.restore(IntrLevel::On);
    }

    /// Per-tick accounting, time-slice enforcement and MLFQS updates.
    ///
    /// Runs inside the timer interrupt.
    pub fn tick(&mut self) {
        assert!(self.intr.in_external(), "tick outside interrupt context");
        let cur = self.current;
        if Some(cur) == self.idle {
            self.stats.idle_ticks += 1;
        } else if self.registry.thread(cur).address_space().is_some() {
            self.stats.user_ticks += 1;
        } else {
            self.stats.kernel_ticks += 1;
        }

        self.thread_ticks += 1;
        if self.thread_ticks >= self.config.time_slice {
            self.intr.request_yield_on_return();
        }

        if self.config.mode == SchedulerMode::Mlfqs {
            self.mlfqs_tick();
        }
    }

    // Interrupt level

    pub fn intr_get_level(&self) -> IntrLevel {
        self.intr.level()
    }

    /// Masks interrupts, returning the previous level.
    pub fn intr_disable(&mut self) -> IntrLevel {
        self.intr.disable()
    }

    /// Unmasks interrupts, returning the previous level. A reschedule
    /// requested while they were masked happens here.
    pub fn intr_enable(&mut self) -> IntrLevel {
        assert!(
            !self.intr.in_external(),
            "interrupts enabled inside an interrupt handler"
        );
        let old = self.intr.level();
        if self.intr.take_resched() {
            self.intr.disable();
            self.yield_now();
        }
        self.intr.restore(IntrLevel::On);
        old
    }

    /// Sets the interrupt level, returning the previous one.
    pub fn intr_set_level(&mut self, level: IntrLevel) -> IntrLevel {
        match level {
            IntrLevel::On => self.intr_enable(),
            IntrLevel::Off => self.intr_disable(),
        }
    }

    pub fn in_interrupt_context(&self) -> bool {
        self.intr.in_external()
    }

    /// Asks for a yield when the current interrupt handler returns.
    pub fn yield_on_return(&mut self) {
        self.intr.request_yield_on_return();
    }

    /// Makes the running thread give way at the next safe point.
    pub(crate) fn request_preemption(&mut self) {
        if self.intr.in_external() {
            self.intr.request_yield_on_return();
        } else if self.intr.level() == IntrLevel::Off {
            self.intr.request_resched();
        } else {
            self.yield_now();
        }
    }

    /// True if the ready-queue head outranks the running thread.
    pub(crate) fn outranked(&self) -> bool {
        self.ready.front().is_some_and(|head| {
            self.registry.thread(self.current).priority() < self.registry.thread(head).priority()
        })
    }

    pub(crate) fn yield_if_outranked(&mut self) {
        if self.outranked() {
            self.yield_now();
        }
    }

    // Queries

    /// The running thread.
    pub fn current(&self) -> &Thread {
        let t = self.registry.thread(self.current);
        t.assert_valid();
        assert_eq!(t.status(), ThreadStatus::Running, "{} is not running", t.tid());
        t
    }

    pub fn current_tid(&self) -> ThreadId {
        self.current().tid()
    }

    pub fn current_name(&self) -> &str {
        self.current().name()
    }

    /// Looks up a thread, including a dead one not yet reclaimed.
    pub fn thread(&self, tid: ThreadId) -> Option<&Thread> {
        self.registry.get(tid)
    }

    pub fn is_registered(&self, tid: ThreadId) -> bool {
        self.registry.is_live(tid)
    }

    /// Registered thread ids in registration order.
    pub fn all_threads(&self) -> &[ThreadId] {
        self.registry.live()
    }

    /// Snapshot of the ready queue, head first.
    pub fn ready_threads(&self) -> impl Iterator<Item = ThreadId> + '_ {
        self.ready.iter()
    }

    pub fn ready_count(&self) -> usize {
        self.ready.len()
    }

    pub fn idle_tid(&self) -> Option<ThreadId> {
        self.idle
    }

    pub fn initial_tid(&self) -> ThreadId {
        self.initial
    }

    pub fn mode(&self) -> SchedulerMode {
        self.config.mode
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Timer ticks since boot.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn switcher(&self) -> &S {
        &self.switcher
    }

    pub fn switcher_mut(&mut self) -> &mut S {
        &mut self.switcher
    }

    /// Applies `f` to every registered thread. Interrupts must be masked.
    pub fn for_each_thread(&self, mut f: impl FnMut(&Thread)) {
        assert_eq!(
            self.intr.level(),
            IntrLevel::Off,
            "thread iteration requires interrupts disabled"
        );
        for t in self.registry.iter_live() {
            f(t);
        }
    }

    pub fn stats(&self) -> ThreadStats {
        self.stats
    }

    /// Logs the tick counters.
    pub fn print_stats(&self) {
        log::info!(
            "Thread: {} idle ticks, {} kernel ticks, {} user ticks",
            self.stats.idle_ticks,
            self.stats.kernel_ticks,
            self.stats.user_ticks
        );
    }

    /// Halts if any scheduler invariant is broken.
    ///
    /// Meant for observation points outside dispatch.
    pub fn check_invariants(&self) {
        assert!(
            self.ready.is_sorted(&self.registry),
            "ready queue out of priority order"
        );
        for tid in self.ready.iter() {
            let t = self.registry.thread(tid);
            assert_eq!(t.status(), ThreadStatus::Ready, "{tid} queued while {:?}", t.status());
            assert!(self.registry.is_live(tid), "{tid} queued but not registered");
        }

        let mut running = 0;
        for t in self.registry.iter_live() {
            match t.status() {
                ThreadStatus::Running => {
                    running += 1;
                    assert_eq!(t.tid(), self.current, "{} running but not current", t.tid());
                }
                ThreadStatus::Ready => {
                    assert!(self.ready.contains(t.tid()), "{} ready but not queued", t.tid());
                }
                ThreadStatus::Dying => panic!("{} dying but still registered", t.tid()),
                ThreadStatus::Blocked => {}
            }
            if t.is_donated() {
                assert!(
                    t.priority() >= t.base_priority(),
                    "{} donated below its base priority",
                    t.tid()
                );
            }
        }
        assert_eq!(running, 1, "expected exactly one running thread");
    }

    // Tracing

    pub(crate) fn emit(&self, kind: u8, payload: &[u8]) {
        if let Some(trace) = &self.trace {
            let _ = trace(kind, payload);
        }
    }

    pub(crate) fn emit_tid(&self, kind: u8, tid: ThreadId) {
        self.emit(kind, &tid.to_le_bytes());
    }

    pub(crate) fn emit_priority(&self, tid: ThreadId) {
        let t = self.registry.thread(tid);
        let mut payload = [0u8; 6];
        payload[..4].copy_from_slice(&tid.to_le_bytes());
        payload[4] = t.base_priority().get();
        payload[5] = t.priority().get();
        self.emit(records::prio::CHANGE, &payload);
    }
}

fn priority_payload(tid: ThreadId, priority: Priority) -> [u8; 5] {
    let mut payload = [0u8; 5];
    payload[..4].copy_from_slice(&tid.to_le_bytes());
    payload[4] = priority.get();
    payload
}

fn switch_payload(prev: ThreadId, next: ThreadId) -> [u8; 8] {
    let mut payload = [0u8; 8];
    payload[..4].copy_from_slice(&prev.to_le_bytes());
    payload[4..].copy_from_slice(&next.to_le_bytes());
    payload
}

//! # ksched
//!
//! Thread scheduling core for a small preemptible uniprocessor kernel.
//!
//! The crate owns the thread life cycle, the ready-queue ordering policy,
//! base/effective priority bookkeeping for priority donation, and the MLFQS
//! dynamic-priority engine. Register-level context switching is injected
//! through the [`ContextSwitch`] capability, so the same core drives a real
//! platform or a hosted simulation.
//!
//! ## Module Overview
//! - [`thread`]    – Thread control blocks and kernel stacks.
//! - [`registry`]  – TCB storage and the live-thread list.
//! - [`ready`]     – Priority-ordered ready queue.
//! - [`interrupt`] – Interrupt level and deferred-yield flags.
//! - [`switch`]    – Context-switch capability and the hosted switch.
//! - [`scheduler`] – Life cycle, dispatch, timer tick and queries.
//! - [`donation`]  – Priority mutation API used by the locking layer.
//! - [`mlfqs`]     – Load average, recent CPU and computed priorities.
//! - [`sleep`]     – Tick-granular timed sleep.
//!
//! ## Example
//!
//! ```
//! use ksched::{HostSwitch, Priority, Scheduler};
//!
//! let mut sched = Scheduler::builder(HostSwitch::new()).build();
//! sched.start()?;
//!
//! let worker = sched.create("worker", Priority::new(40), || {})?;
//! assert_eq!(sched.current_tid(), worker);
//! # Ok::<(), ksched::SchedError>(())
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod donation;
pub mod interrupt;
pub mod mlfqs;
pub mod ready;
pub mod registry;
pub mod scheduler;
pub mod sleep;
pub mod switch;
pub mod thread;

pub use donation::PriorityField;
pub use interrupt::IntrLevel;
pub use scheduler::{Scheduler, SchedulerBuilder, ThreadStats};
pub use switch::{ContextSwitch, HostSwitch};
pub use thread::{
    AddressSpace, KernelStack, ResourceId, Thread, ThreadEntry, ThreadStatus, THREAD_MAGIC,
    THREAD_STACK_OFS,
};

pub use kcore::{
    Fixed, Nice, Priority, SchedError, SchedResult, SchedulerConfig, SchedulerConfigBuilder,
    SchedulerMode, ThreadId, TraceHook,
};

//! # kcore
//!
//! Leaf building blocks shared by the kernel thread scheduler. Nothing here
//! knows about thread control blocks or dispatch; these are the value types
//! and services the scheduler is assembled from.
//!
//! ## Module Overview
//! - [`fixed`]    – 17.14 signed fixed-point arithmetic used by MLFQS.
//! - [`priority`] – Priority range, thread identifiers and niceness bounds.
//! - [`tid`]      – Monotonic, serialized thread id allocation.
//! - [`config`]   – Scheduler configuration with builder.
//! - [`error`]    – Recoverable scheduler errors.
//! - [`trace`]    – Trace hook type shared with the tracing crate.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(any(feature = "std", feature = "lock-free")))]
compile_error!("kcore needs a lock: enable either `std` or `lock-free`");

extern crate alloc;

pub mod config;
pub mod error;
pub mod fixed;
pub mod priority;
pub mod sync;
pub mod tid;
pub mod trace;

pub use config::{SchedulerConfig, SchedulerConfigBuilder, SchedulerMode};
pub use error::{SchedError, SchedResult};
pub use fixed::Fixed;
pub use priority::{Nice, Priority, ThreadId};
pub use tid::TidAllocator;
pub use trace::{TraceError, TraceHook, TraceResult};

//! Scheduler configuration.
//!
//! The configuration is read once when the scheduler is built and never
//! changes afterwards; in particular the scheduling mode is fixed for the
//! lifetime of the kernel.

/// Which priority policy drives the ready queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulerMode {
    /// Owner-assigned priorities with donation from the synchronization layer.
    #[default]
    StrictPriority,
    /// Multi-level feedback queue: priorities derived from CPU usage and nice.
    Mlfqs,
}

impl SchedulerMode {
    /// Maps the boot-time `mlfqs` flag onto a mode.
    pub const fn from_flag(mlfqs: bool) -> Self {
        if mlfqs {
            Self::Mlfqs
        } else {
            Self::StrictPriority
        }
    }

    pub const fn is_mlfqs(self) -> bool {
        matches!(self, Self::Mlfqs)
    }
}

impl From<bool> for SchedulerMode {
    fn from(mlfqs: bool) -> Self {
        Self::from_flag(mlfqs)
    }
}

/// Sizing and timing parameters for the scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub mode: SchedulerMode,
    /// Ticks a thread may run before it is asked to yield.
    pub time_slice: u32,
    /// Timer interrupts per second; also the load-average update period.
    pub timer_freq: u32,
    /// MLFQS priority recomputation period, in ticks.
    pub priority_period: u32,
    /// Bytes of kernel stack given to each created thread.
    pub stack_size: usize,
    /// Upper bound on simultaneously registered threads, if any.
    pub max_threads: Option<usize>,
    /// Name adopted by the boot thread.
    pub initial_name: &'static str,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            mode: SchedulerMode::StrictPriority,
            time_slice: 4,
            timer_freq: 100,
            priority_period: 4,
            stack_size: 4096,
            max_threads: None,
            initial_name: "main",
        }
    }
}

impl SchedulerConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> SchedulerConfigBuilder {
        SchedulerConfigBuilder::default()
    }
}

/// Builder for ergonomic scheduler configuration.
#[derive(Debug, Clone, Default)]
pub struct SchedulerConfigBuilder {
    config: SchedulerConfig,
}

impl SchedulerConfigBuilder {
    /// Selects the scheduling policy.
    pub fn mode(mut self, mode: SchedulerMode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Shorthand for `mode(SchedulerMode::from_flag(enabled))`.
    pub fn mlfqs(self, enabled: bool) -> Self {
        self.mode(SchedulerMode::from_flag(enabled))
    }

    /// Sets the time slice in ticks.
    ///
    /// # Panics
    ///
    /// Panics if `ticks` is zero.
    pub fn time_slice(mut self, ticks: u32) -> Self {
        assert!(ticks > 0, "time slice must be at least one tick");
        self.config.time_slice = ticks;
        self
    }

    /// Sets the timer frequency in ticks per second.
    pub fn timer_freq(mut self, hz: u32) -> Self {
        assert!(hz > 0, "timer frequency must be non-zero");
        self.config.timer_freq = hz;
        self
    }

    pub fn priority_period(mut self, ticks: u32) -> Self {
        assert!(ticks > 0, "priority period must be non-zero");
        self.config.priority_period = ticks;
        self
    }

    /// Sets the per-thread stack size in bytes.
    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.config.stack_size = bytes;
        self
    }

    /// Caps the number of registered threads.
    pub fn max_threads(mut self, max: usize) -> Self {
        self.config.max_threads = Some(max);
        self
    }

    pub fn initial_name(mut self, name: &'static str) -> Self {
        self.config.initial_name = name;
        self
    }

    /// Builds the final configuration.
    pub fn build(self) -> SchedulerConfig {
        self.config
    }
}

//! Thread control blocks.
//!
//! A [`Thread`] is created by the scheduler, owned by it for its whole life
//! and only ever handed out by reference. Its kernel stack travels with it
//! and is released together with the block once the thread has died and a
//! successor has finished switching away from it.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;
use core::mem::offset_of;

use kcore::{Fixed, Nice, Priority, SchedError, SchedResult, ThreadId};

/// Value stored in every live TCB and at the base of every allocated stack.
/// Anything else found there means the stack ran over its bounds.
pub const THREAD_MAGIC: u32 = 0xcd6a_bf4b;

/// Longest thread name kept, in bytes.
pub const NAME_LEN: usize = 16;

/// Thread names are short, fixed-capacity display labels.
pub type ThreadName = heapless::String<NAME_LEN>;

/// Code a thread runs on its first dispatch.
pub type ThreadEntry = Box<dyn FnOnce() + Send>;

/// Bytes occupied by the guard word at the bottom of a stack.
const GUARD_LEN: usize = core::mem::size_of::<u32>();

/// Byte offset of the saved stack pointer inside a [`Thread`], for switch
/// glue written without access to Rust layout information.
pub const THREAD_STACK_OFS: usize = offset_of!(Thread, stack) + offset_of!(KernelStack, sp);

/// Life-cycle state of a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreadStatus {
    /// Waiting for an event; not in the ready queue.
    Blocked,
    /// Runnable and queued.
    Ready,
    /// Owns the processor. Exactly one thread is in this state.
    Running,
    /// Exited; storage is released by the next dispatch.
    Dying,
}

/// Opaque handle for a synchronization object the locking layer tracks.
///
/// The scheduler stores these for the locking layer and never looks behind
/// them. A handle does not keep the object alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceId(pub usize);

/// Opaque handle for a user address space attached to a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddressSpace(pub usize);

/// A thread's kernel stack.
///
/// The region grows down from its top. The lowest word holds
/// [`THREAD_MAGIC`] as an overflow guard. The boot thread runs on a stack
/// the scheduler did not allocate and carries an empty region.
#[repr(C)]
pub struct KernelStack {
    sp: usize,
    memory: Box<[u8]>,
}

impl KernelStack {
    /// Allocates a zeroed stack of `size` bytes.
    ///
    /// Returns [`SchedError::ResourceExhausted`] if the memory cannot be
    /// reserved.
    pub fn try_new(size: usize) -> SchedResult<Self> {
        assert!(size > GUARD_LEN, "stack of {size} bytes cannot hold its guard");
        let mut memory = Vec::new();
        memory
            .try_reserve_exact(size)
            .map_err(|_| SchedError::ResourceExhausted)?;
        memory.resize(size, 0u8);
        memory[..GUARD_LEN].copy_from_slice(&THREAD_MAGIC.to_le_bytes());
        Ok(Self {
            sp: size,
            memory: memory.into_boxed_slice(),
        })
    }

    /// Stack descriptor for the boot thread, whose stack predates the
    /// scheduler.
    pub(crate) fn boot() -> Self {
        Self {
            sp: 0,
            memory: Box::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.memory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memory.is_empty()
    }

    /// Offset of the saved stack pointer from the base of the region.
    pub fn sp(&self) -> usize {
        self.sp
    }

    pub fn set_sp(&mut self, sp: usize) {
        assert!(sp <= self.memory.len(), "stack pointer past top of stack");
        self.sp = sp;
    }

    /// Carves a `size`-byte frame off the top of the stack and returns it.
    ///
    /// Frames must be word aligned and may not reach into the guard word.
    pub fn alloc_frame(&mut self, size: usize) -> &mut [u8] {
        assert!(size % GUARD_LEN == 0, "frame size must be word aligned");
        assert!(
            self.sp >= size + GUARD_LEN,
            "frame of {size} bytes overflows the stack"
        );
        self.sp -= size;
        let start = self.sp;
        &mut self.memory[start..start + size]
    }

    /// Raw access for switch glue that saves context onto the stack.
    pub fn memory_mut(&mut self) -> &mut [u8] {
        &mut self.memory
    }

    /// True if the guard word is intact, or the stack was not allocated here.
    pub fn guard_intact(&self) -> bool {
        self.memory.is_empty() || self.memory[..GUARD_LEN] == THREAD_MAGIC.to_le_bytes()
    }
}

/// Thread control block.
#[repr(C)]
pub struct Thread {
    tid: ThreadId,
    status: ThreadStatus,
    name: ThreadName,
    stack: KernelStack,
    pub(crate) base_priority: Priority,
    pub(crate) priority: Priority,
    pub(crate) donated: bool,
    pub(crate) held_resources: Vec<ResourceId>,
    pub(crate) awaiting: Option<ResourceId>,
    pub(crate) sleep_ticks: u64,
    pub(crate) nice: Nice,
    pub(crate) recent_cpu: Fixed,
    address_space: Option<AddressSpace>,
    entry: Option<ThreadEntry>,
    magic: u32,
}

impl Thread {
    pub(crate) fn new(tid: ThreadId, name: &str, priority: Priority, stack: KernelStack) -> Self {
        Self {
            tid,
            status: ThreadStatus::Blocked,
            name: truncate_name(name),
            stack,
            base_priority: priority,
            priority,
            donated: false,
            held_resources: Vec::new(),
            awaiting: None,
            sleep_ticks: 0,
            nice: Nice::ZERO,
            recent_cpu: Fixed::ZERO,
            address_space: None,
            entry: None,
            magic: THREAD_MAGIC,
        }
    }

    pub fn tid(&self) -> ThreadId {
        self.tid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> ThreadStatus {
        self.status
    }

    /// Priority used for ordering, possibly raised by donation.
    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Priority the thread would have without donation.
    pub fn base_priority(&self) -> Priority {
        self.base_priority
    }

    pub fn is_donated(&self) -> bool {
        self.donated
    }

    pub fn held_resources(&self) -> &[ResourceId] {
        &self.held_resources
    }

    pub fn awaiting_resource(&self) -> Option<ResourceId> {
        self.awaiting
    }

    /// Remaining ticks of a timed sleep; zero when not sleeping.
    pub fn sleep_ticks(&self) -> u64 {
        self.sleep_ticks
    }

    pub fn nice(&self) -> Nice {
        self.nice
    }

    pub fn recent_cpu(&self) -> Fixed {
        self.recent_cpu
    }

    pub fn address_space(&self) -> Option<AddressSpace> {
        self.address_space
    }

    pub fn stack(&self) -> &KernelStack {
        &self.stack
    }

    /// True if the canary and stack guard are intact.
    pub fn is_valid(&self) -> bool {
        self.magic == THREAD_MAGIC && self.stack.guard_intact()
    }

    /// Halts on a corrupted TCB or overflowed stack.
    pub(crate) fn assert_valid(&self) {
        assert!(
            self.is_valid(),
            "stack overflow detected in thread {} ({})",
            self.tid,
            self.name
        );
    }

    pub(crate) fn set_status(&mut self, status: ThreadStatus) {
        self.status = status;
    }

    pub(crate) fn set_entry(&mut self, entry: Option<ThreadEntry>) {
        self.entry = entry;
    }

    pub(crate) fn take_entry(&mut self) -> Option<ThreadEntry> {
        self.entry.take()
    }

    pub(crate) fn set_address_space(&mut self, space: Option<AddressSpace>) {
        self.address_space = space;
    }
}

impl fmt::Debug for Thread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thread")
            .field("tid", &self.tid)
            .field("name", &self.name.as_str())
            .field("status", &self.status)
            .field("priority", &self.priority)
            .field("base_priority", &self.base_priority)
            .field("donated", &self.donated)
            .field("stack_size", &self.stack.len())
            .finish()
    }
}

fn truncate_name(name: &str) -> ThreadName {
    let mut out = ThreadName::new();
    for ch in name.chars() {
        if out.push(ch).is_err() {
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_creation() {
        let stack = KernelStack::try_new(1024).unwrap();
        let thread = Thread::new(ThreadId(7), "worker", Priority::new(12), stack);

        assert_eq!(thread.tid(), ThreadId(7));
        assert_eq!(thread.name(), "worker");
        assert_eq!(thread.status(), ThreadStatus::Blocked);
        assert_eq!(thread.priority(), Priority::new(12));
        assert_eq!(thread.base_priority(), Priority::new(12));
        assert!(!thread.is_donated());
        assert_eq!(thread.sleep_ticks(), 0);
        assert!(thread.is_valid());
    }

    #[test]
    fn long_names_are_truncated() {
        let thread = Thread::new(
            ThreadId(1),
            "a-very-long-thread-name",
            Priority::DEFAULT,
            KernelStack::boot(),
        );
        assert_eq!(thread.name(), "a-very-long-thre");
    }

    #[test]
    fn stack_is_zeroed_below_guard() {
        let stack = KernelStack::try_new(256).unwrap();
        assert_eq!(stack.len(), 256);
        assert_eq!(stack.sp(), 256);
        assert!(stack.memory[GUARD_LEN..].iter().all(|b| *b == 0));
        assert!(stack.guard_intact());
    }

    #[test]
    fn frames_grow_down() {
        let mut stack = KernelStack::try_new(64).unwrap();
        stack.alloc_frame(16).fill(0xAA);
        assert_eq!(stack.sp(), 48);
        stack.alloc_frame(8);
        assert_eq!(stack.sp(), 40);
        assert!(stack.memory[48..].iter().all(|b| *b == 0xAA));
    }

    #[test]
    #[should_panic(expected = "overflows the stack")]
    fn frame_cannot_reach_guard() {
        let mut stack = KernelStack::try_new(32).unwrap();
        stack.alloc_frame(32);
    }

    #[test]
    fn clobbered_guard_is_detected() {
        let mut thread = Thread::new(
            ThreadId(3),
            "victim",
            Priority::DEFAULT,
            KernelStack::try_new(128).unwrap(),
        );
        thread.stack.memory_mut()[0] ^= 0xFF;
        assert!(!thread.is_valid());
    }

    #[test]
    fn exhausted_allocation_reports_error() {
        assert_eq!(
            KernelStack::try_new(usize::MAX).err(),
            Some(SchedError::ResourceExhausted)
        );
    }

    #[test]
    fn stack_offset_points_at_saved_sp() {
        assert!(THREAD_STACK_OFS < core::mem::size_of::<Thread>());
    }
}

//! Priority-ordered queue of runnable threads.
//!
//! Threads are kept in non-increasing order of effective priority. A thread
//! inserted at a priority already present goes behind the existing entries
//! of that priority, so equal-priority threads take turns in FIFO order.
//! Priorities are read from the [`Registry`] at insertion time; callers that
//! change the priority of a queued thread must remove and reinsert it, or
//! [`resort`](ReadyQueue::resort) the whole queue.

use alloc::collections::VecDeque;

use kcore::ThreadId;

use crate::registry::Registry;

#[derive(Default)]
pub struct ReadyQueue {
    queue: VecDeque<ThreadId>,
}

impl ReadyQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `tid` behind every queued thread of equal or higher priority.
    pub fn insert(&mut self, tid: ThreadId, registry: &Registry) {
        debug_assert!(!self.contains(tid), "{tid} queued twice");
        let priority = registry.thread(tid).priority();
        let pos = self
            .queue
            .iter()
            .position(|t| registry.thread(*t).priority() < priority)
            .unwrap_or(self.queue.len());
        self.queue.insert(pos, tid);
    }

    /// Removes and returns the highest-priority, longest-waiting thread.
    pub fn pop_front(&mut self) -> Option<ThreadId> {
        self.queue.pop_front()
    }

    pub fn front(&self) -> Option<ThreadId> {
        self.queue.front().copied()
    }

    /// Removes `tid` if queued.
    pub fn remove(&mut self, tid: ThreadId) -> bool {
        match self.queue.iter().position(|t| *t == tid) {
            Some(pos) => {
                self.queue.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, tid: ThreadId) -> bool {
        self.queue.contains(&tid)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ThreadId> + '_ {
        self.queue.iter().copied()
    }

    /// Restores ordering after priorities changed in place. The sort is
    /// stable, so equal-priority threads keep their relative order.
    pub fn resort(&mut self, registry: &Registry) {
        self.queue
            .make_contiguous()
            .sort_by(|a, b| registry.thread(*b).priority().cmp(&registry.thread(*a).priority()));
    }

    /// True if the queue is in non-increasing priority order.
    pub fn is_sorted(&self, registry: &Registry) -> bool {
        self.queue
            .iter()
            .zip(self.queue.iter().skip(1))
            .all(|(a, b)| registry.thread(*a).priority() >= registry.thread(*b).priority())
    }

    /// Grows capacity so `total` threads fit without reallocating, keeping
    /// interrupt-time insertions allocation free.
    pub(crate) fn ensure_capacity(&mut self, total: usize) {
        let spare = self.queue.capacity() - self.queue.len();
        let needed = total.saturating_sub(self.queue.len());
        if needed > spare {
            self.queue.reserve(needed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thread::{KernelStack, Thread};
    use alloc::boxed::Box;
    use alloc::vec::Vec;
    use kcore::Priority;

    fn registry_with(prios: &[(i32, u8)]) -> Registry {
        let mut registry = Registry::new();
        for &(tid, prio) in prios {
            registry.insert(Box::new(Thread::new(
                ThreadId(tid),
                "t",
                Priority::new(prio),
                KernelStack::try_new(64).unwrap(),
            )));
        }
        registry
    }

    fn order(queue: &ReadyQueue) -> Vec<i32> {
        queue.iter().map(|t| t.0).collect()
    }

    #[test]
    fn thread_queue_priority_order() {
        let registry = registry_with(&[(1, 5), (2, 10), (3, 3)]);
        let mut queue = ReadyQueue::new();
        for tid in 1..=3 {
            queue.insert(ThreadId(tid), &registry);
        }

        assert_eq!(order(&queue), vec![2, 1, 3]);
        assert_eq!(queue.pop_front(), Some(ThreadId(2)));
        assert_eq!(queue.front(), Some(ThreadId(1)));
    }

    #[test]
    fn equal_priorities_are_fifo() {
        let registry = registry_with(&[(1, 20), (2, 20), (3, 30), (4, 20)]);
        let mut queue = ReadyQueue::new();
        for tid in [1, 2, 3, 4] {
            queue.insert(ThreadId(tid), &registry);
        }
        assert_eq!(order(&queue), vec![3, 1, 2, 4]);
        assert!(queue.is_sorted(&registry));
    }

    #[test]
    fn remove_and_reinsert_moves_to_back_of_band() {
        let registry = registry_with(&[(1, 20), (2, 20), (3, 20)]);
        let mut queue = ReadyQueue::new();
        for tid in [1, 2, 3] {
            queue.insert(ThreadId(tid), &registry);
        }
        assert!(queue.remove(ThreadId(1)));
        assert!(!queue.remove(ThreadId(9)));
        queue.insert(ThreadId(1), &registry);
        assert_eq!(order(&queue), vec![2, 3, 1]);
    }

    #[test]
    fn resort_is_stable() {
        let mut registry = registry_with(&[(1, 10), (2, 20), (3, 30)]);
        let mut queue = ReadyQueue::new();
        for tid in [1, 2, 3] {
            queue.insert(ThreadId(tid), &registry);
        }
        assert_eq!(order(&queue), vec![3, 2, 1]);

        registry.thread_mut(ThreadId(3)).priority = Priority::new(10);
        registry.thread_mut(ThreadId(1)).priority = Priority::new(40);
        assert!(!queue.is_sorted(&registry));

        queue.resort(&registry);
        assert_eq!(order(&queue), vec![1, 2, 3]);

        registry.thread_mut(ThreadId(2)).priority = Priority::new(40);
        queue.resort(&registry);
        assert_eq!(order(&queue), vec![1, 2, 3]);
    }

    #[test]
    fn capacity_is_reserved_up_front() {
        let mut queue = ReadyQueue::new();
        queue.ensure_capacity(16);
        assert!(queue.queue.capacity() >= 16);
    }
}

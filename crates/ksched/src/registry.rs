//! Storage for thread control blocks and the list of live threads.
//!
//! Two views are kept. The *store* owns every TCB by id until it is
//! reclaimed. The *live list* holds the ids of registered threads in
//! registration order and drives bulk sweeps. An exiting thread leaves the
//! live list at once but stays in the store until its successor reclaims it.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use kcore::ThreadId;

use crate::thread::Thread;

#[derive(Default)]
pub struct Registry {
    store: BTreeMap<ThreadId, Box<Thread>>,
    live: Vec<ThreadId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a new TCB and registers it as live.
    pub(crate) fn insert(&mut self, thread: Box<Thread>) {
        let tid = thread.tid();
        assert!(
            !self.store.contains_key(&tid),
            "{tid} registered twice"
        );
        self.store.insert(tid, thread);
        self.live.push(tid);
    }

    /// Removes a thread from the live list; its storage stays.
    pub(crate) fn deregister(&mut self, tid: ThreadId) {
        let pos = self
            .live
            .iter()
            .position(|t| *t == tid)
            .unwrap_or_else(|| panic!("{tid} is not registered"));
        self.live.remove(pos);
    }

    /// Hands over the storage of a deregistered thread.
    pub(crate) fn reclaim(&mut self, tid: ThreadId) -> Box<Thread> {
        assert!(!self.is_live(tid), "{tid} reclaimed while still registered");
        self.store
            .remove(&tid)
            .unwrap_or_else(|| panic!("{tid} reclaimed twice"))
    }

    pub fn get(&self, tid: ThreadId) -> Option<&Thread> {
        self.store.get(&tid).map(|t| &**t)
    }

    /// Looks up a thread that must exist.
    pub fn thread(&self, tid: ThreadId) -> &Thread {
        self.get(tid)
            .unwrap_or_else(|| panic!("no thread with {tid}"))
    }

    pub(crate) fn thread_mut(&mut self, tid: ThreadId) -> &mut Thread {
        self.store
            .get_mut(&tid)
            .map(|t| &mut **t)
            .unwrap_or_else(|| panic!("no thread with {tid}"))
    }

    pub fn is_live(&self, tid: ThreadId) -> bool {
        self.live.contains(&tid)
    }

    /// Registered thread ids, in registration order.
    pub fn live(&self) -> &[ThreadId] {
        &self.live
    }

    pub fn live_len(&self) -> usize {
        self.live.len()
    }

    /// Number of TCBs held, including dead ones awaiting reclamation.
    pub fn stored_len(&self) -> usize {
        self.store.len()
    }

    /// Iterates the registered threads in registration order.
    pub fn iter_live(&self) -> impl Iterator<Item = &Thread> + '_ {
        self.live.iter().map(move |tid| self.thread(*tid))
    }

    /// Applies `f` to every registered thread.
    pub(crate) fn for_each_live_mut(&mut self, mut f: impl FnMut(&mut Thread)) {
        for tid in &self.live {
            if let Some(thread) = self.store.get_mut(tid) {
                f(thread);
            }
        }
    }
}

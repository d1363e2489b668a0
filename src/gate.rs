//! One-shot settlement latch bridging the driver task and blocking waiters.
//!
//! The mutex is the synchronization edge between the two worlds: the result
//! is written before the condvar broadcast, so every waiter observes a
//! fully-formed result.

use std::sync::{Condvar, Mutex};

pub(crate) struct Gate<R> {
    slot: Mutex<Option<R>>,
    settled: Condvar,
}

impl<R> Gate<R> {
    pub(crate) fn new() -> Self {
        Self { slot: Mutex::new(None), settled: Condvar::new() }
    }

    /// Open the gate, releasing all current and future waiters.
    ///
    /// Opening twice is a defect; the first result wins.
    pub(crate) fn open(&self, result: R) {
        let mut slot = self.slot.lock().unwrap();
        debug_assert!(slot.is_none(), "gate opened twice");
        slot.get_or_insert(result);
        drop(slot);
        self.settled.notify_all();
    }

    pub(crate) fn is_open(&self) -> bool {
        self.slot.lock().unwrap().is_some()
    }
}

impl<R: Clone> Gate<R> {
    /// Block until the gate opens, then return the settled result.
    ///
    /// Returns immediately if already open. Must run on a blocking-capable
    /// thread, never on a runtime worker.
    pub(crate) fn wait(&self) -> R {
        let mut slot = self.slot.lock().unwrap();
        loop {
            if let Some(result) = slot.as_ref() {
                return result.clone();
            }
            slot = self.settled.wait(slot).unwrap();
        }
    }

    /// Non-blocking peek at the settled result.
    pub(crate) fn try_get(&self) -> Option<R> {
        self.slot.lock().unwrap().clone()
    }
}

impl<R> Default for Gate<R> {
    fn default() -> Self {
        Self::new()
    }
}

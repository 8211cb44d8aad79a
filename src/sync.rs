//! Small synchronization helpers shared by the long-lived components.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Lock a mutex, recovering the data if a previous holder panicked
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Holds a busy flag for the lifetime of an operation.
///
/// Acquiring fails when the flag is already set; dropping the guard clears it
/// whether the operation succeeded, failed or panicked.
pub(crate) struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    pub fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Single-occupancy slot owned by one numbered run at a time.
///
/// Cancelling empties the slot at once, so a new run can be admitted while
/// the cancelled one winds down. A run is cancelled as soon as the slot no
/// longer holds its id, and its guard never releases a slot it lost.
#[derive(Debug, Default)]
pub(crate) struct RunSlot {
    active: AtomicU64,
    last_id: AtomicU64,
}

impl RunSlot {
    pub fn acquire(&self) -> Option<RunGuard<'_>> {
        let id = self.last_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.active
            .compare_exchange(0, id, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard { slot: self, id })
    }

    pub fn is_occupied(&self) -> bool {
        self.active.load(Ordering::Acquire) != 0
    }

    /// Empty the slot, returning whether a run held it
    pub fn cancel(&self) -> bool {
        self.active.swap(0, Ordering::AcqRel) != 0
    }
}

pub(crate) struct RunGuard<'a> {
    slot: &'a RunSlot,
    id: u64,
}

impl RunGuard<'_> {
    pub fn is_cancelled(&self) -> bool {
        self.slot.active.load(Ordering::Acquire) != self.id
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        let _ = self
            .slot
            .active
            .compare_exchange(self.id, 0, Ordering::AcqRel, Ordering::Acquire);
    }
}

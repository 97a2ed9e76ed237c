//! Fixed-capacity FIFO shared between producers and consumers.
//!
//! Every access to the queued items happens while the buffer's
//! [`BinaryLock`] is held. A full or empty buffer is reported straight back
//! to the caller; the buffer never waits for space or for items itself.

use std::cell::UnsafeCell;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::lock::{BinaryLock, Interrupt, LockError, LockGuard};

/// Upper bound on slots reserved up front, so a huge capacity does not
/// allocate before it is used.
pub(crate) const PREALLOC_LIMIT: usize = 1024;

/// Outcome of offering an item to the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Offer<T> {
    Accepted,
    /// The buffer was full; the item is handed back.
    Full(T),
}

impl<T> Offer<T> {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Offer::Accepted)
    }
}

pub struct BoundedBuffer<T> {
    lock: BinaryLock,
    slots: UnsafeCell<VecDeque<T>>,
    len: AtomicUsize,
    capacity: usize,
    #[cfg(test)]
    occupants: Occupants,
}

/// Threads currently inside `with_slots`, and how often more than one was.
#[cfg(test)]
#[derive(Debug, Default)]
struct Occupants {
    inside: AtomicUsize,
    entries: AtomicUsize,
    overlaps: AtomicUsize,
}

#[cfg(test)]
impl Occupants {
    fn enter(&self) {
        self.entries.fetch_add(1, Ordering::SeqCst);
        if self.inside.fetch_add(1, Ordering::SeqCst) != 0 {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn leave(&self) {
        self.inside.fetch_sub(1, Ordering::SeqCst);
    }
}

// SAFETY: `slots` is only touched through `with_slots`, which requires a
// guard from `lock`, so at most one thread accesses it at a time.
unsafe impl<T: Send> Sync for BoundedBuffer<T> {}

impl<T> BoundedBuffer<T> {
    /// A capacity of 0 is allowed; such a buffer rejects every item.
    pub fn new(capacity: usize) -> Self {
        Self {
            lock: BinaryLock::new(),
            slots: UnsafeCell::new(VecDeque::with_capacity(capacity.min(PREALLOC_LIMIT))),
            len: AtomicUsize::new(0),
            capacity,
            #[cfg(test)]
            occupants: Occupants::default(),
        }
    }

    fn with_slots<R>(&self, guard: &LockGuard<'_>, f: impl FnOnce(&mut VecDeque<T>) -> R) -> R {
        debug_assert!(guard.guards(&self.lock), "guard belongs to another lock");
        #[cfg(test)]
        self.occupants.enter();

        // SAFETY: the guard proves this thread holds `self.lock`.
        let slots = unsafe { &mut *self.slots.get() };
        let out = f(&mut *slots);
        self.len.store(slots.len(), Ordering::Release);

        #[cfg(test)]
        self.occupants.leave();
        out
    }

    fn offer(&self, guard: &LockGuard<'_>, item: T) -> Offer<T> {
        self.with_slots(guard, |slots| {
            if slots.len() < self.capacity {
                slots.push_back(item);
                Offer::Accepted
            } else {
                Offer::Full(item)
            }
        })
    }

    fn take(&self, guard: &LockGuard<'_>) -> Option<T> {
        self.with_slots(guard, VecDeque::pop_front)
    }

    pub fn try_enqueue(&self, item: T) -> Offer<T> {
        let guard = self.lock.acquire();
        self.offer(&guard, item)
    }

    pub fn try_dequeue(&self) -> Option<T> {
        let guard = self.lock.acquire();
        self.take(&guard)
    }

    /// Same as [`try_enqueue`](Self::try_enqueue), but the wait for the
    /// lock can be cut short by `interrupt`. The item is dropped in that
    /// case.
    pub fn try_enqueue_interruptible(
        &self,
        item: T,
        interrupt: &Interrupt,
    ) -> Result<Offer<T>, LockError> {
        let guard = self.lock.acquire_interruptible(interrupt)?;
        Ok(self.offer(&guard, item))
    }

    pub fn try_dequeue_interruptible(&self, interrupt: &Interrupt) -> Result<Option<T>, LockError> {
        let guard = self.lock.acquire_interruptible(interrupt)?;
        Ok(self.take(&guard))
    }

    /// Wakes threads waiting on this buffer's lock so that those holding
    /// `interrupt` give up.
    pub fn interrupt(&self, interrupt: &Interrupt) {
        self.lock.interrupt(interrupt);
    }

    /// Items currently queued. For reporting only: the value can change
    /// right after it is read.
    pub fn occupancy(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn into_inner(self) -> VecDeque<T> {
        self.slots.into_inner()
    }
}

impl<T> fmt::Debug for BoundedBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedBuffer")
            .field("occupancy", &self.occupancy())
            .field("capacity", &self.capacity)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

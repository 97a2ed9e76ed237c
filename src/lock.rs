//! Binary lock built from a `Mutex<bool>` and a `Condvar`.
//!
//! The inner mutex only guards the `held` flag for the instant it takes to
//! flip it; the critical section protected by a [`BinaryLock`] runs with the
//! inner mutex released. Waiters sleep on the condvar and re-check the flag
//! every time they wake.

use std::sync::atomic::{AtomicBool, Ordering};
use std::ptr;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockError {
    #[error("interrupted while waiting for the lock")]
    Interrupted,
}

// =============================================================================
// Interrupt token
// =============================================================================

/// Cancellation token observed by interruptible acquires and worker loops.
///
/// Cloning shares the flag. Raising it does not by itself wake a thread
/// that is asleep inside [`BinaryLock::acquire_interruptible`]; use
/// [`BinaryLock::interrupt`] for that.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    raised: Arc<AtomicBool>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.raised.store(true, Ordering::Release);
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }
}

// =============================================================================
// BinaryLock
// =============================================================================

#[derive(Debug, Default)]
pub struct BinaryLock {
    held: Mutex<bool>,
    waiters: Condvar,
}

impl BinaryLock {
    pub const fn new() -> Self {
        Self {
            held: Mutex::new(false),
            waiters: Condvar::new(),
        }
    }

    // Nothing that can panic runs while the state mutex is held, so a
    // poisoned flag is still accurate.
    fn state(&self) -> MutexGuard<'_, bool> {
        self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait<'a>(&self, held: MutexGuard<'a, bool>) -> MutexGuard<'a, bool> {
        self.waiters
            .wait(held)
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks until the lock is free, then takes it.
    pub fn acquire(&self) -> LockGuard<'_> {
        let mut held = self.state();
        while *held {
            held = self.wait(held);
        }
        *held = true;
        LockGuard { lock: self }
    }

    /// Like [`acquire`](Self::acquire), but gives up once `interrupt` is
    /// raised while this thread is waiting.
    ///
    /// On `Err` the caller does not hold the lock.
    pub fn acquire_interruptible(&self, interrupt: &Interrupt) -> Result<LockGuard<'_>, LockError> {
        self.lock_raw(interrupt)?;
        Ok(LockGuard { lock: self })
    }

    /// Takes the lock without producing a guard. Must be paired with
    /// [`release`](Self::release).
    pub fn lock_raw(&self, interrupt: &Interrupt) -> Result<(), LockError> {
        let mut held = self.state();
        while *held {
            if interrupt.is_raised() {
                // A release may have picked us as the one waiter to wake.
                // Hand that wakeup on so it is not lost.
                drop(held);
                self.waiters.notify_one();
                return Err(LockError::Interrupted);
            }
            held = self.wait(held);
        }
        *held = true;
        Ok(())
    }

    /// Takes the lock only if it is free right now.
    pub fn try_acquire(&self) -> Option<LockGuard<'_>> {
        let mut held = self.state();
        if *held {
            return None;
        }
        *held = true;
        Some(LockGuard { lock: self })
    }

    /// Marks the lock free and wakes one waiter. No-op when not held.
    pub fn release(&self) {
        let mut held = self.state();
        if !*held {
            return;
        }
        *held = false;
        drop(held);
        self.waiters.notify_one();
    }

    /// Raises `interrupt` and wakes every waiter so the interrupted ones can
    /// observe it. Waiters holding a different token go back to sleep.
    pub fn interrupt(&self, interrupt: &Interrupt) {
        interrupt.raise();
        // Taking the state mutex orders the raise before any waiter's
        // re-check, so a waiter that just missed the flag is already parked.
        let _held = self.state();
        self.waiters.notify_all();
    }

    /// Informational only; the answer may be stale by the time it is read.
    pub fn is_held(&self) -> bool {
        *self.state()
    }
}

/// Releases the lock when dropped.
#[must_use = "the lock is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct LockGuard<'a> {
    lock: &'a BinaryLock,
}

impl LockGuard<'_> {
    /// True if this guard was handed out by `lock`.
    pub(crate) fn guards(&self, lock: &BinaryLock) -> bool {
        ptr::eq(self.lock, lock)
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        self.lock.release();
    }
}

// =============================================================================
// Tests
// =============================================================================

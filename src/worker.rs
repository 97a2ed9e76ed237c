//! Producer and consumer state plus the loops that drive them.
//!
//! The state structs know nothing about threads. The coordinator moves
//! each one onto its own thread together with a handle to the shared
//! buffer and runs [`run_producer`] or [`run_consumer`] there.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::buffer::{BoundedBuffer, Offer, PREALLOC_LIMIT};
use crate::lock::{Interrupt, LockError};
use crate::retry::RetryPolicy;

/// A produced item, tagged with who made it and in which order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Item {
    pub producer: usize,
    pub seq: usize,
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}#{}", self.producer, self.seq)
    }
}

/// Shared "all producers have finished" signal, written once by the
/// coordinator and read by every consumer.
#[derive(Debug, Clone, Default)]
pub struct CompletionFlag {
    set: Arc<AtomicBool>,
}

impl CompletionFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.set.store(true, Ordering::Release);
    }

    pub fn is_set(&self) -> bool {
        self.set.load(Ordering::Acquire)
    }
}

// =============================================================================
// Producer
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Producer {
    pub id: usize,
    pub target: usize,
    pub added: usize,
}

impl Producer {
    pub fn new(id: usize, target: usize) -> Self {
        Self { id, target, added: 0 }
    }

    pub fn is_done(&self) -> bool {
        self.added >= self.target
    }
}

/// Offers items until `state.target` of them have been accepted.
///
/// A full buffer is never a reason to stop; only `interrupt` ends the loop
/// early, in which case `state.added` still counts what got in.
pub fn run_producer(
    state: &mut Producer,
    buffer: &BoundedBuffer<Item>,
    policy: RetryPolicy,
    interrupt: &Interrupt,
) -> Result<(), LockError> {
    let retry = policy.start();
    let mut stalled = false;

    while !state.is_done() {
        if interrupt.is_raised() {
            warn!(producer = state.id, added = state.added, "producer interrupted");
            return Err(LockError::Interrupted);
        }

        let item = Item {
            producer: state.id,
            seq: state.added,
        };
        match buffer.try_enqueue_interruptible(item, interrupt)? {
            Offer::Accepted => {
                state.added += 1;
                retry.reset();
                stalled = false;
                trace!(
                    producer = state.id,
                    %item,
                    occupancy = buffer.occupancy(),
                    capacity = buffer.capacity(),
                    "added item"
                );
            }
            Offer::Full(_) => {
                if !stalled {
                    debug!(producer = state.id, "buffer full, producer waiting");
                    stalled = true;
                }
                retry.pause();
            }
        }
    }

    debug!(producer = state.id, added = state.added, "producer finished");
    Ok(())
}

// =============================================================================
// Consumer
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Consumer {
    pub id: usize,
    pub target: usize,
    pub removed: usize,
    /// Every item taken, in order; only kept when recording is enabled.
    pub received: Option<Vec<Item>>,
}

impl Consumer {
    pub fn new(id: usize, target: usize) -> Self {
        Self {
            id,
            target,
            removed: 0,
            received: None,
        }
    }

    pub fn recording(mut self) -> Self {
        self.received = Some(Vec::with_capacity(self.target.min(PREALLOC_LIMIT)));
        self
    }

    pub fn is_done(&self) -> bool {
        self.removed >= self.target
    }
}

/// Takes items until this consumer's share is met, or until the producers
/// are finished and the buffer has been drained.
pub fn run_consumer(
    state: &mut Consumer,
    buffer: &BoundedBuffer<Item>,
    finished: &CompletionFlag,
    policy: RetryPolicy,
    interrupt: &Interrupt,
) -> Result<(), LockError> {
    let retry = policy.start();
    let mut starved = false;

    while !state.is_done() {
        if interrupt.is_raised() {
            warn!(consumer = state.id, removed = state.removed, "consumer interrupted");
            return Err(LockError::Interrupted);
        }

        // Read the flag before the attempt. If it was already set, every
        // item is in the buffer, so finding it empty means it is drained.
        let producers_done = finished.is_set();

        match buffer.try_dequeue_interruptible(interrupt)? {
            Some(item) => {
                state.removed += 1;
                if let Some(received) = state.received.as_mut() {
                    received.push(item);
                }
                retry.reset();
                starved = false;
                trace!(
                    consumer = state.id,
                    %item,
                    occupancy = buffer.occupancy(),
                    capacity = buffer.capacity(),
                    "removed item"
                );
            }
            None if producers_done => break,
            None => {
                if !starved {
                    debug!(consumer = state.id, "buffer empty, consumer waiting");
                    starved = true;
                }
                retry.pause();
            }
        }
    }

    debug!(consumer = state.id, removed = state.removed, "consumer finished");
    Ok(())
}

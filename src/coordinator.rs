//! Starts the producers and consumers, runs the shutdown handshake and
//! collects the report.
//!
//! The order matters: the completion flag is set only after every producer
//! thread has been joined. Until then a consumer that finds the buffer
//! empty keeps waiting, because more items may still arrive.

use std::fmt;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, RecvTimeoutError, Sender};
use thiserror::Error;
use tracing::{info, warn};

use crate::buffer::BoundedBuffer;
use crate::config::{ConfigError, SimConfig};
use crate::distribute::split_evenly;
use crate::lock::{Interrupt, LockError};
use crate::report::{ConsumerReport, ProducerReport, RunReport, RunStatus};
use crate::worker::{run_consumer, run_producer, CompletionFlag, Consumer, Item, Producer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Producer,
    Consumer,
    Watchdog,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Producer => "producer",
            Role::Consumer => "consumer",
            Role::Watchdog => "watchdog",
        })
    }
}

#[derive(Error, Debug)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to spawn {role} thread {id}: {source}")]
    Spawn {
        role: Role,
        id: usize,
        #[source]
        source: io::Error,
    },

    #[error("{role} {id} panicked")]
    WorkerPanicked { role: Role, id: usize },
}

/// Stops a running [`Simulation`] from another thread.
#[derive(Debug, Clone)]
pub struct AbortHandle {
    buffer: Arc<BoundedBuffer<Item>>,
    interrupt: Interrupt,
}

impl AbortHandle {
    /// Workers blocked on the buffer's lock give up immediately; the rest
    /// stop at their next loop check.
    pub fn abort(&self) {
        self.buffer.interrupt(&self.interrupt);
    }

    pub fn is_aborted(&self) -> bool {
        self.interrupt.is_raised()
    }
}

struct Watchdog {
    done: Sender<()>,
    handle: JoinHandle<()>,
}

impl Watchdog {
    fn spawn(deadline: Duration, abort: AbortHandle) -> io::Result<Self> {
        let (done, finished) = channel::bounded::<()>(1);
        let handle = thread::Builder::new().name("watchdog".into()).spawn(move || {
            if let Err(RecvTimeoutError::Timeout) = finished.recv_timeout(deadline) {
                warn!(?deadline, "deadline passed, aborting run");
                abort.abort();
            }
        })?;
        Ok(Self { done, handle })
    }

    fn disarm(self) {
        drop(self.done);
        if self.handle.join().is_err() {
            warn!("watchdog thread panicked");
        }
    }
}

/// Aborts the run if dropped while its worker thread is unwinding, so a
/// panicked worker cannot leave the others waiting on a share it will
/// never produce or take.
struct AbortOnPanic(AbortHandle);

impl Drop for AbortOnPanic {
    fn drop(&mut self) {
        // No logging here: the panic may have come from the log writer.
        if thread::panicking() {
            self.0.abort();
        }
    }
}

type ProducerRun = (Producer, Result<(), LockError>);
type ConsumerRun = (Consumer, Result<(), LockError>);

fn spawn_worker<T, F>(role: Role, id: usize, body: F) -> Result<JoinHandle<T>, SimError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    thread::Builder::new()
        .name(format!("{role}-{id}"))
        .spawn(body)
        .map_err(|source| SimError::Spawn { role, id, source })
}

/// Joins every handle, keeping the first panic as the error.
fn join_all<T>(
    role: Role,
    handles: Vec<(usize, JoinHandle<T>)>,
    failure: &mut Option<SimError>,
) -> Vec<T> {
    let mut runs = Vec::with_capacity(handles.len());
    for (id, handle) in handles {
        match handle.join() {
            Ok(run) => runs.push(run),
            Err(_) => {
                warn!(%role, id, "worker panicked");
                if failure.is_none() {
                    *failure = Some(SimError::WorkerPanicked { role, id });
                }
            }
        }
    }
    runs
}

pub struct Simulation {
    config: SimConfig,
    buffer: Arc<BoundedBuffer<Item>>,
    interrupt: Interrupt,
}

impl Simulation {
    pub fn new(config: SimConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let buffer = Arc::new(BoundedBuffer::new(config.capacity));
        Ok(Self {
            config,
            buffer,
            interrupt: Interrupt::new(),
        })
    }

    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle {
            buffer: Arc::clone(&self.buffer),
            interrupt: self.interrupt.clone(),
        }
    }

    pub fn run(self) -> Result<RunReport, SimError> {
        let abort = self.abort_handle();
        let Simulation {
            config,
            buffer,
            interrupt,
        } = self;

        info!(
            capacity = config.capacity,
            producers = config.producers,
            consumers = config.consumers,
            items = config.items,
            retry = %config.retry,
            "starting run"
        );
        let started = Instant::now();

        let watchdog = match config.deadline_secs {
            Some(secs) => {
                let watchdog = Watchdog::spawn(Duration::from_secs(secs), abort.clone())
                    .map_err(|source| SimError::Spawn {
                        role: Role::Watchdog,
                        id: 0,
                        source,
                    })?;
                Some(watchdog)
            }
            None => None,
        };

        let finished = CompletionFlag::new();
        let mut failure: Option<SimError> = None;

        let mut producer_handles = Vec::with_capacity(config.producers);
        let producer_targets = split_evenly(config.items, config.producers);
        for (index, target) in producer_targets.into_iter().enumerate() {
            let id = index + 1;
            let buffer = Arc::clone(&buffer);
            let interrupt = interrupt.clone();
            let on_panic = AbortOnPanic(abort.clone());
            let policy = config.retry;
            let spawned = spawn_worker(Role::Producer, id, move || -> ProducerRun {
                let _on_panic = on_panic;
                let mut state = Producer::new(id, target);
                let outcome = run_producer(&mut state, &buffer, policy, &interrupt);
                (state, outcome)
            });
            match spawned {
                Ok(handle) => producer_handles.push((id, handle)),
                Err(err) => {
                    failure = Some(err);
                    abort.abort();
                    break;
                }
            }
        }

        let mut consumer_handles = Vec::with_capacity(config.consumers);
        if failure.is_none() {
            let consumer_targets = split_evenly(config.items, config.consumers);
            for (index, target) in consumer_targets.into_iter().enumerate() {
                let id = index + 1;
                let buffer = Arc::clone(&buffer);
                let interrupt = interrupt.clone();
                let finished = finished.clone();
                let on_panic = AbortOnPanic(abort.clone());
                let policy = config.retry;
                let record = config.record_items;
                let spawned = spawn_worker(Role::Consumer, id, move || -> ConsumerRun {
                    let _on_panic = on_panic;
                    let mut state = Consumer::new(id, target);
                    if record {
                        state = state.recording();
                    }
                    let outcome = run_consumer(&mut state, &buffer, &finished, policy, &interrupt);
                    (state, outcome)
                });
                match spawned {
                    Ok(handle) => consumer_handles.push((id, handle)),
                    Err(err) => {
                        failure = Some(err);
                        abort.abort();
                        break;
                    }
                }
            }
        }

        let producer_runs = join_all(Role::Producer, producer_handles, &mut failure);
        info!("all producers joined");

        // Only now is it certain that nothing more will be enqueued.
        finished.set();
        info!("completion signaled to consumers");

        let consumer_runs = join_all(Role::Consumer, consumer_handles, &mut failure);
        info!("all consumers joined");

        if let Some(watchdog) = watchdog {
            watchdog.disarm();
        }

        if let Some(err) = failure {
            return Err(err);
        }

        let aborted = producer_runs.iter().any(|(_, outcome)| outcome.is_err())
            || consumer_runs.iter().any(|(_, outcome)| outcome.is_err());
        let status = if aborted {
            RunStatus::Interrupted
        } else {
            RunStatus::Completed
        };

        let producers = producer_runs
            .iter()
            .map(|(state, _)| ProducerReport::from(state))
            .collect();
        let consumers = consumer_runs
            .into_iter()
            .map(|(state, _)| ConsumerReport::from(state))
            .collect();

        let report = RunReport::new(
            status,
            buffer.capacity(),
            producers,
            consumers,
            buffer.occupancy(),
            started.elapsed(),
        );
        info!(
            status = ?report.status,
            enqueued = report.total_enqueued(),
            dequeued = report.total_dequeued(),
            remaining = report.remaining,
            elapsed_ms = report.elapsed_ms,
            "run finished"
        );
        Ok(report)
    }
}

//! A worker that panics mid-run must not stall the others: the run still
//! shuts down and reports which worker failed.
//!
//! Panics are injected through the log writer, which fails on the first
//! event emitted from a chosen worker thread. The subscriber is global, so
//! these runs live in their own test binary.

use std::io;
use std::sync::{mpsc, Once};
use std::thread;
use std::time::Duration;

use bounded_buffer::{Role, SimConfig, SimError, Simulation};

/// Thread names whose first log event panics. Each run below spawns only
/// one of them.
const FAILING_THREADS: [&str; 2] = ["consumer-2", "producer-3"];

fn install_failing_writer() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_writer(|| {
                let name = thread::current().name().map(str::to_owned);
                if let Some(name) = name.filter(|n| FAILING_THREADS.contains(&n.as_str())) {
                    panic!("{name} failed while logging");
                }
                io::sink()
            })
            .init();
    });
}

fn run_with_timeout(config: SimConfig) -> Result<bounded_buffer::RunReport, SimError> {
    install_failing_writer();
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let outcome = Simulation::new(config).unwrap().run();
        tx.send(outcome).ok();
    });
    rx.recv_timeout(Duration::from_secs(30))
        .expect("run did not shut down after a worker panicked")
}

#[test]
fn panicking_consumer_is_reported_after_shutdown() {
    // Small buffer: without consumer 2 the producer would wait on a full
    // buffer for good.
    let err = run_with_timeout(SimConfig::new(2, 1, 2, 50)).unwrap_err();
    assert!(
        matches!(err, SimError::WorkerPanicked { role: Role::Consumer, id: 2 }),
        "{err}"
    );
}

#[test]
fn panicking_producer_is_reported_after_shutdown() {
    let err = run_with_timeout(SimConfig::new(2, 3, 1, 60)).unwrap_err();
    assert!(
        matches!(err, SimError::WorkerPanicked { role: Role::Producer, id: 3 }),
        "{err}"
    );
}

//! A bounded producer/consumer buffer guarded by a hand-built binary lock.
//!
//! - [`lock`]: the `BinaryLock` (mutex + condvar) and its interrupt token
//! - [`buffer`]: the fixed-capacity FIFO with non-blocking try operations
//! - [`worker`]: producer/consumer state and the loops that drive them
//! - [`coordinator`]: thread startup, the shutdown handshake and joining
//!
//! ```no_run
//! use bounded_buffer::{SimConfig, Simulation};
//!
//! let report = Simulation::new(SimConfig::new(10, 4, 4, 1000))?.run()?;
//! assert!(report.is_conserved());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod buffer;
pub mod config;
pub mod coordinator;
pub mod distribute;
pub mod lock;
pub mod logging;
pub mod report;
pub mod retry;
pub mod worker;

pub use buffer::{BoundedBuffer, Offer};
pub use config::{ConfigError, SimConfig};
pub use coordinator::{AbortHandle, Role, SimError, Simulation};
pub use lock::{BinaryLock, Interrupt, LockError, LockGuard};
pub use report::{ConsumerReport, ProducerReport, RunReport, RunStatus};
pub use retry::RetryPolicy;
pub use worker::{CompletionFlag, Consumer, Item, Producer};

//! What a worker does between a failed attempt and the next one.

use std::fmt;
use std::str::FromStr;
use std::thread;
use std::time::Duration;

use crossbeam::utils::Backoff;
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RetryPolicy {
    /// Try again straight away.
    Immediate,
    /// Give the scheduler a chance to run someone else first.
    Yield,
    /// Spin briefly, then yield, growing the pause on each failure.
    #[default]
    Snooze,
    Sleep { micros: u64 },
    /// Sleep a random time in `0..=max_micros`.
    Jitter { max_micros: u64 },
}

impl RetryPolicy {
    pub fn start(&self) -> Retry {
        Retry {
            policy: *self,
            backoff: Backoff::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RetryPolicy::Immediate => "immediate",
            RetryPolicy::Yield => "yield",
            RetryPolicy::Snooze => "snooze",
            RetryPolicy::Sleep { .. } => "sleep",
            RetryPolicy::Jitter { .. } => "jitter",
        }
    }

    /// Builds a policy from its name, using `micros` for the timed variants.
    pub fn from_name(name: &str, micros: u64) -> Result<Self, UnknownPolicy> {
        match name.to_ascii_lowercase().as_str() {
            "immediate" => Ok(RetryPolicy::Immediate),
            "yield" => Ok(RetryPolicy::Yield),
            "snooze" => Ok(RetryPolicy::Snooze),
            "sleep" => Ok(RetryPolicy::Sleep { micros }),
            "jitter" => Ok(RetryPolicy::Jitter { max_micros: micros }),
            _ => Err(UnknownPolicy(name.to_string())),
        }
    }
}

impl fmt::Display for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryPolicy::Sleep { micros } => write!(f, "sleep({micros}us)"),
            RetryPolicy::Jitter { max_micros } => write!(f, "jitter(<= {max_micros}us)"),
            other => f.write_str(other.name()),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown retry policy '{0}' (expected immediate, yield, snooze, sleep or jitter)")]
pub struct UnknownPolicy(pub String);

impl FromStr for RetryPolicy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s, DEFAULT_MICROS)
    }
}

/// Pause used by `sleep`/`jitter` when none is given.
pub const DEFAULT_MICROS: u64 = 1000;

/// Per-loop retry state. Call [`pause`](Retry::pause) after a failed
/// attempt and [`reset`](Retry::reset) after a successful one.
pub struct Retry {
    policy: RetryPolicy,
    backoff: Backoff,
}

impl Retry {
    pub fn pause(&self) {
        match self.policy {
            RetryPolicy::Immediate => {}
            RetryPolicy::Yield => thread::yield_now(),
            RetryPolicy::Snooze => self.backoff.snooze(),
            RetryPolicy::Sleep { micros } => thread::sleep(Duration::from_micros(micros)),
            RetryPolicy::Jitter { max_micros } => {
                let micros = rand::thread_rng().gen_range(0..=max_micros);
                thread::sleep(Duration::from_micros(micros));
            }
        }
    }

    pub fn reset(&self) {
        self.backoff.reset();
    }
}

impl fmt::Debug for Retry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Retry").field("policy", &self.policy).finish()
    }
}

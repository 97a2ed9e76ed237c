//! Run parameters: defaults, TOML loading and validation.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::retry::RetryPolicy;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("'{field}' must be at least 1")]
    ZeroParameter { field: &'static str },

    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimConfig {
    /// Maximum number of items the buffer holds at once.
    pub capacity: usize,
    pub producers: usize,
    pub consumers: usize,
    /// Total items produced across all producers.
    pub items: usize,
    pub retry: RetryPolicy,
    /// Keep every item each consumer received in the report.
    pub record_items: bool,
    /// Abort the run if it has not finished after this many seconds.
    pub deadline_secs: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            capacity: 20,
            producers: 10,
            consumers: 10,
            items: 1000,
            retry: RetryPolicy::default(),
            record_items: false,
            deadline_secs: None,
        }
    }
}

impl SimConfig {
    pub fn new(capacity: usize, producers: usize, consumers: usize, items: usize) -> Self {
        Self {
            capacity,
            producers,
            consumers,
            items,
            ..Self::default()
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Sets `items` from a per-producer count.
    pub fn with_items_per_producer(mut self, per_producer: usize) -> Self {
        self.items = per_producer.saturating_mul(self.producers);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_recording(mut self, record_items: bool) -> Self {
        self.record_items = record_items;
        self
    }

    pub fn with_deadline_secs(mut self, deadline_secs: Option<u64>) -> Self {
        self.deadline_secs = deadline_secs;
        self
    }

    /// Rejects any of the four run parameters being 0. A zero capacity
    /// with items to move could never finish.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("capacity", self.capacity),
            ("producers", self.producers),
            ("consumers", self.consumers),
            ("items", self.items),
        ];
        match fields.into_iter().find(|(_, value)| *value == 0) {
            Some((field, _)) => Err(ConfigError::ZeroParameter { field }),
            None => Ok(()),
        }
    }
}

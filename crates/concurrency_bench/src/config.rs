//! src/config.rs
//!
//! Configuration for harness behaviour.
//!
//! The `HarnessConfig` struct stores the parameters that control how batches are
//! formed, which scheduling strategy distributes them, and how many times the
//! whole pass is repeated.
//!
//! Example:
//! ```ignore
//! let config = HarnessConfig::builder()
//!     .batch_size(500)
//!     .num_runs(100)
//!     .strategy(Strategy::BoundedQueue)
//!     .queue_capacity(10)
//!     .worker_count(8)
//!     .build();
//! ```
//!
//! # Performance considerations:
//! - `queue_capacity`: bounds batches in flight for the bounded-queue pool; small
//!                     values increase producer blocking
//! - `worker_count`: more workers increase queue contention
//! - `poll_interval`: how long an idle worker waits on the queue before re-checking
//!                    whether the producer has finished

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::thread;
use std::time::Duration;

use crate::error::HarnessError;

/// Which scheduler distributes batches to workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// One producer feeding a fixed-capacity queue drained by a fixed pool.
    BoundedQueue,
    /// One task per batch, joined by a completion barrier.
    FanOut,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::BoundedQueue => "bounded-queue",
            Strategy::FanOut => "fan-out",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bounded-queue" | "queue" | "a" => Ok(Strategy::BoundedQueue),
            "fan-out" | "fanout" | "b" => Ok(Strategy::FanOut),
            other => Err(HarnessError::InvalidConfig(format!(
                "unknown scheduling strategy '{}'",
                other
            ))),
        }
    }
}

/// Configuration for a benchmark harness
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Number of vectors per batch. Trailing vectors that do not fill a batch are skipped.
    pub batch_size: usize,
    /// How many times the full pass is repeated for averaging
    pub num_runs: usize,
    /// Maximum batches waiting in the bounded queue
    pub queue_capacity: usize,
    /// Consumer pool size for the bounded queue (defaults to available parallelism)
    pub worker_count: usize,
    pub strategy: Strategy,
    /// How long an idle consumer waits for a batch before re-checking the
    /// producer-finished flag. Not an error timeout. Default: 100ms.
    pub poll_interval: Duration,
    /// Upper bound on waiting for every worker to drain and exit.
    /// Exceeding it is a fatal scheduler failure. Default: 10 minutes.
    pub termination_timeout: Duration,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            batch_size: 500,
            num_runs: 100,
            queue_capacity: 10,
            worker_count: default_worker_count(),
            strategy: Strategy::BoundedQueue,
            poll_interval: Duration::from_millis(100),
            termination_timeout: Duration::from_secs(600),
        }
    }
}

/// Available hardware parallelism, or 1 if it cannot be queried.
pub fn default_worker_count() -> usize {
    thread::available_parallelism().map_or(1, |n| n.get())
}

impl HarnessConfig {
    pub fn builder() -> HarnessConfigBuilder {
        HarnessConfigBuilder::default()
    }

    /// Rejects values that would make a run meaningless or deadlock.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| -> Result<()> {
            Err(HarnessError::InvalidConfig(msg.to_string()).into())
        };

        if self.batch_size == 0 {
            return invalid("batch_size must be > 0");
        }
        if self.num_runs == 0 {
            return invalid("num_runs must be > 0");
        }
        if self.queue_capacity == 0 {
            return invalid("queue_capacity must be > 0 to prevent deadlocks");
        }
        if self.worker_count == 0 {
            return invalid("worker_count must be > 0");
        }
        if self.poll_interval.is_zero() {
            return invalid("poll_interval must be non-zero");
        }
        if self.termination_timeout < self.poll_interval {
            return invalid("termination_timeout must be at least poll_interval");
        }
        Ok(())
    }
}

/// Builder for HarnessConfig with method chaining
#[derive(Default)]
pub struct HarnessConfigBuilder {
    config: HarnessConfig,
}

impl HarnessConfigBuilder {
    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    pub fn num_runs(mut self, runs: usize) -> Self {
        self.config.num_runs = runs;
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    pub fn worker_count(mut self, workers: usize) -> Self {
        self.config.worker_count = workers;
        self
    }

    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    /// Set the idle worker polling interval
    ///
    /// - Too low: faster shutdown detection, more wakeups.
    /// - Too high: fewer wakeups, slower exit once the queue runs dry.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    pub fn termination_timeout(mut self, timeout: Duration) -> Self {
        self.config.termination_timeout = timeout;
        self
    }

    pub fn build(self) -> HarnessConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = HarnessConfig::default();
        config.validate().unwrap();
        assert_eq!(config.batch_size, 500);
        assert_eq!(config.queue_capacity, 10);
        assert!(config.worker_count >= 1);
    }

    #[test]
    fn test_validate_rejects_zeroes() {
        for config in [
            HarnessConfig::builder().batch_size(0).build(),
            HarnessConfig::builder().num_runs(0).build(),
            HarnessConfig::builder().queue_capacity(0).build(),
            HarnessConfig::builder().worker_count(0).build(),
            HarnessConfig::builder().poll_interval(Duration::ZERO).build(),
        ] {
            let err = config.validate().unwrap_err();
            assert!(matches!(
                err.downcast_ref::<HarnessError>(),
                Some(HarnessError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("fan-out".parse::<Strategy>().unwrap(), Strategy::FanOut);
        assert_eq!("A".parse::<Strategy>().unwrap(), Strategy::BoundedQueue);
        assert!("round-robin".parse::<Strategy>().is_err());
    }
}

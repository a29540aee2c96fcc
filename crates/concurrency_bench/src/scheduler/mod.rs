//! src/scheduler/mod.rs
//!
//! Concurrent distribution of batches to worker threads.
//!
//! A `Scheduler` takes ownership of every batch of a run, has each one
//! transformed in place by exactly one worker, and hands them all back once
//! every worker has finished. Two strategies are provided:
//!
//! ```text
//!   BoundedQueuePool                          FanOutBarrier
//!
//!   [producer] --send (blocks when full)-->   batch 0 --> [task 0] --+
//!        |                                    batch 1 --> [task 1] --+--> CompletionBarrier
//!   ┌──────────────┐                          ...                    |    (count == spawned)
//!   │ bounded FIFO │  capacity Q              batch n --> [task n] --+
//!   └──────┬───────┘
//!          │ recv_timeout(poll_interval)
//!   [worker 0] .. [worker W-1]
//!          │
//!          └──> completion channel --> caller
//! ```
//!
//! # Module Structure
//!
//! ```text
//! src/scheduler/
//! ├── mod.rs       # Scheduler trait, outcome types, strategy selection
//! ├── pool.rs      # BoundedQueuePool (producer + fixed consumer pool)
//! ├── fanout.rs    # FanOutBarrier (one task per batch)
//! ├── barrier.rs   # CompletionBarrier counting latch
//! └── worker.rs    # Thread-local worker ID and per-batch processing
//! ```
//!
//! # Guarantees (both strategies)
//! - Each batch is transformed by exactly one worker; batches never alias.
//! - `run` does not return `Ok` before every batch has been transformed and
//!   every spawned thread has been joined.
//! - A transform error or panic is returned as `HarnessError::TransformFailure`
//!   after the remaining workers finished or were cancelled.
//! - A drain exceeding the termination timeout is
//!   `HarnessError::TerminationTimeout`.

use anyhow::Result;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::batcher::Batch;
use crate::config::{HarnessConfig, Strategy};
use crate::transform::Transform;

mod barrier;
mod fanout;
mod pool;
mod worker;

pub use barrier::{Arrival, CompletionBarrier};
pub use fanout::FanOutBarrier;
pub use pool::BoundedQueuePool;
pub use worker::{current_worker_id, WORKER_ID};

/// A strategy for transforming a run's batches concurrently.
pub trait Scheduler: Send + Sync {
    /// Short strategy name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Transforms every batch with `transform` and blocks until all are done.
    ///
    /// Returned batches may be in any order.
    fn run(&self, batches: Vec<Batch>, transform: Arc<dyn Transform>) -> Result<ScheduleOutcome>;
}

/// The active-processing interval recorded by a scheduler.
///
/// `started` is taken once workers can begin receiving batches, `finished` once
/// the last batch has been handed back. Both lie inside the caller's own
/// timing of the `run` call.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionWindow {
    pub started: Instant,
    pub finished: Instant,
}

impl ExecutionWindow {
    pub fn elapsed(&self) -> Duration {
        self.finished.saturating_duration_since(self.started)
    }
}

/// What a completed `Scheduler::run` hands back.
#[derive(Debug)]
pub struct ScheduleOutcome {
    pub batches: Vec<Batch>,
    pub window: ExecutionWindow,
    /// Deepest the bounded queue got, for strategies that have one.
    pub peak_queue_depth: Option<usize>,
}

/// Builds the scheduler selected by `config.strategy`.
pub fn from_config(config: &HarnessConfig) -> Result<Box<dyn Scheduler>> {
    Ok(match config.strategy {
        Strategy::BoundedQueue => Box::new(BoundedQueuePool::from_config(config)?),
        Strategy::FanOut => Box::new(FanOutBarrier::from_config(config)),
    })
}

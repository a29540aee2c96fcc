//! Fan-out scheduling: one thread per batch, joined by a completion barrier.
//!
//! There is no intermediate queue and no backpressure: every batch is in
//! flight at once. This is only reasonable because batches are fully
//! materialized in memory before the run starts.

use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::barrier::CompletionBarrier;
use super::worker::{panic_message, process_batch, set_worker_id};
use super::{ExecutionWindow, ScheduleOutcome, Scheduler};
use crate::batcher::Batch;
use crate::config::HarnessConfig;
use crate::error::HarnessError;
use crate::transform::Transform;

/// Strategy B: spawn a task per batch and wait on a counting barrier.
#[derive(Debug, Clone)]
pub struct FanOutBarrier {
    termination_timeout: Duration,
}

impl Default for FanOutBarrier {
    fn default() -> Self {
        Self {
            termination_timeout: HarnessConfig::default().termination_timeout,
        }
    }
}

impl FanOutBarrier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &HarnessConfig) -> Self {
        Self::new().with_termination_timeout(config.termination_timeout)
    }

    pub fn with_termination_timeout(mut self, timeout: Duration) -> Self {
        self.termination_timeout = timeout;
        self
    }
}

impl Scheduler for FanOutBarrier {
    fn name(&self) -> &'static str {
        "fan-out"
    }

    fn run(&self, batches: Vec<Batch>, transform: Arc<dyn Transform>) -> Result<ScheduleOutcome> {
        let expected = batches.len();
        let barrier = Arc::new(CompletionBarrier::new());
        let mut handles = Vec::with_capacity(expected);
        let mut spawn_error = None;

        let started = Instant::now();
        for batch in batches {
            let index = batch.index();
            let arrival = barrier.arrival();
            let transform = Arc::clone(&transform);

            let spawned = thread::Builder::new()
                .name(format!("fanout-task-{}", index))
                .spawn(move || {
                    // Dropped last, after the batch result is ready.
                    let _arrival = arrival;
                    set_worker_id(index);
                    process_batch(transform.as_ref(), batch)
                });

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    // The closure (and its arrival guard) was dropped with the error.
                    spawn_error = Some(
                        anyhow::Error::new(err)
                            .context(format!("Failed to spawn fan-out task {}", index)),
                    );
                    break;
                }
            }
        }

        // Failed spawns still arrived through their dropped guards.
        let target = handles.len() + usize::from(spawn_error.is_some());
        if !barrier.wait_for(target, self.termination_timeout) {
            warn!(
                arrived = barrier.count(),
                expected = target,
                timeout = ?self.termination_timeout,
                "Fan-out tasks failed to complete; abandoning hung threads"
            );
            return Err(HarnessError::TerminationTimeout {
                strategy: self.name(),
                waited: self.termination_timeout,
            }
            .into());
        }
        let finished = Instant::now();

        let mut completed = Vec::with_capacity(handles.len());
        let mut failure: Option<HarnessError> = None;
        for handle in handles {
            let task = handle.thread().name().unwrap_or("fanout-task").to_string();
            match handle.join() {
                Ok(Ok(batch)) => completed.push(batch),
                Ok(Err(err)) => {
                    failure.get_or_insert(err);
                }
                Err(payload) => {
                    failure.get_or_insert(HarnessError::TransformFailure {
                        batch: usize::MAX,
                        worker: task,
                        source: anyhow!("task panicked: {}", panic_message(payload.as_ref())),
                    });
                }
            }
        }
        debug!(tasks = completed.len(), "Fan-out tasks joined");

        if let Some(err) = spawn_error {
            return Err(err);
        }
        if let Some(err) = failure {
            return Err(err.into());
        }
        if completed.len() != expected {
            return Err(HarnessError::IncompleteDrain {
                expected,
                received: completed.len(),
            })
            .context("Fan-out barrier released with missing batches");
        }

        Ok(ScheduleOutcome {
            batches: completed,
            window: ExecutionWindow { started, finished },
            peak_queue_depth: None,
        })
    }
}

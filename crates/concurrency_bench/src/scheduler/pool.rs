//! Bounded-queue scheduling: one producer, a fixed consumer pool.
//!
//! The producer enqueues every batch in order onto a bounded crossbeam channel
//! and blocks while it is full, so at most `queue_capacity` batches wait in the
//! queue at any instant. Consumers poll the queue with a bounded wait and exit
//! once the producer has finished *and* the queue is empty.
//!
//! # Channels
//! - Task channel (bounded): producer -> workers
//! - Completion channel (unbounded): workers -> caller, carries each processed
//!   batch or the failure that replaced it
//! - `producing_finished` / `cancelled` flags: shutdown signalling

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{
    bounded, unbounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::worker::{panic_message, process_batch, set_worker_id};
use super::{ExecutionWindow, ScheduleOutcome, Scheduler};
use crate::batcher::Batch;
use crate::config::HarnessConfig;
use crate::error::HarnessError;
use crate::transform::Transform;

type Completion = Result<Batch, HarnessError>;

/// Flags and counters shared by the producer, every consumer and the caller.
#[derive(Debug, Default)]
struct PoolState {
    /// Set by the producer after its last send (or when it gives up).
    producing_finished: AtomicBool,
    /// Set by the caller when the run is failing; everyone stops early.
    cancelled: AtomicBool,
    peak_depth: AtomicUsize,
}

impl PoolState {
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    fn record_depth(&self, depth: usize) {
        self.peak_depth.fetch_max(depth, Ordering::Relaxed);
    }
}

/// Strategy A: bounded FIFO queue drained by a fixed pool of workers.
#[derive(Debug, Clone)]
pub struct BoundedQueuePool {
    queue_capacity: usize,
    worker_count: usize,
    poll_interval: Duration,
    termination_timeout: Duration,
}

impl BoundedQueuePool {
    /// Creates a pool with default poll interval and termination timeout.
    pub fn new(queue_capacity: usize, worker_count: usize) -> Result<Self> {
        if worker_count == 0 {
            return Err(HarnessError::InvalidConfig(
                "Cannot create BoundedQueuePool with 0 workers".into(),
            )
            .into());
        }
        if queue_capacity == 0 {
            return Err(HarnessError::InvalidConfig(
                "Cannot create BoundedQueuePool with queue_capacity 0. \
                Capacity must be > 0 to prevent deadlocks."
                    .into(),
            )
            .into());
        }

        let defaults = HarnessConfig::default();
        Ok(Self {
            queue_capacity,
            worker_count,
            poll_interval: defaults.poll_interval,
            termination_timeout: defaults.termination_timeout,
        })
    }

    pub fn from_config(config: &HarnessConfig) -> Result<Self> {
        Ok(Self::new(config.queue_capacity, config.worker_count)?
            .with_poll_interval(config.poll_interval)
            .with_termination_timeout(config.termination_timeout))
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_termination_timeout(mut self, timeout: Duration) -> Self {
        self.termination_timeout = timeout;
        self
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    fn spawn_workers(
        &self,
        task_rx: &Receiver<Batch>,
        done_tx: &Sender<Completion>,
        state: &Arc<PoolState>,
        transform: &Arc<dyn Transform>,
    ) -> Result<Vec<thread::JoinHandle<()>>> {
        let mut workers = Vec::with_capacity(self.worker_count);

        for worker_id in 0..self.worker_count {
            let task_rx = task_rx.clone();
            let done_tx = done_tx.clone();
            let worker_state = Arc::clone(state);
            let transform = Arc::clone(transform);
            let poll_interval = self.poll_interval;

            let spawned = thread::Builder::new()
                .name(format!("queue-worker-{}", worker_id))
                .spawn(move || {
                    set_worker_id(worker_id);
                    consume(
                        &task_rx,
                        &done_tx,
                        &worker_state,
                        transform.as_ref(),
                        poll_interval,
                    );
                });

            match spawned {
                Ok(handle) => workers.push(handle),
                Err(err) => {
                    // Already-running workers see the flags and exit on their next poll.
                    state.producing_finished.store(true, Ordering::Release);
                    state.cancel();
                    join_all(workers);
                    return Err(err)
                        .with_context(|| format!("Failed to spawn worker thread {}", worker_id));
                }
            }
        }

        Ok(workers)
    }
}

impl Scheduler for BoundedQueuePool {
    fn name(&self) -> &'static str {
        "bounded-queue"
    }

    fn run(&self, batches: Vec<Batch>, transform: Arc<dyn Transform>) -> Result<ScheduleOutcome> {
        let expected = batches.len();
        let (task_tx, task_rx) = bounded::<Batch>(self.queue_capacity);
        let (done_tx, done_rx) = unbounded::<Completion>();
        let state = Arc::new(PoolState::default());

        let workers = self.spawn_workers(&task_rx, &done_tx, &state, &transform)?;
        // Only workers may hold these ends, so channel disconnection tracks
        // producer and worker exit.
        drop(task_rx);
        drop(done_tx);

        let started = Instant::now();
        let producer = {
            let state = Arc::clone(&state);
            let poll_interval = self.poll_interval;
            thread::Builder::new()
                .name("queue-producer".to_string())
                .spawn(move || produce(batches, task_tx, &state, poll_interval))
        };
        let producer = match producer {
            Ok(handle) => handle,
            Err(err) => {
                state.producing_finished.store(true, Ordering::Release);
                state.cancel();
                join_all(workers);
                return Err(err).context("Failed to spawn producer thread");
            }
        };

        let deadline = Instant::now() + self.termination_timeout;
        let mut completed = Vec::with_capacity(expected);
        let mut finished = None;
        let mut failure: Option<HarnessError> = None;

        loop {
            match done_rx.recv_deadline(deadline) {
                Ok(Ok(batch)) => {
                    completed.push(batch);
                    if completed.len() == expected {
                        finished = Some(Instant::now());
                    }
                }
                Ok(Err(err)) => {
                    if failure.is_none() {
                        warn!(error = %err, "Cancelling bounded-queue run after worker failure");
                        state.cancel();
                        failure = Some(err);
                    }
                }
                // Every worker has exited.
                Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {
                    state.cancel();
                    warn!(
                        received = completed.len(),
                        expected,
                        timeout = ?self.termination_timeout,
                        "Worker pool failed to drain; abandoning hung threads"
                    );
                    return Err(HarnessError::TerminationTimeout {
                        strategy: self.name(),
                        waited: self.termination_timeout,
                    }
                    .into());
                }
            }
        }
        let finished = finished.unwrap_or_else(Instant::now);

        if producer.join().is_err() {
            return Err(anyhow!("Producer thread panicked"));
        }
        for (worker_id, worker) in workers.into_iter().enumerate() {
            if let Err(payload) = worker.join() {
                failure.get_or_insert(HarnessError::TransformFailure {
                    batch: usize::MAX,
                    worker: format!("queue-worker-{}", worker_id),
                    source: anyhow!("worker panicked: {}", panic_message(payload.as_ref())),
                });
            }
        }

        if let Some(err) = failure {
            return Err(err.into());
        }
        if completed.len() != expected {
            return Err(HarnessError::IncompleteDrain {
                expected,
                received: completed.len(),
            }
            .into());
        }

        Ok(ScheduleOutcome {
            batches: completed,
            window: ExecutionWindow { started, finished },
            peak_queue_depth: Some(state.peak_depth.load(Ordering::Relaxed)),
        })
    }
}

/// Enqueues every batch in order, blocking while the queue is full.
fn produce(batches: Vec<Batch>, task_tx: Sender<Batch>, state: &PoolState, poll_interval: Duration) {
    'batches: for batch in batches {
        let mut pending = batch;
        loop {
            if state.is_cancelled() {
                break 'batches;
            }
            match task_tx.send_timeout(pending, poll_interval) {
                Ok(()) => {
                    state.record_depth(task_tx.len());
                    break;
                }
                Err(SendTimeoutError::Timeout(batch)) => pending = batch,
                Err(SendTimeoutError::Disconnected(_)) => break 'batches,
            }
        }
    }

    state.producing_finished.store(true, Ordering::Release);
    debug!("Producer finished");
}

/// Consumer loop: poll, transform, hand back; exit once production is over
/// and the queue is empty.
fn consume(
    task_rx: &Receiver<Batch>,
    done_tx: &Sender<Completion>,
    state: &PoolState,
    transform: &dyn Transform,
    poll_interval: Duration,
) {
    let mut processed = 0usize;

    while !state.is_cancelled() {
        match task_rx.recv_timeout(poll_interval) {
            Ok(batch) => {
                let result = process_batch(transform, batch);
                let failed = result.is_err();
                if done_tx.send(result).is_err() || failed {
                    break;
                }
                processed += 1;
            }
            Err(RecvTimeoutError::Timeout) => {
                if state.producing_finished.load(Ordering::Acquire) && task_rx.is_empty() {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    debug!(
        worker = super::current_worker_id(),
        processed, "Queue worker exiting"
    );
}

fn join_all(handles: Vec<thread::JoinHandle<()>>) {
    for handle in handles {
        let _ = handle.join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batcher::Batcher;
    use crate::dataset::{Dataset, VectorShape};
    use crate::transform::Scale;

    #[test]
    fn test_rejects_zero_sizes() {
        assert!(BoundedQueuePool::new(0, 1).is_err());
        assert!(BoundedQueuePool::new(1, 0).is_err());
    }

    #[test]
    fn test_empty_run_terminates() {
        let pool = BoundedQueuePool::new(2, 3)
            .unwrap()
            .with_poll_interval(Duration::from_millis(5));
        let outcome = pool.run(Vec::new(), Arc::new(Scale::doubling())).unwrap();
        assert!(outcome.batches.is_empty());
        assert_eq!(outcome.peak_queue_depth, Some(0));
    }

    #[test]
    fn test_more_workers_than_batches() {
        let mut partition = Batcher::new(2)
            .unwrap()
            .split(Dataset::filled(6, VectorShape::flat(3), 1.0));
        let pool = BoundedQueuePool::new(1, 8)
            .unwrap()
            .with_poll_interval(Duration::from_millis(5));

        let outcome = pool
            .run(partition.take_batches(), Arc::new(Scale::doubling()))
            .unwrap();
        assert_eq!(outcome.batches.len(), 3);
        assert!(outcome.window.finished >= outcome.window.started);
    }
}

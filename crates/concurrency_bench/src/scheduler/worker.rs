//! Thread-local worker identification and the per-batch work unit shared by
//! both scheduling strategies.

use anyhow::anyhow;
use std::any::Any;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::thread;

use crate::batcher::Batch;
use crate::error::HarnessError;
use crate::transform::{apply_batch, Transform};

thread_local! {
    /// Thread-local worker ID.
    ///
    /// Pool workers get `0..worker_count`; fan-out tasks get the index of the
    /// batch they own. Used in logs and failure reports.
    pub static WORKER_ID: RefCell<usize> = const { RefCell::new(0) };
}

/// Worker ID of the calling thread (0 outside a worker).
pub fn current_worker_id() -> usize {
    WORKER_ID.with(|id| *id.borrow())
}

pub(crate) fn set_worker_id(worker_id: usize) {
    WORKER_ID.with(|id| *id.borrow_mut() = worker_id);
}

fn worker_name() -> String {
    thread::current()
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("worker-{}", current_worker_id()))
}

/// Transforms every vector of `batch` and gives it back.
///
/// A transform error or a panic inside the transform is turned into
/// `TransformFailure`, so the caller sees it instead of a silently lost batch.
pub(crate) fn process_batch(
    transform: &dyn Transform,
    mut batch: Batch,
) -> Result<Batch, HarnessError> {
    let index = batch.index();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| apply_batch(transform, &mut batch)));

    let source = match outcome {
        Ok(Ok(())) => return Ok(batch),
        Ok(Err(err)) => err,
        Err(payload) => anyhow!("worker panicked: {}", panic_message(payload.as_ref())),
    };

    Err(HarnessError::TransformFailure {
        batch: index,
        worker: worker_name(),
        source,
    })
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

/// Counting completion latch.
///
/// Tasks arrive once each; a waiter blocks until a target number of arrivals
/// has been reached or a timeout expires. Unlike `std::sync::Barrier` the
/// arriving tasks never block.
#[derive(Debug, Default)]
pub struct CompletionBarrier {
    arrived: Mutex<usize>,
    all_arrived: Condvar,
}

impl CompletionBarrier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one completion and wakes waiters.
    pub fn arrive(&self) {
        let mut arrived = self.arrived.lock().unwrap_or_else(PoisonError::into_inner);
        *arrived += 1;
        self.all_arrived.notify_all();
    }

    /// Returns a guard that arrives when dropped, including during unwinding.
    pub fn arrival(self: &Arc<Self>) -> Arrival {
        Arrival {
            barrier: Arc::clone(self),
        }
    }

    pub fn count(&self) -> usize {
        *self.arrived.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks until at least `target` arrivals. Returns `false` on timeout.
    pub fn wait_for(&self, target: usize, timeout: Duration) -> bool {
        let arrived = self.arrived.lock().unwrap_or_else(PoisonError::into_inner);
        let (arrived, _) = self
            .all_arrived
            .wait_timeout_while(arrived, timeout, |n| *n < target)
            .unwrap_or_else(PoisonError::into_inner);
        *arrived >= target
    }
}

/// Drop guard returned by [`CompletionBarrier::arrival`].
#[derive(Debug)]
pub struct Arrival {
    barrier: Arc<CompletionBarrier>,
}

impl Drop for Arrival {
    fn drop(&mut self) {
        self.barrier.arrive();
    }
}

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use concurrency_bench::{
    BoundedQueuePool, FanOutBarrier, HarnessError, ResourceProbe, Scheduler, Transform,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Probe with fixed readings, so harness tests do not depend on the host.
pub struct FixedProbe {
    pub memory: u64,
    pub cpu: f64,
}

impl Default for FixedProbe {
    fn default() -> Self {
        Self {
            memory: 64 * 1024 * 1024,
            cpu: 50.0,
        }
    }
}

impl ResourceProbe for FixedProbe {
    fn sample_memory(&mut self) -> Result<u64> {
        Ok(self.memory)
    }

    fn start_cpu_window(&mut self) -> Result<()> {
        Ok(())
    }

    fn sample_cpu(&mut self) -> Result<f64> {
        Ok(self.cpu)
    }
}

/// Probe whose CPU counters are unavailable.
pub struct BrokenCpuProbe;

impl ResourceProbe for BrokenCpuProbe {
    fn sample_memory(&mut self) -> Result<u64> {
        Ok(0)
    }

    fn start_cpu_window(&mut self) -> Result<()> {
        Err(HarnessError::Probe("cpu counters unavailable".into()).into())
    }

    fn sample_cpu(&mut self) -> Result<f64> {
        Err(HarnessError::Probe("cpu counters unavailable".into()).into())
    }
}

/// Doubles, then sleeps, once per vector.
#[derive(Clone)]
pub struct SlowDoubling {
    pub delay: Duration,
}

impl Transform for SlowDoubling {
    fn apply(&self, vector: &mut [f32]) -> Result<()> {
        std::thread::sleep(self.delay);
        vector.iter_mut().for_each(|x| *x *= 2.0);
        Ok(())
    }
}

/// Doubles and counts how many vectors it touched.
#[derive(Clone, Default)]
pub struct CountingDoubling {
    pub calls: Arc<AtomicUsize>,
}

impl Transform for CountingDoubling {
    fn apply(&self, vector: &mut [f32]) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        vector.iter_mut().for_each(|x| *x *= 2.0);
        Ok(())
    }
}

/// Fails on any vector whose first element equals `poison`.
pub struct FailOnValue {
    pub poison: f32,
}

impl Transform for FailOnValue {
    fn apply(&self, vector: &mut [f32]) -> Result<()> {
        if vector.first() == Some(&self.poison) {
            return Err(anyhow!("poisoned vector"));
        }
        vector.iter_mut().for_each(|x| *x *= 2.0);
        Ok(())
    }
}

/// Panics on any vector whose first element equals `poison`.
pub struct PanicOnValue {
    pub poison: f32,
}

impl Transform for PanicOnValue {
    fn apply(&self, vector: &mut [f32]) -> Result<()> {
        if vector.first() == Some(&self.poison) {
            panic!("transform blew up");
        }
        vector.iter_mut().for_each(|x| *x *= 2.0);
        Ok(())
    }
}

/// Blocks far longer than any test termination timeout.
pub struct Hang;

impl Transform for Hang {
    fn apply(&self, _vector: &mut [f32]) -> Result<()> {
        std::thread::sleep(Duration::from_secs(3));
        Ok(())
    }
}

/// Both strategies with short polling, for tests that run against each.
pub fn all_schedulers(queue_capacity: usize, workers: usize) -> Vec<Box<dyn Scheduler>> {
    vec![
        Box::new(
            BoundedQueuePool::new(queue_capacity, workers)
                .unwrap()
                .with_poll_interval(Duration::from_millis(10)),
        ),
        Box::new(FanOutBarrier::new()),
    ]
}

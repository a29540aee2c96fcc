use anyhow::{Context, Result};
use std::time::Instant;

use super::{AggregateMetrics, ResourceProbe, RunMetrics};
use crate::scheduler::ScheduleOutcome;

/// Times scheduler runs and accumulates their metrics.
///
/// `measure` brackets exactly one run:
///
/// ```text
/// mem_before  cpu_start  t0 ─┬─ spawn ─ [window.started … window.finished] ─ join ─┬─ t1  cpu  mem_after
///                            └──────────────── concurrency_overhead ──────────────┘
/// ```
///
/// Memory and CPU samples sit just outside `[t0, t1]` so that probe cost never
/// lands inside either timed interval.
pub struct MetricsCollector<P> {
    probe: P,
    runs: Vec<RunMetrics>,
}

impl<P: ResourceProbe> MetricsCollector<P> {
    pub fn new(probe: P) -> Self {
        Self {
            probe,
            runs: Vec::new(),
        }
    }

    /// Runs `run` once and measures it. Does not record the result; call
    /// `record` once the run has been confirmed complete.
    pub fn measure<F>(&mut self, run: F) -> Result<(ScheduleOutcome, RunMetrics)>
    where
        F: FnOnce() -> Result<ScheduleOutcome>,
    {
        let memory_before = self
            .probe
            .sample_memory()
            .context("Failed to sample memory before run")?;
        self.probe
            .start_cpu_window()
            .context("Failed to start CPU sampling window")?;

        let t0 = Instant::now();
        let outcome = run()?;
        let t1 = Instant::now();

        let cpu_percent = self
            .probe
            .sample_cpu()
            .context("Failed to sample CPU utilization")?;
        let memory_after = self
            .probe
            .sample_memory()
            .context("Failed to sample memory after run")?;

        // Keep the scheduler's window inside [t0, t1] regardless of what it reported.
        let started = outcome.window.started.clamp(t0, t1);
        let finished = outcome.window.finished.clamp(started, t1);

        let metrics = RunMetrics {
            execution_time: finished - started,
            concurrency_overhead: t1 - t0,
            memory_delta: memory_after as i64 - memory_before as i64,
            cpu_percent,
        };
        Ok((outcome, metrics))
    }

    pub fn record(&mut self, metrics: RunMetrics) {
        self.runs.push(metrics);
    }

    pub fn runs(&self) -> &[RunMetrics] {
        &self.runs
    }

    pub fn aggregate(&self) -> Option<AggregateMetrics> {
        AggregateMetrics::from_runs(&self.runs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HarnessError;
    use crate::scheduler::ExecutionWindow;
    use anyhow::anyhow;
    use std::thread;
    use std::time::Duration;

    struct ScriptedProbe {
        memory: Vec<u64>,
        fail_cpu: bool,
    }

    impl ResourceProbe for ScriptedProbe {
        fn sample_memory(&mut self) -> Result<u64> {
            Ok(self.memory.remove(0))
        }

        fn start_cpu_window(&mut self) -> Result<()> {
            Ok(())
        }

        fn sample_cpu(&mut self) -> Result<f64> {
            if self.fail_cpu {
                return Err(HarnessError::Probe("no cpu counters".into()).into());
            }
            Ok(12.5)
        }
    }

    fn sleeping_run(before: Duration, inside: Duration, after: Duration) -> Result<ScheduleOutcome> {
        thread::sleep(before);
        let started = Instant::now();
        thread::sleep(inside);
        let finished = Instant::now();
        thread::sleep(after);
        Ok(ScheduleOutcome {
            batches: Vec::new(),
            window: ExecutionWindow { started, finished },
            peak_queue_depth: None,
        })
    }

    #[test]
    fn test_overhead_contains_execution() {
        let mut collector = MetricsCollector::new(ScriptedProbe {
            memory: vec![1000, 400],
            fail_cpu: false,
        });
        let (_, metrics) = collector
            .measure(|| {
                sleeping_run(
                    Duration::from_millis(10),
                    Duration::from_millis(30),
                    Duration::from_millis(10),
                )
            })
            .unwrap();

        assert!(metrics.execution_time >= Duration::from_millis(30));
        assert!(metrics.concurrency_overhead >= metrics.execution_time + Duration::from_millis(20));
        assert_eq!(metrics.memory_delta, -600);
        assert_eq!(metrics.cpu_percent, 12.5);
        assert!(collector.runs().is_empty());
    }

    #[test]
    fn test_window_outside_bracket_is_clamped() {
        let mut collector = MetricsCollector::new(ScriptedProbe {
            memory: vec![0, 0],
            fail_cpu: false,
        });
        let early = Instant::now();
        thread::sleep(Duration::from_millis(5));
        let (_, metrics) = collector
            .measure(|| {
                Ok(ScheduleOutcome {
                    batches: Vec::new(),
                    window: ExecutionWindow {
                        started: early,
                        finished: Instant::now() + Duration::from_secs(60),
                    },
                    peak_queue_depth: None,
                })
            })
            .unwrap();

        assert!(metrics.concurrency_overhead >= metrics.execution_time);
    }

    #[test]
    fn test_cpu_probe_failure_is_fatal() {
        let mut collector = MetricsCollector::new(ScriptedProbe {
            memory: vec![0, 0],
            fail_cpu: true,
        });
        let err = collector
            .measure(|| sleeping_run(Duration::ZERO, Duration::ZERO, Duration::ZERO))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HarnessError>(),
            Some(HarnessError::Probe(_))
        ));
    }

    #[test]
    fn test_run_error_propagates() {
        let mut collector = MetricsCollector::new(ScriptedProbe {
            memory: vec![0, 0],
            fail_cpu: false,
        });
        let result = collector.measure(|| Err(anyhow!("scheduler exploded")));
        assert!(result.is_err());
    }

    #[test]
    fn test_aggregate_after_records() {
        let mut collector = MetricsCollector::new(ScriptedProbe {
            memory: vec![0; 6],
            fail_cpu: false,
        });
        for _ in 0..3 {
            let (_, metrics) = collector
                .measure(|| sleeping_run(Duration::ZERO, Duration::from_millis(2), Duration::ZERO))
                .unwrap();
            collector.record(metrics);
        }
        let agg = collector.aggregate().unwrap();
        assert_eq!(agg.runs, 3);
        assert!(agg.concurrency_overhead >= agg.execution_time);
    }
}

//! Per-run measurements and their averages.

use serde::{Deserialize, Serialize};
use std::time::Duration;

mod collector;
mod probe;

pub use collector::MetricsCollector;
pub use probe::{ResourceProbe, SystemProbe};

/// Measurements of one scheduler run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    /// Active-processing window reported by the scheduler.
    #[serde(with = "duration_secs")]
    pub execution_time: Duration,
    /// From before any worker or producer was launched until the run call
    /// returned with every thread joined. Never shorter than `execution_time`.
    #[serde(with = "duration_secs")]
    pub concurrency_overhead: Duration,
    /// Memory after minus memory before, in bytes. May be negative.
    pub memory_delta: i64,
    pub cpu_percent: f64,
}

/// Arithmetic means of every `RunMetrics` field over all recorded runs, plus
/// the spread of execution times.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateMetrics {
    pub runs: usize,
    #[serde(with = "duration_secs")]
    pub execution_time: Duration,
    #[serde(with = "duration_secs")]
    pub concurrency_overhead: Duration,
    /// Mean memory delta in bytes.
    pub memory_delta: f64,
    pub cpu_percent: f64,
    #[serde(with = "duration_secs")]
    pub min_execution_time: Duration,
    #[serde(with = "duration_secs")]
    pub max_execution_time: Duration,
    #[serde(with = "duration_secs")]
    pub std_execution_time: Duration,
}

impl AggregateMetrics {
    /// Averages `runs`; `None` when there is nothing to average.
    pub fn from_runs(runs: &[RunMetrics]) -> Option<Self> {
        if runs.is_empty() {
            return None;
        }
        let n = runs.len() as f64;
        let count = runs.len() as u32;

        let exec_secs: Vec<f64> = runs.iter().map(|r| r.execution_time.as_secs_f64()).collect();
        let mean_exec = exec_secs.iter().sum::<f64>() / n;
        let variance = exec_secs.iter().map(|t| (t - mean_exec).powi(2)).sum::<f64>() / n;

        let total_overhead: Duration = runs.iter().map(|r| r.concurrency_overhead).sum();
        let total_execution: Duration = runs.iter().map(|r| r.execution_time).sum();

        Some(Self {
            runs: runs.len(),
            execution_time: total_execution / count,
            concurrency_overhead: total_overhead / count,
            memory_delta: runs.iter().map(|r| r.memory_delta as f64).sum::<f64>() / n,
            cpu_percent: runs.iter().map(|r| r.cpu_percent).sum::<f64>() / n,
            min_execution_time: runs.iter().map(|r| r.execution_time).min()?,
            max_execution_time: runs.iter().map(|r| r.execution_time).max()?,
            std_execution_time: Duration::from_secs_f64(variance.sqrt()),
        })
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(exec_ms: u64, overhead_ms: u64, memory: i64, cpu: f64) -> RunMetrics {
        RunMetrics {
            execution_time: Duration::from_millis(exec_ms),
            concurrency_overhead: Duration::from_millis(overhead_ms),
            memory_delta: memory,
            cpu_percent: cpu,
        }
    }

    #[test]
    fn test_aggregate_means() {
        let runs = [
            run(100, 120, 1024, 40.0),
            run(200, 210, -512, 60.0),
            run(300, 330, 2048, 80.0),
        ];
        let agg = AggregateMetrics::from_runs(&runs).unwrap();

        assert_eq!(agg.runs, 3);
        assert_eq!(agg.execution_time, Duration::from_millis(200));
        assert_eq!(agg.concurrency_overhead, Duration::from_millis(220));
        assert!((agg.memory_delta - 853.333).abs() < 0.01);
        assert!((agg.cpu_percent - 60.0).abs() < 1e-9);
        assert_eq!(agg.min_execution_time, Duration::from_millis(100));
        assert_eq!(agg.max_execution_time, Duration::from_millis(300));
        assert!((agg.std_execution_time.as_secs_f64() - 0.0816).abs() < 1e-3);
    }

    #[test]
    fn test_aggregate_empty() {
        assert!(AggregateMetrics::from_runs(&[]).is_none());
    }

    #[test]
    fn test_summary_json_uses_seconds() {
        let agg = AggregateMetrics::from_runs(&[run(1500, 2000, 0, 10.0)]).unwrap();
        let json = serde_json::to_value(&agg).unwrap();
        assert_eq!(json["execution_time"], 1.5);
        assert_eq!(json["concurrency_overhead"], 2.0);

        let back: AggregateMetrics = serde_json::from_value(json).unwrap();
        assert_eq!(back.execution_time, agg.execution_time);
    }
}

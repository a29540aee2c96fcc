//! Human-readable metric logging.
//!
//! Every message is appended as one line to a plain-text log file (never
//! truncated) and echoed through `tracing`. The line formats below are for
//! reading, not for parsing back.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::HarnessConfig;
use crate::dataset::Dataset;
use crate::metrics::{AggregateMetrics, RunMetrics};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Sink for harness log lines.
pub trait Reporter {
    fn append(&mut self, message: &str) -> Result<()>;
}

/// Appends each message to a file, creating it if needed.
#[derive(Debug, Clone)]
pub struct LogFileReporter {
    path: PathBuf,
}

impl LogFileReporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Reporter for LogFileReporter {
    fn append(&mut self, message: &str) -> Result<()> {
        append_line(&self.path, message)?;
        info!(target: "concurrency_bench::report", "{}", message);
        Ok(())
    }
}

/// Appends `message` plus a newline to `path`.
pub fn append_line(path: &Path, message: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;
    writeln!(file, "{}", message)
        .with_context(|| format!("Failed to append to log file {}", path.display()))
}

/// Keeps lines in memory. Handy in tests and for callers that post-process.
#[derive(Debug, Default, Clone)]
pub struct MemoryReporter {
    pub lines: Vec<String>,
}

impl Reporter for MemoryReporter {
    fn append(&mut self, message: &str) -> Result<()> {
        self.lines.push(message.to_string());
        Ok(())
    }
}

/// Dataset and configuration banner written before the first run.
pub fn dataset_banner(dataset: &Dataset, config: &HarnessConfig) -> Vec<String> {
    let mut lines = vec![
        "Dataset Parameters:".to_string(),
        format!("Total Vectors: {}", dataset.len()),
        format!(
            "Vector Shape: {} (Height x Width x Channels)",
            dataset.shape()
        ),
        format!("Number of Classes: {}", dataset.num_classes()),
        format!("Scheduling Strategy: {}", config.strategy),
        format!("Batch Size: {}", config.batch_size),
        format!("Runs: {}", config.num_runs),
    ];
    if config.strategy == crate::config::Strategy::BoundedQueue {
        lines.push(format!(
            "Queue Capacity: {}, Workers: {}",
            config.queue_capacity, config.worker_count
        ));
    }
    lines
}

/// The block logged after a successful run (1-based `run`).
pub fn run_lines(run: usize, metrics: &RunMetrics) -> Vec<String> {
    vec![
        format!(
            "Execution Time for Run {}: {:.4} seconds",
            run,
            metrics.execution_time.as_secs_f64()
        ),
        format!(
            "Concurrency Overhead for Run {}: {:.4} seconds",
            run,
            metrics.concurrency_overhead.as_secs_f64()
        ),
        format!(
            "Memory Usage for Run {}: {:.2} MB",
            run,
            metrics.memory_delta as f64 / BYTES_PER_MB
        ),
        format!("CPU Utilization for Run {}: {:.2}%", run, metrics.cpu_percent),
    ]
}

/// The final averaged block.
pub fn average_lines(aggregate: &AggregateMetrics) -> Vec<String> {
    vec![
        String::new(),
        "Average Metrics Across Runs:".to_string(),
        format!(
            "Average Execution Time: {:.4} seconds (min {:.4}, max {:.4}, std {:.4})",
            aggregate.execution_time.as_secs_f64(),
            aggregate.min_execution_time.as_secs_f64(),
            aggregate.max_execution_time.as_secs_f64(),
            aggregate.std_execution_time.as_secs_f64()
        ),
        format!(
            "Average Concurrency Overhead: {:.4} seconds",
            aggregate.concurrency_overhead.as_secs_f64()
        ),
        format!(
            "Average Memory Usage: {:.2} MB",
            aggregate.memory_delta / BYTES_PER_MB
        ),
        format!("Average CPU Utilization: {:.2}%", aggregate.cpu_percent),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn test_log_file_appends_without_truncating() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("metrics.log");
        fs::write(&path, "existing line\n").unwrap();

        let mut reporter = LogFileReporter::new(&path);
        reporter.append("first").unwrap();
        reporter.append("second").unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "existing line\nfirst\nsecond\n");
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let dir = tempdir().unwrap();
        let mut reporter = LogFileReporter::new(dir.path().join("nope").join("metrics.log"));
        assert!(reporter.append("line").is_err());
    }

    #[test]
    fn test_run_lines_format() {
        let metrics = RunMetrics {
            execution_time: Duration::from_millis(1250),
            concurrency_overhead: Duration::from_millis(1500),
            memory_delta: -(2 * 1024 * 1024),
            cpu_percent: 87.5,
        };
        let lines = run_lines(3, &metrics);
        assert_eq!(lines[0], "Execution Time for Run 3: 1.2500 seconds");
        assert_eq!(lines[1], "Concurrency Overhead for Run 3: 1.5000 seconds");
        assert_eq!(lines[2], "Memory Usage for Run 3: -2.00 MB");
        assert_eq!(lines[3], "CPU Utilization for Run 3: 87.50%");
    }
}

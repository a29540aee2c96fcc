//! src/main.rs
//!
//! Command-line entry point.
//!
//! ```text
//! concurrency_bench --source cifar10 --data-dir ./cifar-10-batches-bin --strategy bounded-queue
//! concurrency_bench --source tiny-imagenet --data-dir ./tiny-imagenet-200/train --strategy fan-out
//! concurrency_bench --source synthetic --synthetic-count 5000 --runs 3
//! ```
//!
//! Set `RUST_LOG=debug` to see per-worker lifecycle events.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use concurrency_bench::config::default_worker_count;
use concurrency_bench::loaders::{load_cifar10, load_image_folder, CIFAR10_SHAPE, TINY_IMAGENET_SHAPE};
use concurrency_bench::report::{append_line, LogFileReporter};
use concurrency_bench::{Dataset, Harness, HarnessConfig, Strategy, SystemProbe};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Source {
    /// CIFAR-10 binary batches (`data_batch_{1..5}.bin`)
    Cifar10,
    /// Directory-per-class image tree of 64x64 RGB images
    TinyImagenet,
    /// Seeded random 32x32x3 vectors, no files needed
    Synthetic,
}

/// Compare a bounded-queue worker pool against a fan-out barrier on an
/// in-memory batch transform.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    #[arg(long, value_enum, default_value = "synthetic")]
    source: Source,

    /// Dataset directory (required for cifar10 and tiny-imagenet)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Number of vectors for the synthetic source
    #[arg(long, default_value_t = 50_000)]
    synthetic_count: usize,

    /// bounded-queue (alias: queue, a) or fan-out (alias: fanout, b)
    #[arg(long, default_value = "bounded-queue")]
    strategy: Strategy,

    #[arg(long, default_value_t = 500)]
    batch_size: usize,

    #[arg(long, default_value_t = 100)]
    runs: usize,

    #[arg(long, default_value_t = 10)]
    queue_capacity: usize,

    /// Consumer pool size (defaults to available parallelism)
    #[arg(long)]
    workers: Option<usize>,

    /// Idle worker poll interval in milliseconds
    #[arg(long, default_value_t = 100)]
    poll_ms: u64,

    /// Upper bound on waiting for workers to drain, in seconds
    #[arg(long, default_value_t = 600)]
    termination_timeout_secs: u64,

    /// Append-only metrics log
    #[arg(long, default_value = "rust_metrics_result.log")]
    log_file: PathBuf,

    /// Write the averaged metrics as JSON
    #[arg(long)]
    summary_json: Option<PathBuf>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

fn load_dataset(args: &Args) -> Result<Dataset> {
    let data_dir = || {
        args.data_dir
            .clone()
            .context("--data-dir is required for this source")
    };

    match args.source {
        Source::Cifar10 => load_cifar10(data_dir()?),
        Source::TinyImagenet => load_image_folder(data_dir()?, TINY_IMAGENET_SHAPE),
        Source::Synthetic => Ok(Dataset::synthetic(args.synthetic_count, CIFAR10_SHAPE, 0)),
    }
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let config = HarnessConfig::builder()
        .batch_size(args.batch_size)
        .num_runs(args.runs)
        .queue_capacity(args.queue_capacity)
        .worker_count(args.workers.unwrap_or_else(default_worker_count))
        .strategy(args.strategy)
        .poll_interval(Duration::from_millis(args.poll_ms))
        .termination_timeout(Duration::from_secs(args.termination_timeout_secs))
        .build();
    config.validate()?;

    append_line(&args.log_file, "Loading dataset into memory...")?;
    let dataset = load_dataset(&args).context("Failed to load dataset")?;
    append_line(&args.log_file, "Dataset loaded successfully.")?;

    let probe = SystemProbe::new().context("CPU/memory probe unavailable")?;
    let reporter = LogFileReporter::new(&args.log_file);
    let mut harness = Harness::new(config, probe, reporter)?;
    let report = harness.run(dataset)?;

    if let Some(path) = &args.summary_json {
        let json = serde_json::to_string_pretty(&report.aggregate)?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write summary to {}", path.display()))?;
    }

    info!(
        runs = report.aggregate.runs,
        execution = ?report.aggregate.execution_time,
        overhead = ?report.aggregate.concurrency_overhead,
        log = %args.log_file.display(),
        "Benchmark finished"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_flag_accepts_names_and_aliases() {
        let args = Args::try_parse_from(["concurrency_bench", "--strategy", "fan-out"]).unwrap();
        assert_eq!(args.strategy, Strategy::FanOut);

        let args = Args::try_parse_from(["concurrency_bench", "--strategy", "queue"]).unwrap();
        assert_eq!(args.strategy, Strategy::BoundedQueue);

        let args = Args::try_parse_from(["concurrency_bench"]).unwrap();
        assert_eq!(args.strategy, Strategy::BoundedQueue);

        assert!(Args::try_parse_from(["concurrency_bench", "--strategy", "round-robin"]).is_err());
    }
}

//! The repeated-run benchmark loop.
//!
//! Runs are strictly sequential: each one splits the dataset, hands the batches
//! to the configured scheduler inside a metrics bracket, puts the dataset back
//! together and only then logs and records its metrics. A run that fails at any
//! step aborts the harness and is never recorded.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use crate::batcher::Batcher;
use crate::config::HarnessConfig;
use crate::dataset::Dataset;
use crate::metrics::{AggregateMetrics, MetricsCollector, ResourceProbe, RunMetrics};
use crate::report::{average_lines, dataset_banner, run_lines, Reporter};
use crate::scheduler::{self, Scheduler};
use crate::transform::{Scale, Transform};

/// Outcome of one successful run.
#[derive(Debug)]
pub struct RunRecord {
    /// The dataset after this run's transform, ready for the next run.
    pub dataset: Dataset,
    pub metrics: RunMetrics,
    pub batches: usize,
    pub peak_queue_depth: Option<usize>,
}

/// Outcome of a full `Harness::run`.
#[derive(Debug)]
pub struct HarnessReport {
    pub dataset: Dataset,
    pub runs: Vec<RunMetrics>,
    pub aggregate: AggregateMetrics,
    /// Deepest queue depth seen over all runs, for queue-based strategies.
    pub peak_queue_depth: Option<usize>,
}

pub struct Harness<P, R> {
    config: HarnessConfig,
    batcher: Batcher,
    scheduler: Box<dyn Scheduler>,
    transform: Arc<dyn Transform>,
    collector: MetricsCollector<P>,
    reporter: R,
}

impl<P: ResourceProbe, R: Reporter> Harness<P, R> {
    /// Validates `config` and builds the scheduler it selects, with the
    /// doubling transform.
    pub fn new(config: HarnessConfig, probe: P, reporter: R) -> Result<Self> {
        config.validate()?;
        let batcher = Batcher::new(config.batch_size)?;
        let scheduler = scheduler::from_config(&config)?;

        Ok(Self {
            config,
            batcher,
            scheduler,
            transform: Arc::new(Scale::doubling()),
            collector: MetricsCollector::new(probe),
            reporter,
        })
    }

    pub fn with_transform(mut self, transform: Arc<dyn Transform>) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_scheduler(mut self, scheduler: Box<dyn Scheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn collector(&self) -> &MetricsCollector<P> {
        &self.collector
    }

    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    /// One Batcher -> Scheduler -> reassemble pass, measured and recorded.
    pub fn run_once(&mut self, dataset: Dataset) -> Result<RunRecord> {
        let mut partition = self.batcher.split(dataset);
        let batches = partition.take_batches();
        let num_batches = batches.len();

        let scheduler = &self.scheduler;
        let transform = Arc::clone(&self.transform);
        let (outcome, metrics) = self
            .collector
            .measure(|| scheduler.run(batches, transform))
            .with_context(|| format!("{} scheduler run failed", scheduler.name()))?;

        let peak_queue_depth = outcome.peak_queue_depth;
        let dataset = partition
            .reassemble(outcome.batches)
            .context("Scheduler returned an inconsistent set of batches")?;
        self.collector.record(metrics);

        Ok(RunRecord {
            dataset,
            metrics,
            batches: num_batches,
            peak_queue_depth,
        })
    }

    /// Runs `num_runs` sequential passes over `dataset`, logging each run and
    /// the final averages.
    pub fn run(&mut self, mut dataset: Dataset) -> Result<HarnessReport> {
        for line in dataset_banner(&dataset, &self.config) {
            self.reporter.append(&line)?;
        }

        let num_runs = self.config.num_runs;
        let mut peak_queue_depth: Option<usize> = None;

        for run in 1..=num_runs {
            self.reporter.append(&format!("\nRun {}/{}...", run, num_runs))?;

            let record = self
                .run_once(dataset)
                .with_context(|| format!("Run {}/{} failed", run, num_runs))?;
            info!(
                run,
                strategy = self.scheduler.name(),
                batches = record.batches,
                execution = ?record.metrics.execution_time,
                overhead = ?record.metrics.concurrency_overhead,
                "Run complete"
            );

            for line in run_lines(run, &record.metrics) {
                self.reporter.append(&line)?;
            }
            if let Some(depth) = record.peak_queue_depth {
                peak_queue_depth = Some(peak_queue_depth.map_or(depth, |p| p.max(depth)));
            }
            dataset = record.dataset;
        }

        let aggregate = self
            .collector
            .aggregate()
            .context("No runs were recorded")?;
        for line in average_lines(&aggregate) {
            self.reporter.append(&line)?;
        }

        Ok(HarnessReport {
            dataset,
            runs: self.collector.runs().to_vec(),
            aggregate,
            peak_queue_depth,
        })
    }
}

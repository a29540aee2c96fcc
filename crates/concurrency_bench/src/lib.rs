pub mod batcher;
pub mod config;
pub mod dataset;
pub mod error;
pub mod harness;
pub mod loaders;
pub mod metrics;
pub mod report;
pub mod scheduler;
pub mod transform;

pub use batcher::{Batch, Batcher, Partition};
pub use config::{HarnessConfig, HarnessConfigBuilder, Strategy};
pub use dataset::{Dataset, Label, Vector, VectorShape};
pub use error::HarnessError;
pub use harness::{Harness, HarnessReport, RunRecord};
pub use metrics::{AggregateMetrics, MetricsCollector, ResourceProbe, RunMetrics, SystemProbe};
pub use report::{LogFileReporter, MemoryReporter, Reporter};
pub use scheduler::{BoundedQueuePool, FanOutBarrier, ScheduleOutcome, Scheduler};
pub use transform::{Scale, Transform};

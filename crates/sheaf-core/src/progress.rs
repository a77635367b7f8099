//! Progress events for harvest runs.
//!
//! The pipeline emits [`HarvestEvent`]s through a [`ProgressReporter`] rather
//! than logging directly, so a CLI, a test, or a service front-end can each
//! render the same run in their own way.

use crate::models::{QueryKind, QueryStatus};

/// Everything the pipeline announces while a run executes.
///
/// Events borrow from the run state, so emitting one per query stays cheap.
#[derive(Debug, Clone)]
pub enum HarvestEvent<'a> {
    /// Harvest pass starting.
    RunStarted {
        /// Number of partitions in the registry.
        total_partitions: usize,
    },

    /// Extraction of a single partition starting.
    PartitionStarted {
        /// Zero-based registry index of the partition.
        index: usize,
        /// Total number of partitions in the run.
        total: usize,
        /// Partition name.
        name: &'a str,
        /// Partition endpoint.
        endpoint: &'a str,
    },

    /// One query against a partition finished, in any status.
    QueryFinished {
        /// Partition name.
        partition: &'a str,
        /// The query that finished.
        kind: &'a QueryKind,
        /// Classified outcome.
        status: QueryStatus,
        /// Number of records obtained.
        records: usize,
        /// Failure description, when there is one.
        detail: Option<&'a str>,
    },

    /// Extraction of a single partition finished.
    PartitionFinished {
        /// Zero-based registry index of the partition.
        index: usize,
        /// Total number of partitions in the run.
        total: usize,
        /// Partition name.
        name: &'a str,
        /// Whether the listing query reached the partition.
        accessible: bool,
        /// Listing records obtained.
        records: usize,
    },

    /// Cancellation fired; remaining work is being skipped.
    RunCancelled,

    /// Harvest pass finished.
    RunFinished {
        /// Partitions where at least one query was issued.
        attempted: usize,
        /// Partitions whose listing query succeeded.
        accessible: usize,
    },
}

/// Sink for [`HarvestEvent`]s.
///
/// The default `report` drops the event, which makes silence the baseline:
/// implementors only override to render what they care about.
pub trait ProgressReporter: Send + Sync {
    /// Receives one event.
    fn report(&self, event: HarvestEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that swallows every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}

/// Reporter that turns events into `tracing` log lines.
///
/// Accessible outcomes log at INFO; failures, unreachable partitions and
/// cancellation log at WARN.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ProgressReporter for TracingReporter {
    fn report(&self, event: HarvestEvent<'_>) {
        use tracing::{info, warn};

        match event {
            HarvestEvent::RunStarted { total_partitions } => {
                info!("Starting harvest across {} partition(s)", total_partitions);
            }
            HarvestEvent::PartitionStarted {
                index,
                total,
                name,
                endpoint,
            } => {
                info!("[Partition {}/{}] {} ({})", index + 1, total, name, endpoint);
            }
            HarvestEvent::QueryFinished {
                partition,
                kind,
                status,
                records,
                detail,
            } => {
                if status.is_accessible() {
                    info!("[{}] {}: {} ({} record(s))", partition, kind, status, records);
                } else {
                    warn!(
                        "[{}] {}: {} ({})",
                        partition,
                        kind,
                        status,
                        detail.unwrap_or("no detail")
                    );
                }
            }
            HarvestEvent::PartitionFinished {
                index,
                total,
                name,
                accessible,
                records,
            } => {
                if accessible {
                    info!(
                        "[Partition {}/{}] {} done: {} listing record(s)",
                        index + 1,
                        total,
                        name,
                        records
                    );
                } else {
                    warn!(
                        "[Partition {}/{}] {} unreachable, continuing with the rest",
                        index + 1,
                        total,
                        name
                    );
                }
            }
            HarvestEvent::RunCancelled => {
                warn!("Cancellation requested; remaining queries will be skipped");
            }
            HarvestEvent::RunFinished {
                attempted,
                accessible,
            } => {
                info!(
                    "Harvest finished: {} partition(s) attempted, {} accessible",
                    attempted, accessible
                );
            }
        }
    }
}

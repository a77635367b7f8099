//! Harvest service: the full extraction pass across a partition registry.
//!
//! This module owns scheduling only. It fans the registry out over a bounded
//! worker pool, collects per-partition results back into registry order, and
//! classifies the pass as complete or cut short. What happens inside a single
//! partition lives in [`crate::extract`]; what happens to the records
//! afterwards lives in [`crate::aggregate`] and [`crate::report`].

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::config::{ExtractConfig, HttpConfig};
use crate::extract::PartitionExtractor;
use crate::models::{PartitionResult, RunStatus};
use crate::progress::{HarvestEvent, ProgressReporter, SilentReporter};
use crate::registry::PartitionRegistry;
use crate::traits::CatalogClientFactory;

/// Output of one extraction pass, before merge and reporting.
#[derive(Debug, Clone)]
pub struct ExtractionRun {
    /// Per-partition outcomes, in registry order regardless of completion
    /// order.
    pub partition_results: Vec<PartitionResult>,
    /// COMPLETE, or INCOMPLETE_RUN when cancellation fired mid-pass.
    pub status: RunStatus,
}

impl ExtractionRun {
    /// Partitions where at least one query was issued.
    pub fn attempted(&self) -> usize {
        self.partition_results
            .iter()
            .filter(|r| r.attempted())
            .count()
    }

    /// Partitions whose listing query reached the realm.
    pub fn accessible(&self) -> usize {
        self.partition_results
            .iter()
            .filter(|r| r.accessible())
            .count()
    }
}

/// Service driving the extraction pass across every registered partition.
///
/// # Type Parameters
///
/// * `F` - Catalog client factory implementation
pub struct HarvestService<F: CatalogClientFactory> {
    extractor: PartitionExtractor<F>,
    concurrency: usize,
}

impl<F: CatalogClientFactory> HarvestService<F> {
    /// Creates a harvest service with default configuration.
    pub fn new(factory: F) -> Self {
        Self::with_config(factory, HttpConfig::default(), ExtractConfig::default())
    }

    /// Creates a harvest service with custom configuration.
    pub fn with_config(factory: F, http: HttpConfig, extract: ExtractConfig) -> Self {
        Self {
            extractor: PartitionExtractor::new(factory, http, extract.call_spacing),
            concurrency: extract.concurrency.max(1),
        }
    }

    /// Runs the pass without progress reporting.
    pub async fn run(
        &self,
        registry: &PartitionRegistry,
        cancel: &CancellationToken,
    ) -> ExtractionRun {
        self.run_with_progress(registry, cancel, &SilentReporter)
            .await
    }

    /// Runs the full extraction pass.
    ///
    /// Partitions are submitted in registry order and extracted with at most
    /// `concurrency` in flight. Completion order is whatever the network
    /// makes it, so each result carries its registry index and is placed into
    /// a pre-sized slot vector; the returned results read in registry order.
    ///
    /// Cancellation never abandons results already obtained: the pass drains
    /// normally, partitions that never ran come back as SKIPPED, and the run
    /// is marked INCOMPLETE_RUN.
    pub async fn run_with_progress<R: ProgressReporter>(
        &self,
        registry: &PartitionRegistry,
        cancel: &CancellationToken,
        reporter: &R,
    ) -> ExtractionRun {
        let partitions = registry.partitions();
        let total = partitions.len();
        reporter.report(HarvestEvent::RunStarted {
            total_partitions: total,
        });

        let completed: Vec<(usize, PartitionResult)> = stream::iter(partitions.iter().enumerate())
            .map(|(index, partition)| async move {
                reporter.report(HarvestEvent::PartitionStarted {
                    index,
                    total,
                    name: &partition.name,
                    endpoint: &partition.region_endpoint,
                });

                let result = self.extractor.extract(partition, cancel, reporter).await;

                reporter.report(HarvestEvent::PartitionFinished {
                    index,
                    total,
                    name: &partition.name,
                    accessible: result.accessible(),
                    records: result.listing_result.records.len(),
                });
                (index, result)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut slots: Vec<Option<PartitionResult>> = Vec::with_capacity(total);
        slots.resize_with(total, || None);
        for (index, result) in completed {
            slots[index] = Some(result);
        }
        let partition_results: Vec<PartitionResult> = slots.into_iter().flatten().collect();
        debug_assert_eq!(partition_results.len(), total);

        let status = if cancel.is_cancelled() {
            reporter.report(HarvestEvent::RunCancelled);
            RunStatus::IncompleteRun
        } else {
            RunStatus::Complete
        };

        let run = ExtractionRun {
            partition_results,
            status,
        };
        reporter.report(HarvestEvent::RunFinished {
            attempted: run.attempted(),
            accessible: run.accessible(),
        });
        run
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::future::Future;
    use std::time::Duration;

    use serde_json::Map;

    use super::*;
    use crate::error::HarvestError;
    use crate::models::{Partition, QueryKind, QueryResult, QueryStatus, RealmClass, Record};
    use crate::traits::CatalogClient;

    fn partition(name: &str, realm_class: RealmClass) -> Partition {
        Partition {
            name: name.to_string(),
            realm_class,
            region_endpoint: format!("https://{name}.example.com"),
            credential_ref: "test".to_string(),
            scope_id: None,
            requires_scope: false,
        }
    }

    fn record(id: &str) -> Record {
        Record {
            record_id: id.to_string(),
            name: format!("Record {id}"),
            category: String::new(),
            publisher_id: String::new(),
            attributes: Map::new(),
            availability: BTreeSet::new(),
        }
    }

    /// Answers every query with the same records after an optional delay.
    /// The delay scrambles completion order against registry order.
    #[derive(Clone)]
    struct DelayedClient {
        records: Vec<Record>,
        delay: Duration,
    }

    impl CatalogClient for DelayedClient {
        fn query(&self, _kind: &QueryKind) -> impl Future<Output = QueryResult> + Send {
            let records = self.records.clone();
            let delay = self.delay;
            async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                QueryResult::success(records)
            }
        }
    }

    #[derive(Clone)]
    struct DelayedFactory;

    impl CatalogClientFactory for DelayedFactory {
        type Client = DelayedClient;

        fn create(&self, partition: &Partition) -> Result<DelayedClient, HarvestError> {
            // Slow down the first registry entry so it finishes last.
            let delay = if partition.name == "slow" {
                Duration::from_millis(30)
            } else {
                Duration::ZERO
            };
            Ok(DelayedClient {
                records: vec![record(&format!("{}-1", partition.name))],
                delay,
            })
        }
    }

    #[tokio::test]
    async fn test_results_come_back_in_registry_order() {
        let registry = PartitionRegistry::new(vec![
            partition("slow", RealmClass::Commercial),
            partition("fast-a", RealmClass::Government),
            partition("fast-b", RealmClass::Defense),
        ])
        .unwrap();

        let service = HarvestService::with_config(
            DelayedFactory,
            HttpConfig::default(),
            ExtractConfig {
                concurrency: 3,
                call_spacing: Duration::ZERO,
            },
        );
        let cancel = CancellationToken::new();

        let run = service.run(&registry, &cancel).await;

        let names: Vec<&str> = run
            .partition_results
            .iter()
            .map(|r| r.partition.name.as_str())
            .collect();
        assert_eq!(names, vec!["slow", "fast-a", "fast-b"]);
        assert_eq!(run.status, RunStatus::Complete);
        assert_eq!(run.attempted(), 3);
        assert_eq!(run.accessible(), 3);
    }

    #[tokio::test]
    async fn test_zero_concurrency_is_clamped() {
        let registry =
            PartitionRegistry::new(vec![partition("only", RealmClass::Commercial)]).unwrap();
        let service = HarvestService::with_config(
            DelayedFactory,
            HttpConfig::default(),
            ExtractConfig {
                concurrency: 0,
                call_spacing: Duration::ZERO,
            },
        );
        let cancel = CancellationToken::new();

        let run = service.run(&registry, &cancel).await;
        assert_eq!(run.partition_results.len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_run_is_marked_incomplete() {
        let registry = PartitionRegistry::new(vec![
            partition("a", RealmClass::Commercial),
            partition("b", RealmClass::Government),
        ])
        .unwrap();
        let service = HarvestService::new(DelayedFactory);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let run = service.run(&registry, &cancel).await;

        assert_eq!(run.status, RunStatus::IncompleteRun);
        assert_eq!(run.partition_results.len(), 2, "every partition still has a slot");
        assert_eq!(run.attempted(), 0);
        for result in &run.partition_results {
            for (_, query) in result.query_results() {
                assert_eq!(query.status, QueryStatus::Skipped);
            }
        }
    }
}

//! Per-partition extraction.
//!
//! The extractor owns everything that happens between "this partition is next"
//! and "here is its [`PartitionResult`]": client construction, the three query
//! kinds, retry of transient transport failures, call pacing, and reacting to
//! cancellation. It never returns an error. Every failure mode is classified
//! into a [`QueryStatus`] so one partition can never take down the run.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::HttpConfig;
use crate::models::{Partition, PartitionResult, QueryKind, QueryResult, QueryStatus};
use crate::progress::{HarvestEvent, ProgressReporter};
use crate::traits::{CatalogClient, CatalogClientFactory};

/// Extracts a single partition across all required query kinds.
pub struct PartitionExtractor<F: CatalogClientFactory> {
    factory: F,
    http: HttpConfig,
    call_spacing: Duration,
}

impl<F: CatalogClientFactory> PartitionExtractor<F> {
    pub fn new(factory: F, http: HttpConfig, call_spacing: Duration) -> Self {
        Self {
            factory,
            http,
            call_spacing,
        }
    }

    /// Runs the full query set against one partition.
    ///
    /// Query kinds are issued sequentially and independently: a failed
    /// listing query does not stop the detailed or publisher queries. When
    /// the client cannot even be constructed (unknown credential profile,
    /// unusable endpoint) every query is reported as ACCESS_DENIED with the
    /// construction failure as detail.
    pub async fn extract<R: ProgressReporter>(
        &self,
        partition: &Partition,
        cancel: &CancellationToken,
        reporter: &R,
    ) -> PartitionResult {
        let client = match self.factory.create(partition) {
            Ok(client) => client,
            Err(e) => {
                warn!(
                    partition = %partition.name,
                    error = %e,
                    "client construction failed, marking partition inaccessible"
                );
                let denied = QueryResult::failure(QueryStatus::AccessDenied, e.to_string());
                return PartitionResult {
                    partition: partition.clone(),
                    listing_result: denied.clone(),
                    detail_result: denied.clone(),
                    publisher_result: denied,
                };
            }
        };

        let listing_result = self
            .run_query(&client, partition, QueryKind::Listings, false, cancel, reporter)
            .await;
        let detail_result = self
            .run_query(
                &client,
                partition,
                QueryKind::StructuredSearch,
                true,
                cancel,
                reporter,
            )
            .await;
        let publisher_result = self
            .run_query(&client, partition, QueryKind::Publishers, true, cancel, reporter)
            .await;

        PartitionResult {
            partition: partition.clone(),
            listing_result,
            detail_result,
            publisher_result,
        }
    }

    /// Issues one query, retrying transient transport failures with
    /// exponential backoff. `pace` inserts the inter-call spacing first,
    /// which the first query of a partition does not need.
    async fn run_query<R: ProgressReporter>(
        &self,
        client: &F::Client,
        partition: &Partition,
        kind: QueryKind,
        pace: bool,
        cancel: &CancellationToken,
        reporter: &R,
    ) -> QueryResult {
        if cancel.is_cancelled() {
            let result = QueryResult::skipped("cancelled before the query was issued");
            self.emit(reporter, partition, &kind, &result);
            return result;
        }

        if pace && !self.call_spacing.is_zero() && !self.wait(self.call_spacing, cancel).await {
            let result = QueryResult::skipped("cancelled while pacing between calls");
            self.emit(reporter, partition, &kind, &result);
            return result;
        }

        let mut attempt: u32 = 0;
        loop {
            let outcome = tokio::select! {
                result = client.query(&kind) => result,
                () = cancel.cancelled() => {
                    QueryResult::skipped("cancelled while the query was in flight")
                }
            };

            if outcome.status == QueryStatus::TransportError && attempt < self.http.max_retries {
                attempt += 1;
                let backoff = self
                    .http
                    .retry_base_delay
                    .saturating_mul(2u32.saturating_pow(attempt - 1));
                debug!(
                    partition = %partition.name,
                    query = %kind,
                    attempt,
                    "transient transport failure, retrying"
                );
                if self.wait(backoff.max(self.call_spacing), cancel).await {
                    continue;
                }
                let result = QueryResult::skipped("cancelled during retry backoff");
                self.emit(reporter, partition, &kind, &result);
                return result;
            }

            self.emit(reporter, partition, &kind, &outcome);
            return outcome;
        }
    }

    /// Sleeps for `delay` unless cancellation fires first. Returns false on
    /// cancellation.
    async fn wait(&self, delay: Duration, cancel: &CancellationToken) -> bool {
        tokio::select! {
            () = tokio::time::sleep(delay) => true,
            () = cancel.cancelled() => false,
        }
    }

    fn emit<R: ProgressReporter>(
        &self,
        reporter: &R,
        partition: &Partition,
        kind: &QueryKind,
        result: &QueryResult,
    ) {
        reporter.report(HarvestEvent::QueryFinished {
            partition: &partition.name,
            kind,
            status: result.status,
            records: result.records.len(),
            detail: result.detail.as_deref(),
        });
    }
}

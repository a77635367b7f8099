//! Harvest report: the structured summary of one complete pass.
//!
//! The report is built once, after extraction and merge have both finished,
//! and is immutable from then on. It exists in three shapes: the in-memory
//! [`HarvestReport`] (everything, including the merged catalog), the
//! machine-readable [`ReportDocument`] artifact (statuses and counts, no raw
//! records), and a human-readable text rendering.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::{MergeAnomaly, MergeOutcome};
use crate::models::{PartitionResult, QueryStatus, RealmClass, Record, RunStatus};

/// Raw listing count for one partition. Overlapping records are counted in
/// every partition that returned them; only `grand_total` deduplicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionCount {
    pub name: String,
    pub records: usize,
}

/// Aggregate counts for the whole pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestTotals {
    /// Unique records across all partitions.
    pub grand_total: usize,
    pub partitions_attempted: usize,
    pub partitions_accessible: usize,
    /// Raw listing counts in registry order.
    pub per_partition: Vec<PartitionCount>,
    /// Unique records observed in each realm class.
    pub per_realm: BTreeMap<RealmClass, usize>,
    /// Unique records observed in more than one realm class.
    pub multi_realm: usize,
}

/// Status of one query in the report artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryStatusLine {
    pub kind: String,
    pub status: QueryStatus,
    pub records: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Per-partition section of the report artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionSummary {
    pub name: String,
    pub realm_class: RealmClass,
    pub region_endpoint: String,
    pub accessible: bool,
    pub attempted: bool,
    /// Raw listing record count.
    pub record_count: usize,
    /// One line per query kind, in issue order.
    pub queries: Vec<QueryStatusLine>,
}

/// Machine-readable report artifact payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportDocument {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    /// Identity of the invoking principal, for audit.
    pub principal: String,
    pub status: RunStatus,
    pub partitions: Vec<PartitionSummary>,
    pub anomalies: Vec<MergeAnomaly>,
    pub totals: HarvestTotals,
}

/// Complete outcome of one harvest pass.
#[derive(Debug, Clone)]
pub struct HarvestReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub principal: String,
    pub status: RunStatus,
    /// Per-partition outcomes in registry order.
    pub partition_results: Vec<PartitionResult>,
    /// The deduplicated catalog.
    pub merged_catalog: BTreeMap<String, Record>,
    pub anomalies: Vec<MergeAnomaly>,
    pub totals: HarvestTotals,
}

impl HarvestReport {
    /// Assembles the report from finalized extraction and merge outputs.
    pub fn build(
        principal: impl Into<String>,
        status: RunStatus,
        partition_results: Vec<PartitionResult>,
        merge: MergeOutcome,
    ) -> Self {
        let totals = compute_totals(&partition_results, &merge.catalog);
        Self {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            principal: principal.into(),
            status,
            partition_results,
            merged_catalog: merge.catalog,
            anomalies: merge.anomalies,
            totals,
        }
    }

    /// The machine-readable artifact view of this report.
    pub fn document(&self) -> ReportDocument {
        ReportDocument {
            run_id: self.run_id,
            generated_at: self.generated_at,
            principal: self.principal.clone(),
            status: self.status,
            partitions: self.partition_results.iter().map(summarize).collect(),
            anomalies: self.anomalies.clone(),
            totals: self.totals.clone(),
        }
    }

    /// Renders the human-readable summary block.
    pub fn render_text(&self) -> String {
        let rule = "═".repeat(66);
        let thin_rule = "─".repeat(66);
        let mut out = String::new();

        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, " Harvest report  {}", self.run_id);
        let _ = writeln!(
            out,
            " Status: {}    generated {} by {}",
            self.status,
            self.generated_at.format("%Y-%m-%dT%H:%M:%SZ"),
            self.principal
        );
        if self.status == RunStatus::IncompleteRun {
            let _ = writeln!(
                out,
                " !! cancelled before completion, results below are partial"
            );
        }
        let _ = writeln!(out, "{rule}");

        let _ = writeln!(out, " Partitions (registry order):");
        for result in &self.partition_results {
            let _ = writeln!(
                out,
                "   {:<16} {:<17} {:<18} {:>6} record(s)",
                result.partition.name,
                result.partition.realm_class,
                result.listing_result.status,
                result.listing_result.records.len()
            );
            for (kind, query) in result.query_results() {
                if !query.is_accessible() {
                    let _ = writeln!(
                        out,
                        "       {kind}: {} ({})",
                        query.status,
                        query.detail.as_deref().unwrap_or("no detail")
                    );
                }
            }
        }

        let _ = writeln!(out, "{thin_rule}");
        let _ = writeln!(out, " Totals:");
        let _ = writeln!(
            out,
            "   partitions attempted:  {:>6}",
            self.totals.partitions_attempted
        );
        let _ = writeln!(
            out,
            "   partitions accessible: {:>6}",
            self.totals.partitions_accessible
        );
        let _ = writeln!(out, "   unique records:        {:>6}", self.totals.grand_total);
        let _ = writeln!(out, "   multi-realm records:   {:>6}", self.totals.multi_realm);
        let _ = writeln!(out, "   merge anomalies:       {:>6}", self.anomalies.len());

        if !self.totals.per_realm.is_empty() {
            let _ = writeln!(out, " Unique records per realm class:");
            for (realm, count) in &self.totals.per_realm {
                let _ = writeln!(out, "   {:<17} {:>6}", realm.as_str(), count);
            }
        }

        if !self.anomalies.is_empty() {
            let _ = writeln!(out, " Anomalies (first value kept):");
            for anomaly in &self.anomalies {
                let _ = writeln!(
                    out,
                    "   {} {}: kept '{}', discarded '{}' from {}",
                    anomaly.record_id,
                    anomaly.field,
                    anomaly.kept,
                    anomaly.discarded,
                    anomaly.partition
                );
            }
        }

        let _ = writeln!(out, "{rule}");
        out
    }
}

fn summarize(result: &PartitionResult) -> PartitionSummary {
    PartitionSummary {
        name: result.partition.name.clone(),
        realm_class: result.partition.realm_class,
        region_endpoint: result.partition.region_endpoint.clone(),
        accessible: result.accessible(),
        attempted: result.attempted(),
        record_count: result.listing_result.records.len(),
        queries: result
            .query_results()
            .iter()
            .map(|(kind, query)| QueryStatusLine {
                kind: (*kind).to_string(),
                status: query.status,
                records: query.records.len(),
                detail: query.detail.clone(),
            })
            .collect(),
    }
}

fn compute_totals(
    results: &[PartitionResult],
    catalog: &BTreeMap<String, Record>,
) -> HarvestTotals {
    let per_partition = results
        .iter()
        .map(|result| PartitionCount {
            name: result.partition.name.clone(),
            records: result.listing_result.records.len(),
        })
        .collect();

    let mut per_realm: BTreeMap<RealmClass, usize> = BTreeMap::new();
    let mut multi_realm = 0usize;
    for record in catalog.values() {
        for realm in &record.availability {
            *per_realm.entry(*realm).or_insert(0) += 1;
        }
        if record.availability.len() > 1 {
            multi_realm += 1;
        }
    }

    HarvestTotals {
        grand_total: catalog.len(),
        partitions_attempted: results.iter().filter(|r| r.attempted()).count(),
        partitions_accessible: results.iter().filter(|r| r.accessible()).count(),
        per_partition,
        per_realm,
        multi_realm,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Map;

    use super::*;
    use crate::models::{Partition, QueryResult, Record};

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

    fn record(id: &str, realms: &[RealmClass]) -> Record {
        Record {
            record_id: id.to_string(),
            name: format!("Record {id}"),
            category: String::new(),
            publisher_id: String::new(),
            attributes: Map::new(),
            availability: realms.iter().copied().collect(),
        }
    }

    fn sample_results() -> Vec<PartitionResult> {
        vec![
            PartitionResult {
                partition: partition("commercial", RealmClass::Commercial),
                listing_result: QueryResult::success(vec![
                    record("1", &[]),
                    record("2", &[]),
                ]),
                detail_result: QueryResult::success(Vec::new()),
                publisher_result: QueryResult::success(Vec::new()),
            },
            PartitionResult {
                partition: partition("uk-gov", RealmClass::RegionalVariant),
                listing_result: QueryResult::failure(QueryStatus::AccessDenied, "HTTP 403"),
                detail_result: QueryResult::failure(QueryStatus::AccessDenied, "HTTP 403"),
                publisher_result: QueryResult::failure(QueryStatus::AccessDenied, "HTTP 403"),
            },
        ]
    }

    fn sample_catalog() -> BTreeMap<String, Record> {
        let mut catalog = BTreeMap::new();
        catalog.insert(
            "1".to_string(),
            record("1", &[RealmClass::Commercial, RealmClass::Defense]),
        );
        catalog.insert("2".to_string(), record("2", &[RealmClass::Commercial]));
        catalog
    }

    fn sample_report(status: RunStatus) -> HarvestReport {
        HarvestReport::build(
            "tester",
            status,
            sample_results(),
            MergeOutcome {
                catalog: sample_catalog(),
                anomalies: vec![MergeAnomaly {
                    record_id: "1".to_string(),
                    field: "name".to_string(),
                    kept: "Record 1".to_string(),
                    discarded: "Record One".to_string(),
                    partition: "us-dod-east".to_string(),
                }],
            },
        )
    }

    #[test]
    fn test_totals_count_unique_and_per_realm() {
        let report = sample_report(RunStatus::Complete);

        assert_eq!(report.totals.grand_total, 2);
        assert_eq!(report.totals.partitions_attempted, 2);
        assert_eq!(report.totals.partitions_accessible, 1);
        assert_eq!(report.totals.per_realm[&RealmClass::Commercial], 2);
        assert_eq!(report.totals.per_realm[&RealmClass::Defense], 1);
        assert_eq!(report.totals.multi_realm, 1);
        assert_eq!(report.totals.per_partition.len(), 2);
        assert_eq!(report.totals.per_partition[0].records, 2);
        assert_eq!(report.totals.per_partition[1].records, 0);
    }

    #[test]
    fn test_document_excludes_raw_records_but_keeps_statuses() {
        let report = sample_report(RunStatus::Complete);
        let document = report.document();

        assert_eq!(document.partitions.len(), 2);
        let denied = &document.partitions[1];
        assert!(!denied.accessible);
        assert!(denied.attempted);
        assert_eq!(denied.queries.len(), 3);
        assert_eq!(denied.queries[0].status, QueryStatus::AccessDenied);
        assert_eq!(denied.queries[0].detail.as_deref(), Some("HTTP 403"));

        let json = serde_json::to_string(&document).unwrap();
        let back: ReportDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(back.totals, document.totals);
        assert_eq!(back.anomalies, document.anomalies);
    }

    #[test]
    fn test_render_text_lists_partitions_and_failures() {
        let report = sample_report(RunStatus::Complete);
        let text = report.render_text();

        assert!(text.contains("commercial"));
        assert!(text.contains("uk-gov"));
        assert!(text.contains("ACCESS_DENIED"));
        assert!(text.contains("HTTP 403"));
        assert!(text.contains("unique records"));
        assert!(!text.contains("partial"));
    }

    #[test]
    fn test_render_text_flags_incomplete_runs() {
        let report = sample_report(RunStatus::IncompleteRun);
        let text = report.render_text();

        assert!(text.contains("INCOMPLETE_RUN"));
        assert!(text.contains("results below are partial"));
    }
}

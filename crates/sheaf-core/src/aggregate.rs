//! Cross-partition merge.
//!
//! Aggregation is a pure fold over partition results in registry order:
//! enrich each partition's listing records from its own detailed records,
//! then dedup across partitions by `record_id`. The first partition to
//! produce a record owns its attributes; later sightings only extend the
//! availability set. Attribute disagreements between partitions are recorded
//! as anomalies instead of being silently resolved.

use std::collections::BTreeMap;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{PartitionResult, Record};

/// A typed-field disagreement between two partitions' views of one record.
///
/// Anomalies are warnings, not errors: the merge keeps the first-seen value
/// and the run continues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeAnomaly {
    pub record_id: String,
    /// Which typed field differed (`name`, `category` or `publisher_id`).
    pub field: String,
    /// Value kept, from the partition that saw the record first.
    pub kept: String,
    /// Conflicting value that was discarded.
    pub discarded: String,
    /// Partition that reported the discarded value.
    pub partition: String,
}

/// The deduplicated catalog plus merge warnings.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// `record_id` to record, availability accumulated across partitions.
    pub catalog: BTreeMap<String, Record>,
    /// Typed-field conflicts observed during the fold.
    pub anomalies: Vec<MergeAnomaly>,
}

/// Folds partition results into one deduplicated catalog.
///
/// Partitions that failed their listing query contribute nothing; there is no
/// partial data from a failed partition. The input order is the precedence
/// order, so callers pass results in registry order.
pub fn aggregate(results: &[PartitionResult]) -> MergeOutcome {
    let mut catalog: BTreeMap<String, Record> = BTreeMap::new();
    let mut anomalies: Vec<MergeAnomaly> = Vec::new();

    for result in results {
        if !result.listing_result.is_accessible() {
            continue;
        }

        let details = if result.detail_result.is_accessible() {
            result.detail_result.records.as_slice()
        } else {
            &[]
        };

        for record in enrich(&result.listing_result.records, details) {
            match catalog.get_mut(&record.record_id) {
                None => {
                    let mut owned = record;
                    owned.availability.insert(result.partition.realm_class);
                    catalog.insert(owned.record_id.clone(), owned);
                }
                Some(existing) => {
                    existing.availability.insert(result.partition.realm_class);
                    detect_conflicts(existing, &record, &result.partition.name, &mut anomalies);
                }
            }
        }
    }

    MergeOutcome { catalog, anomalies }
}

/// Fills gaps in listing records from the same partition's detailed records.
///
/// Enrichment never overwrites a value the listing already has, and detailed
/// records without a listing counterpart are dropped: the listing query
/// defines which records exist.
fn enrich(listings: &[Record], details: &[Record]) -> Vec<Record> {
    if details.is_empty() {
        return listings.to_vec();
    }

    let by_id: HashMap<&str, &Record> = details
        .iter()
        .map(|record| (record.record_id.as_str(), record))
        .collect();

    listings
        .iter()
        .map(|listing| {
            let mut merged = listing.clone();
            if let Some(detail) = by_id.get(listing.record_id.as_str()) {
                fill_missing(&mut merged, detail);
            }
            merged
        })
        .collect()
}

fn fill_missing(target: &mut Record, source: &Record) {
    if target.category.is_empty() && !source.category.is_empty() {
        target.category = source.category.clone();
    }
    if target.publisher_id.is_empty() && !source.publisher_id.is_empty() {
        target.publisher_id = source.publisher_id.clone();
    }
    for (key, value) in &source.attributes {
        if value.is_null() {
            continue;
        }
        let missing = matches!(target.attributes.get(key), None | Some(Value::Null));
        if missing {
            target.attributes.insert(key.clone(), value.clone());
        }
    }
}

/// Flags typed fields where a later partition disagrees with the kept record.
/// A field is only a conflict when both sides carry a value.
fn detect_conflicts(
    kept: &Record,
    incoming: &Record,
    partition: &str,
    anomalies: &mut Vec<MergeAnomaly>,
) {
    let comparisons = [
        ("name", &kept.name, &incoming.name),
        ("category", &kept.category, &incoming.category),
        ("publisher_id", &kept.publisher_id, &incoming.publisher_id),
    ];
    for (field, kept_value, incoming_value) in comparisons {
        if !kept_value.is_empty() && !incoming_value.is_empty() && kept_value != incoming_value {
            anomalies.push(MergeAnomaly {
                record_id: kept.record_id.clone(),
                field: field.to_string(),
                kept: kept_value.clone(),
                discarded: incoming_value.clone(),
                partition: partition.to_string(),
            });
        }
    }
}

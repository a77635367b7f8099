//! Domain types shared across the harvest pipeline.
//!
//! All pipeline stages (extraction, merge, reporting) communicate exclusively
//! through these types, which keeps each stage testable in isolation.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::HarvestError;

/// Classification of the isolation domain a partition belongs to.
///
/// Records carry the set of realm classes they were observed in, so the
/// merged catalog can answer "where is this available" without keeping
/// per-partition copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RealmClass {
    Commercial,
    Government,
    Defense,
    RegionalVariant,
}

impl RealmClass {
    /// Stable uppercase label used in artifacts and reports.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Commercial => "COMMERCIAL",
            Self::Government => "GOVERNMENT",
            Self::Defense => "DEFENSE",
            Self::RegionalVariant => "REGIONAL_VARIANT",
        }
    }
}

impl fmt::Display for RealmClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RealmClass {
    type Err = HarvestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "COMMERCIAL" => Ok(Self::Commercial),
            "GOVERNMENT" => Ok(Self::Government),
            "DEFENSE" => Ok(Self::Defense),
            "REGIONAL_VARIANT" => Ok(Self::RegionalVariant),
            other => Err(HarvestError::Configuration(format!(
                "unknown realm class '{other}'"
            ))),
        }
    }
}

/// One isolated data source: a (realm, region, credential) combination.
///
/// Partitions never share sessions or credentials. Everything the extractor
/// needs to reach a partition is carried here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    /// Short stable label, unique within a registry. Used in artifact file
    /// names and log lines.
    pub name: String,
    pub realm_class: RealmClass,
    /// Base URL of the catalog service endpoint for this partition.
    pub region_endpoint: String,
    /// Opaque reference to a pre-established credential profile.
    pub credential_ref: String,
    /// Tenancy scope some realms require on every query.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope_id: Option<String>,
    /// When set, the partition cannot be queried without a `scope_id` and
    /// registry construction fails if one is missing.
    #[serde(default)]
    pub requires_scope: bool,
}

/// The kinds of query the harvester issues against a partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKind {
    /// Full listing enumeration, the primary record source.
    Listings,
    /// Structured search returning the detailed record shape.
    StructuredSearch,
    /// Publisher enumeration.
    Publishers,
    /// Listing enumeration restricted to a single category.
    CategoryFiltered(String),
}

impl QueryKind {
    /// Stable label used in artifact file names.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Listings => "listings",
            Self::StructuredSearch => "detailed",
            Self::Publishers => "publishers",
            Self::CategoryFiltered(_) => "category",
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CategoryFiltered(category) => write!(f, "category[{category}]"),
            other => f.write_str(other.label()),
        }
    }
}

/// Outcome classification for a single query against a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryStatus {
    /// The partition answered with at least one record.
    Ok,
    /// The partition answered with zero records. Still counts as reachable.
    Empty,
    /// Authentication or authorization failed, or the service does not exist
    /// for this partition.
    AccessDenied,
    /// The service could not be reached, timed out, or answered with a
    /// non-success status outside the access-denied family.
    TransportError,
    /// The service answered but the payload did not match the expected schema.
    MalformedResponse,
    /// The query was never issued, e.g. because the run was cancelled first.
    Skipped,
}

impl QueryStatus {
    /// OK and EMPTY both mean the partition answered; everything else is a
    /// failure to obtain data.
    pub fn is_accessible(self) -> bool {
        matches!(self, Self::Ok | Self::Empty)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Empty => "EMPTY",
            Self::AccessDenied => "ACCESS_DENIED",
            Self::TransportError => "TRANSPORT_ERROR",
            Self::MalformedResponse => "MALFORMED_RESPONSE",
            Self::Skipped => "SKIPPED",
        }
    }
}

impl fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One catalog entry in the uniform shape all partitions are normalized into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Identity across partitions. Two records with the same `record_id` are
    /// the same product.
    pub record_id: String,
    pub name: String,
    /// Primary category. Empty when the source supplied none.
    #[serde(default)]
    pub category: String,
    /// Publisher identity, falling back to the display name when the source
    /// has no stable id. Empty when neither is present.
    #[serde(default)]
    pub publisher_id: String,
    /// Pass-through source attributes. The schema is owned by the catalog
    /// service and is not interpreted here beyond the typed fields above.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, Value>,
    /// Realm classes this record was observed in during the harvest. Empty
    /// on raw records, populated by the merge.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub availability: BTreeSet<RealmClass>,
}

/// Outcome of one query against one partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub status: QueryStatus,
    /// Failure description from the transport or decoder. Absent for OK and
    /// EMPTY results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Normalized records. Populated only when `status` is OK.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub records: Vec<Record>,
}

impl QueryResult {
    /// Builds a successful result, classifying zero records as EMPTY.
    pub fn success(records: Vec<Record>) -> Self {
        let status = if records.is_empty() {
            QueryStatus::Empty
        } else {
            QueryStatus::Ok
        };
        Self {
            status,
            detail: None,
            records,
        }
    }

    /// Builds a failed result carrying the upstream failure description.
    pub fn failure(status: QueryStatus, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: Some(detail.into()),
            records: Vec::new(),
        }
    }

    /// Builds a SKIPPED result for a query that was never issued.
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::failure(QueryStatus::Skipped, reason)
    }

    pub fn is_accessible(&self) -> bool {
        self.status.is_accessible()
    }
}

/// Every query outcome for one partition. Written once by the extractor and
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionResult {
    pub partition: Partition,
    pub listing_result: QueryResult,
    pub detail_result: QueryResult,
    pub publisher_result: QueryResult,
}

impl PartitionResult {
    /// True when the primary listing query reached the partition (OK or EMPTY).
    pub fn accessible(&self) -> bool {
        self.listing_result.is_accessible()
    }

    /// True when at least one query was actually issued against the partition.
    pub fn attempted(&self) -> bool {
        self.query_results()
            .iter()
            .any(|(_, result)| result.status != QueryStatus::Skipped)
    }

    /// The three query results paired with their artifact labels, in the
    /// order they were issued.
    pub fn query_results(&self) -> [(&'static str, &QueryResult); 3] {
        [
            (QueryKind::Listings.label(), &self.listing_result),
            (QueryKind::StructuredSearch.label(), &self.detail_result),
            (QueryKind::Publishers.label(), &self.publisher_result),
        ]
    }
}

/// Whether a harvest pass ran to completion or was cut short.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Complete,
    IncompleteRun,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Complete => "COMPLETE",
            Self::IncompleteRun => "INCOMPLETE_RUN",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//! Sheaf core - domain types, partition registry, and the harvest pipeline.
//!
//! A harvest pass runs in three stages, each a separate module with plain-data
//! boundaries:
//!
//! 1. [`harvest`] drives [`extract`] across every partition in a
//!    [`registry::PartitionRegistry`], with bounded parallelism and
//!    cancellation support.
//! 2. [`aggregate`] folds the per-partition results into one deduplicated
//!    catalog.
//! 3. [`report`] and [`artifacts`] turn the outcome into the files a run
//!    leaves behind.
//!
//! Catalog access goes through the traits in [`traits`], so the pipeline can
//! be exercised end to end with scripted clients.

pub mod aggregate;
pub mod artifacts;
pub mod config;
pub mod error;
pub mod extract;
pub mod harvest;
pub mod models;
pub mod progress;
pub mod registry;
pub mod report;
pub mod traits;

pub use aggregate::{aggregate, MergeAnomaly, MergeOutcome};
pub use artifacts::{ArtifactPaths, ArtifactWriter};
pub use config::{ExtractConfig, HttpConfig};
pub use error::HarvestError;
pub use harvest::{ExtractionRun, HarvestService};
pub use models::{
    Partition, PartitionResult, QueryKind, QueryResult, QueryStatus, RealmClass, Record, RunStatus,
};
pub use registry::PartitionRegistry;
pub use report::{HarvestReport, HarvestTotals, ReportDocument};

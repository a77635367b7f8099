//! Artifact output: every file a harvest run leaves behind.
//!
//! Downstream consumers read these files, not the process output, so the
//! layout is part of the contract: one raw file per (partition, query kind)
//! pair under `raw/`, the merged catalog, and the report in both machine and
//! human form. Raw files exist and are well-formed even for failed queries,
//! with the failure classified inside. A consumer never has to distinguish
//! "query failed" from "file missing".

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::error::HarvestError;
use crate::models::{QueryResult, QueryStatus, RealmClass, Record};
use crate::report::HarvestReport;

/// File name of the merged catalog artifact.
pub const MERGED_CATALOG_FILE: &str = "merged_catalog.json";
/// File name of the machine-readable report artifact.
pub const REPORT_JSON_FILE: &str = "harvest_report.json";
/// File name of the human-readable report artifact.
pub const REPORT_TEXT_FILE: &str = "harvest_report.txt";
/// Directory holding per-(partition, query) raw payloads.
pub const RAW_DIR: &str = "raw";

/// Payload of one raw artifact file.
#[derive(Debug, Serialize)]
struct RawArtifact<'a> {
    partition: &'a str,
    realm_class: RealmClass,
    query_kind: &'a str,
    status: QueryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<&'a str>,
    record_count: usize,
    data: &'a [Record],
}

/// Locations of the artifacts written by one run.
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub raw_dir: PathBuf,
    pub merged_catalog: PathBuf,
    pub report_json: PathBuf,
    pub report_text: PathBuf,
}

/// Writes harvest artifacts under a single output directory.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    out_dir: PathBuf,
}

impl ArtifactWriter {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    /// Writes the complete artifact set for a finished report.
    ///
    /// # Errors
    ///
    /// Returns an error when a directory cannot be created or a file cannot
    /// be serialized or written.
    pub fn write_all(&self, report: &HarvestReport) -> Result<ArtifactPaths, HarvestError> {
        let raw_dir = self.out_dir.join(RAW_DIR);
        fs::create_dir_all(&raw_dir)?;

        for result in &report.partition_results {
            for (kind, query) in result.query_results() {
                let file = raw_dir.join(format!(
                    "{}_{kind}.json",
                    file_stem(&result.partition.name)
                ));
                self.write_raw(&file, &result.partition.name, result.partition.realm_class, kind, query)?;
            }
        }

        let merged_catalog = self.out_dir.join(MERGED_CATALOG_FILE);
        write_json(&merged_catalog, &report.merged_catalog)?;

        let report_json = self.out_dir.join(REPORT_JSON_FILE);
        write_json(&report_json, &report.document())?;

        let report_text = self.out_dir.join(REPORT_TEXT_FILE);
        fs::write(&report_text, report.render_text())?;

        info!(
            out_dir = %self.out_dir.display(),
            partitions = report.partition_results.len(),
            records = report.totals.grand_total,
            "harvest artifacts written"
        );

        Ok(ArtifactPaths {
            raw_dir,
            merged_catalog,
            report_json,
            report_text,
        })
    }

    fn write_raw(
        &self,
        file: &Path,
        partition: &str,
        realm_class: RealmClass,
        query_kind: &str,
        query: &QueryResult,
    ) -> Result<(), HarvestError> {
        let artifact = RawArtifact {
            partition,
            realm_class,
            query_kind,
            status: query.status,
            detail: query.detail.as_deref(),
            record_count: query.records.len(),
            data: &query.records,
        };
        write_json(file, &artifact)
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), HarvestError> {
    let payload = serde_json::to_vec_pretty(value)?;
    fs::write(path, payload)?;
    Ok(())
}

/// Partition names come from user-supplied registry files; anything that is
/// not filesystem-safe becomes a dash.
fn file_stem(partition_name: &str) -> String {
    partition_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_') {
                c
            } else {
                '-'
            }
        })
        .collect()
}

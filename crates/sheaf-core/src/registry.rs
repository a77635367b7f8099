//! Partition registry: the fixed, ordered set of sources for one run.
//!
//! The registry is immutable once constructed. Its order matters twice: it is
//! the extraction submission order, and it is the precedence order for the
//! first-writer-wins merge.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::HarvestError;
use crate::models::{Partition, RealmClass};

/// Ordered, validated set of partitions for one harvest run.
#[derive(Debug, Clone)]
pub struct PartitionRegistry {
    partitions: Vec<Partition>,
}

/// On-disk registry shape: a TOML file with `[[partition]]` tables.
#[derive(Debug, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    partition: Vec<Partition>,
}

impl PartitionRegistry {
    /// Builds a registry from an explicit partition list.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::Configuration`] when a partition name is empty
    /// or duplicated, or when a partition demands a scope without having one.
    /// Scope checking happens here so a misconfigured run fails before any
    /// partition is contacted.
    pub fn new(partitions: Vec<Partition>) -> Result<Self, HarvestError> {
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        for partition in &partitions {
            if partition.name.trim().is_empty() {
                return Err(HarvestError::Configuration(
                    "partition with empty name in registry".to_string(),
                ));
            }
            if !seen.insert(partition.name.as_str()) {
                return Err(HarvestError::Configuration(format!(
                    "duplicate partition name '{}'",
                    partition.name
                )));
            }
            if partition.requires_scope && partition.scope_id.is_none() {
                return Err(HarvestError::Configuration(format!(
                    "partition '{}' requires a scope_id but none was supplied",
                    partition.name
                )));
            }
        }
        Ok(Self { partitions })
    }

    /// The built-in registry: the realms the harvester targets out of the box.
    pub fn builtin() -> Self {
        // Valid by construction: unique names, no scope requirements.
        Self {
            partitions: builtin_partitions(),
        }
    }

    /// Parses a registry from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, HarvestError> {
        let file: RegistryFile = toml::from_str(text)
            .map_err(|e| HarvestError::Configuration(format!("invalid registry file: {e}")))?;
        if file.partition.is_empty() {
            return Err(HarvestError::Configuration(
                "registry file declares no partitions".to_string(),
            ));
        }
        Self::new(file.partition)
    }

    /// Loads and parses a registry file.
    pub fn load(path: &Path) -> Result<Self, HarvestError> {
        let text = fs::read_to_string(path).map_err(|e| {
            HarvestError::Configuration(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Partitions in registry order.
    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    /// Looks up a partition by name.
    pub fn find(&self, name: &str) -> Option<&Partition> {
        self.partitions.iter().find(|p| p.name == name)
    }

    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }
}

fn builtin_partitions() -> Vec<Partition> {
    fn entry(
        name: &str,
        realm_class: RealmClass,
        region_endpoint: &str,
        credential_ref: &str,
    ) -> Partition {
        Partition {
            name: name.to_string(),
            realm_class,
            region_endpoint: region_endpoint.to_string(),
            credential_ref: credential_ref.to_string(),
            scope_id: None,
            requires_scope: false,
        }
    }

    vec![
        entry(
            "commercial",
            RealmClass::Commercial,
            "https://marketplace.us-ashburn-1.oraclecloud.com",
            "oc1",
        ),
        entry(
            "us-gov-east",
            RealmClass::Government,
            "https://marketplace.us-gov-ashburn-1.oraclegovcloud.com",
            "oc3",
        ),
        entry(
            "us-gov-west",
            RealmClass::Government,
            "https://marketplace.us-gov-phoenix-1.oraclegovcloud.com",
            "oc3",
        ),
        entry(
            "us-dod-east",
            RealmClass::Defense,
            "https://marketplace.us-langley-1.oraclegovcloud.com",
            "oc2",
        ),
        entry(
            "us-dod-central",
            RealmClass::Defense,
            "https://marketplace.us-dod-central-1.oraclegovcloud.com",
            "oc2",
        ),
        entry(
            "us-dod-west",
            RealmClass::Defense,
            "https://marketplace.us-luke-1.oraclegovcloud.com",
            "oc2",
        ),
        entry(
            "uk-gov",
            RealmClass::RegionalVariant,
            "https://marketplace.uk-gov-london-1.oraclegovcloud.uk",
            "oc4",
        ),
    ]
}

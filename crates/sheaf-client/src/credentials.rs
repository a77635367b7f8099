//! Credential profiles: named tokens loaded from a local TOML file.
//!
//! Partitions reference credentials by profile name only; the secret
//! material never travels through the registry or the report. The file
//! format is:
//!
//! ```toml
//! [profiles.oc1]
//! token = "..."
//!
//! [profiles.oc2]
//! token = "..."
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use sheaf_core::traits::{Credential, CredentialResolver};
use sheaf_core::HarvestError;

#[derive(Clone, Deserialize)]
struct Profile {
    token: String,
}

/// Credential profiles keyed by name.
///
/// An empty store is valid: every lookup fails, which the extractor turns
/// into ACCESS_DENIED per partition, so a harvest without credentials still
/// produces a full (if empty-handed) report.
#[derive(Clone, Default, Deserialize)]
pub struct ProfileStore {
    #[serde(default)]
    profiles: BTreeMap<String, Profile>,
}

impl ProfileStore {
    /// Parses a profile store from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, HarvestError> {
        toml::from_str(text)
            .map_err(|e| HarvestError::Configuration(format!("invalid credentials file: {e}")))
    }

    /// Loads and parses a profile file.
    pub fn load(path: &Path) -> Result<Self, HarvestError> {
        let text = fs::read_to_string(path).map_err(|e| {
            HarvestError::Configuration(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

impl fmt::Debug for ProfileStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Tokens are never printed, only the profile names.
        f.debug_struct("ProfileStore")
            .field("profiles", &self.profiles.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl CredentialResolver for ProfileStore {
    fn resolve(&self, credential_ref: &str) -> Result<Credential, HarvestError> {
        self.profiles
            .get(credential_ref)
            .map(|profile| Credential::new(profile.token.clone()))
            .ok_or_else(|| {
                HarvestError::Configuration(format!(
                    "unknown credential profile '{credential_ref}'"
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [profiles.oc1]
        token = "commercial-token"

        [profiles.oc2]
        token = "dod-token"
    "#;

    #[test]
    fn test_resolves_known_profile() {
        let store = ProfileStore::from_toml_str(SAMPLE).unwrap();
        assert_eq!(store.len(), 2);
        let credential = store.resolve("oc1").unwrap();
        assert_eq!(credential.expose(), "commercial-token");
    }

    #[test]
    fn test_unknown_profile_is_a_configuration_error() {
        let store = ProfileStore::from_toml_str(SAMPLE).unwrap();
        let err = store.resolve("oc9").unwrap_err();
        assert!(err.to_string().contains("unknown credential profile 'oc9'"));
    }

    #[test]
    fn test_default_store_is_empty_and_resolves_nothing() {
        let store = ProfileStore::default();
        assert!(store.is_empty());
        assert!(store.resolve("oc1").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.toml");
        std::fs::write(&path, SAMPLE).unwrap();

        let store = ProfileStore::load(&path).unwrap();
        assert_eq!(store.resolve("oc2").unwrap().expose(), "dod-token");
    }

    #[test]
    fn test_load_missing_file_is_a_configuration_error() {
        let err = ProfileStore::load(Path::new("/nonexistent/credentials.toml")).unwrap_err();
        assert!(matches!(err, HarvestError::Configuration(_)));
        assert!(err.to_string().contains("failed to read"));
    }

    #[test]
    fn test_malformed_toml_is_rejected() {
        let err = ProfileStore::from_toml_str("profiles = 42").unwrap_err();
        assert!(err.to_string().contains("invalid credentials file"));
    }

    #[test]
    fn test_debug_never_prints_tokens() {
        let store = ProfileStore::from_toml_str(SAMPLE).unwrap();
        let printed = format!("{store:?}");
        assert!(printed.contains("oc1"));
        assert!(!printed.contains("commercial-token"));
        assert!(!printed.contains("dod-token"));
    }
}

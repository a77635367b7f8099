//! Error types for the harvest pipeline.

use thiserror::Error;

/// Errors that abort an operation instead of degrading it.
///
/// The harvest deliberately keeps this surface small: anything the catalog
/// service does wrong at runtime (denied access, transport failures, bad
/// payloads) is captured as a [`QueryStatus`](crate::models::QueryStatus) on
/// the partition results and never becomes a `HarvestError`.
#[derive(Error, Debug)]
pub enum HarvestError {
    /// Broken run configuration: invalid registry or credential files,
    /// missing mandatory scopes, duplicate partition names, unresolvable
    /// endpoints.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Artifact files could not be written or read.
    #[error("artifact io error: {0}")]
    ArtifactIo(#[from] std::io::Error),

    /// Artifact payloads could not be serialized or deserialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_includes_context() {
        let err = HarvestError::Configuration("duplicate partition name 'uk-gov'".to_string());
        assert_eq!(
            err.to_string(),
            "configuration error: duplicate partition name 'uk-gov'"
        );
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: HarvestError = io.into();
        assert!(matches!(err, HarvestError::ArtifactIo(_)));
    }
}

//! Seams between the pipeline and the outside world.
//!
//! Extraction code never talks to a concrete HTTP client or credential file
//! directly. It goes through these traits, which is what lets the whole
//! pipeline run against scripted clients in tests, and would let it front a
//! different catalog backend without touching the extractor.

use std::fmt;
use std::future::Future;

use crate::error::HarvestError;
use crate::models::{Partition, QueryKind, QueryResult};

/// Authentication material resolved from a credential reference.
///
/// The inner secret is opaque to the pipeline and only ever handed to the
/// catalog client. `Debug` deliberately redacts it so tokens cannot leak
/// through log lines or panic messages.
#[derive(Clone)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Returns the raw secret for use in an authorization header.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Client bound to a single partition of the catalog service.
///
/// `query` is infallible on purpose: denied access, transport failures and
/// undecodable payloads are all legitimate per-partition outcomes, so they
/// travel inside the [`QueryResult`] instead of an error channel. This keeps
/// one partition's failure from ever looking like a pipeline failure.
pub trait CatalogClient: Send + Sync + Clone {
    /// Issues a single query of the given kind and returns its classified
    /// outcome.
    fn query(&self, kind: &QueryKind) -> impl Future<Output = QueryResult> + Send;
}

/// Factory for creating partition-bound catalog clients.
///
/// Separate from [`CatalogClient`] to avoid issues with async trait
/// constructors.
pub trait CatalogClientFactory: Send + Sync + Clone {
    /// The type of client this factory creates.
    type Client: CatalogClient;

    /// Creates a client for the given partition, resolving its credential
    /// reference.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::Configuration`] when the credential reference
    /// cannot be resolved or the partition endpoint is unusable.
    fn create(&self, partition: &Partition) -> Result<Self::Client, HarvestError>;
}

/// Resolver turning opaque credential references into usable credentials.
pub trait CredentialResolver: Send + Sync + Clone {
    /// Looks up the credential behind a reference.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::Configuration`] when the reference is unknown.
    fn resolve(&self, credential_ref: &str) -> Result<Credential, HarvestError>;
}

//! HTTP client for one partition of the marketplace catalog service.
//!
//! Every partition speaks the same wire protocol; what differs is the
//! endpoint, the credential and the optional tenancy scope, all of which are
//! baked into the client at construction. The client classifies every
//! failure into a [`QueryStatus`] instead of returning errors, because a
//! partition that cannot answer is a normal harvest outcome.

use std::collections::BTreeSet;
use std::future::Future;
use std::time::Duration;

use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::time::sleep;
use tracing::debug;

use sheaf_core::config::HttpConfig;
use sheaf_core::models::{Partition, QueryKind, QueryResult, QueryStatus, Record};
use sheaf_core::traits::{CatalogClient, CatalogClientFactory, Credential, CredentialResolver};
use sheaf_core::HarvestError;

/// Envelope every catalog service response is wrapped in.
///
/// The service always answers with the structure:
/// ```json
/// {
///     "data": [ ... ],
///     "opc-next-page": "cursor-or-absent"
/// }
/// ```
/// A present `opc-next-page` means more pages follow.
#[derive(Deserialize, Debug)]
struct CatalogEnvelope {
    #[serde(default)]
    data: Vec<CatalogEntry>,
    #[serde(rename = "opc-next-page")]
    next_page: Option<String>,
}

/// One raw catalog entry as the service returns it.
///
/// `id` and `name` are the only fields the harvester requires. Everything
/// else uses kebab-case keys owned by the service and is captured in the
/// `extras` map for pass-through.
#[derive(Deserialize, Debug, Clone)]
pub struct CatalogEntry {
    /// Stable identifier, shared across partitions for the same product.
    pub id: String,
    /// Display name of the entry.
    pub name: String,
    /// All other fields (e.g. `categories`, `publisher`, `short-description`).
    #[serde(flatten)]
    pub extras: Map<String, Value>,
}

/// HTTP client bound to a single partition of the catalog service.
#[derive(Debug, Clone)]
pub struct MarketplaceClient {
    http: Client,
    base_url: Url,
    credential: Credential,
    scope_id: Option<String>,
    page_spacing: Duration,
}

impl MarketplaceClient {
    /// Creates a client for the given partition.
    ///
    /// # Arguments
    ///
    /// * `partition` - The partition whose endpoint and scope to use
    /// * `credential` - Resolved authentication material for the partition
    /// * `config` - HTTP timeout configuration
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::Configuration`] if the partition endpoint is
    /// not a valid URL or the HTTP client cannot be built.
    pub fn new(
        partition: &Partition,
        credential: Credential,
        config: &HttpConfig,
    ) -> Result<Self, HarvestError> {
        let base_url = Url::parse(&partition.region_endpoint).map_err(|_| {
            HarvestError::Configuration(format!(
                "invalid endpoint for partition '{}': {}",
                partition.name, partition.region_endpoint
            ))
        })?;

        // Some realms reject clients without an explicit User-Agent.
        let http = Client::builder()
            .user_agent("sheaf/0.1 (catalog-harvester)")
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                HarvestError::Configuration(format!("failed to build http client: {e}"))
            })?;

        Ok(Self {
            http,
            base_url,
            credential,
            scope_id: partition.scope_id.clone(),
            page_spacing: config.page_spacing,
        })
    }

    /// Fetches every page of one query and normalizes the entries.
    ///
    /// Pagination is all-or-nothing: a failure on any page degrades the whole
    /// query to its failure status and no partial records are returned. Page
    /// fetches after the first wait out the configured page spacing.
    async fn fetch_all(&self, kind: &QueryKind) -> QueryResult {
        let mut records: Vec<Record> = Vec::new();
        let mut page: Option<String> = None;
        let mut pages_fetched = 0usize;

        loop {
            if let Some(pause) = self.page_pause(pages_fetched) {
                sleep(pause).await;
            }

            let url = match self.url_for(kind, page.as_deref()) {
                Ok(url) => url,
                Err(e) => {
                    return QueryResult::failure(
                        QueryStatus::TransportError,
                        format!("unusable request url: {e}"),
                    );
                }
            };

            let response = match self
                .http
                .get(url)
                .bearer_auth(self.credential.expose())
                .send()
                .await
            {
                Ok(response) => response,
                Err(e) if e.is_timeout() => {
                    return QueryResult::failure(
                        QueryStatus::TransportError,
                        format!("request timed out: {e}"),
                    );
                }
                Err(e) => {
                    return QueryResult::failure(
                        QueryStatus::TransportError,
                        format!("request failed: {e}"),
                    );
                }
            };

            let status = response.status();
            if let Some(failure) = classify_status(status) {
                return QueryResult::failure(failure, format!("HTTP {status}"));
            }

            let envelope: CatalogEnvelope = match response.json().await {
                Ok(envelope) => envelope,
                Err(e) if e.is_decode() => {
                    return QueryResult::failure(
                        QueryStatus::MalformedResponse,
                        format!("undecodable response: {e}"),
                    );
                }
                Err(e) => {
                    return QueryResult::failure(
                        QueryStatus::TransportError,
                        format!("failed to read response body: {e}"),
                    );
                }
            };

            pages_fetched += 1;
            records.extend(envelope.data.into_iter().map(Self::normalize));

            match envelope.next_page {
                Some(cursor) if !cursor.is_empty() => page = Some(cursor),
                _ => break,
            }
        }

        debug!(
            query = %kind,
            pages = pages_fetched,
            records = records.len(),
            "query finished"
        );
        QueryResult::success(records)
    }

    /// Pause owed before the next page fetch, given how many pages are done.
    /// The first page is never delayed; zero spacing disables pacing.
    fn page_pause(&self, pages_fetched: usize) -> Option<Duration> {
        if pages_fetched == 0 || self.page_spacing.is_zero() {
            None
        } else {
            Some(self.page_spacing)
        }
    }

    fn url_for(&self, kind: &QueryKind, page: Option<&str>) -> Result<Url, String> {
        let mut url = self
            .base_url
            .join(path_for(kind))
            .map_err(|e| e.to_string())?;
        {
            let mut pairs = url.query_pairs_mut();
            if let QueryKind::CategoryFiltered(category) = kind {
                pairs.append_pair("category", category);
            }
            if let Some(scope) = &self.scope_id {
                pairs.append_pair("compartmentId", scope);
            }
            if let Some(cursor) = page {
                pairs.append_pair("page", cursor);
            }
        }
        Ok(url)
    }

    /// Converts a raw catalog entry into the uniform record shape.
    ///
    /// The typed fields are pulled out of the kebab-case source keys; the
    /// remaining attributes pass through untouched. `availability` starts
    /// empty and is populated later by the merge.
    pub fn normalize(entry: CatalogEntry) -> Record {
        let category = category_of(&entry.extras);
        let publisher_id = publisher_of(&entry.extras);
        Record {
            record_id: entry.id,
            name: entry.name,
            category,
            publisher_id,
            attributes: entry.extras,
            availability: BTreeSet::new(),
        }
    }
}

impl CatalogClient for MarketplaceClient {
    fn query(&self, kind: &QueryKind) -> impl Future<Output = QueryResult> + Send {
        self.fetch_all(kind)
    }
}

fn path_for(kind: &QueryKind) -> &'static str {
    match kind {
        QueryKind::Listings | QueryKind::CategoryFiltered(_) => "api/v1/listings",
        QueryKind::StructuredSearch => "api/v1/listings/detailed",
        QueryKind::Publishers => "api/v1/publishers",
    }
}

/// Classifies an HTTP response status: `None` for success, otherwise the
/// query failure it maps to. The service signals a partition closed to the
/// caller as 401, 403 or 404 depending on the realm; every other non-success
/// status is a transport fault.
fn classify_status(status: StatusCode) -> Option<QueryStatus> {
    if status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
        || status == StatusCode::NOT_FOUND
    {
        Some(QueryStatus::AccessDenied)
    } else if status.is_success() {
        None
    } else {
        Some(QueryStatus::TransportError)
    }
}

/// Primary category: first entry of `categories`, falling back to the
/// flattened `category-facet` key some realms use instead.
fn category_of(extras: &Map<String, Value>) -> String {
    if let Some(Value::Array(items)) = extras.get("categories") {
        if let Some(Value::String(first)) = items.first() {
            return first.clone();
        }
    }
    match extras.get("category-facet") {
        Some(Value::String(facet)) => facet.clone(),
        _ => String::new(),
    }
}

/// Publisher identity: `publisher.id` when present, then `publisher.name`,
/// then a bare string `publisher` field.
fn publisher_of(extras: &Map<String, Value>) -> String {
    match extras.get("publisher") {
        Some(Value::Object(publisher)) => {
            for key in ["id", "name"] {
                if let Some(Value::String(value)) = publisher.get(key) {
                    return value.clone();
                }
            }
            String::new()
        }
        Some(Value::String(name)) => name.clone(),
        _ => String::new(),
    }
}

/// Factory producing [`MarketplaceClient`]s, one per partition.
///
/// Credential resolution happens here, at client construction, so an unknown
/// profile surfaces before a single request is made.
#[derive(Debug, Clone)]
pub struct MarketplaceClientFactory<P: CredentialResolver> {
    resolver: P,
    config: HttpConfig,
}

impl<P: CredentialResolver> MarketplaceClientFactory<P> {
    pub fn new(resolver: P, config: HttpConfig) -> Self {
        Self { resolver, config }
    }
}

impl<P: CredentialResolver> CatalogClientFactory for MarketplaceClientFactory<P> {
    type Client = MarketplaceClient;

    fn create(&self, partition: &Partition) -> Result<MarketplaceClient, HarvestError> {
        let credential = self.resolver.resolve(&partition.credential_ref)?;
        MarketplaceClient::new(partition, credential, &self.config)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use sheaf_core::models::RealmClass;

    fn partition(endpoint: &str) -> Partition {
        Partition {
            name: "commercial".to_string(),
            realm_class: RealmClass::Commercial,
            region_endpoint: endpoint.to_string(),
            credential_ref: "oc1".to_string(),
            scope_id: None,
            requires_scope: false,
        }
    }

    fn client(endpoint: &str) -> Result<MarketplaceClient, HarvestError> {
        MarketplaceClient::new(
            &partition(endpoint),
            Credential::new("token"),
            &HttpConfig::default(),
        )
    }

    #[test]
    fn test_new_with_valid_endpoint() {
        let client = client("https://marketplace.us-ashburn-1.oraclecloud.com").unwrap();
        assert_eq!(
            client.base_url.as_str(),
            "https://marketplace.us-ashburn-1.oraclecloud.com/"
        );
    }

    #[test]
    fn test_new_with_invalid_endpoint() {
        let result = client("not-a-valid-url");
        match result {
            Err(HarvestError::Configuration(msg)) => {
                assert!(msg.contains("invalid endpoint"));
                assert!(msg.contains("commercial"));
            }
            other => panic!("expected a configuration error, got {other:?}"),
        }
    }

    #[test]
    fn test_url_for_attaches_category_scope_and_page() {
        let mut p = partition("https://marketplace.example.com");
        p.scope_id = Some("ocid1.compartment.oc1..aaaa".to_string());
        let client =
            MarketplaceClient::new(&p, Credential::new("token"), &HttpConfig::default()).unwrap();

        let kind = QueryKind::CategoryFiltered("security".to_string());
        let url = client.url_for(&kind, Some("cursor-2")).unwrap();

        assert_eq!(url.path(), "/api/v1/listings");
        let query = url.query().unwrap_or_default();
        assert!(query.contains("category=security"));
        assert!(query.contains("compartmentId=ocid1.compartment.oc1..aaaa"));
        assert!(query.contains("page=cursor-2"));
    }

    #[test]
    fn test_paths_per_query_kind() {
        assert_eq!(path_for(&QueryKind::Listings), "api/v1/listings");
        assert_eq!(path_for(&QueryKind::StructuredSearch), "api/v1/listings/detailed");
        assert_eq!(path_for(&QueryKind::Publishers), "api/v1/publishers");
    }

    #[test]
    fn test_envelope_deserialization_with_next_page() {
        let json = r#"{
            "data": [
                {"id": "100", "name": "Gateway"},
                {"id": "101", "name": "Firewall"}
            ],
            "opc-next-page": "AAAA0042"
        }"#;

        let envelope: CatalogEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.data.len(), 2);
        assert_eq!(envelope.next_page.as_deref(), Some("AAAA0042"));
    }

    #[test]
    fn test_envelope_deserialization_last_page() {
        let json = r#"{"data": []}"#;
        let envelope: CatalogEnvelope = serde_json::from_str(json).unwrap();
        assert!(envelope.data.is_empty());
        assert_eq!(envelope.next_page, None);
    }

    #[test]
    fn test_normalize_takes_first_category() {
        let entry: CatalogEntry = serde_json::from_value(json!({
            "id": "100",
            "name": "Gateway",
            "categories": ["networking", "security"],
            "publisher": {"id": "pub-42", "name": "Acme"}
        }))
        .unwrap();

        let record = MarketplaceClient::normalize(entry);
        assert_eq!(record.record_id, "100");
        assert_eq!(record.category, "networking");
        assert_eq!(record.publisher_id, "pub-42");
        assert!(record.availability.is_empty());
    }

    #[test]
    fn test_normalize_falls_back_to_category_facet() {
        let entry: CatalogEntry = serde_json::from_value(json!({
            "id": "101",
            "name": "Scanner",
            "category-facet": "security"
        }))
        .unwrap();

        let record = MarketplaceClient::normalize(entry);
        assert_eq!(record.category, "security");
    }

    #[test]
    fn test_normalize_publisher_fallbacks() {
        let by_name: CatalogEntry = serde_json::from_value(json!({
            "id": "1", "name": "A", "publisher": {"name": "Acme Corp"}
        }))
        .unwrap();
        assert_eq!(MarketplaceClient::normalize(by_name).publisher_id, "Acme Corp");

        let bare_string: CatalogEntry = serde_json::from_value(json!({
            "id": "2", "name": "B", "publisher": "Legacy Vendor"
        }))
        .unwrap();
        assert_eq!(
            MarketplaceClient::normalize(bare_string).publisher_id,
            "Legacy Vendor"
        );

        let absent: CatalogEntry =
            serde_json::from_value(json!({"id": "3", "name": "C"})).unwrap();
        assert_eq!(MarketplaceClient::normalize(absent).publisher_id, "");
    }

    #[test]
    fn test_normalize_preserves_kebab_case_extras() {
        let entry: CatalogEntry = serde_json::from_value(json!({
            "id": "100",
            "name": "Gateway",
            "short-description": "A gateway appliance",
            "pricing": {"type": "BYOL"},
            "is-featured": true
        }))
        .unwrap();

        let record = MarketplaceClient::normalize(entry);
        assert_eq!(
            record.attributes["short-description"],
            json!("A gateway appliance")
        );
        assert_eq!(record.attributes["pricing"]["type"], json!("BYOL"));
        assert_eq!(record.attributes["is-featured"], json!(true));
    }

    #[test]
    fn test_factory_propagates_unknown_profile() {
        #[derive(Clone)]
        struct EmptyResolver;

        impl CredentialResolver for EmptyResolver {
            fn resolve(&self, credential_ref: &str) -> Result<Credential, HarvestError> {
                Err(HarvestError::Configuration(format!(
                    "unknown credential profile '{credential_ref}'"
                )))
            }
        }

        let factory = MarketplaceClientFactory::new(EmptyResolver, HttpConfig::default());
        let err = factory
            .create(&partition("https://marketplace.example.com"))
            .unwrap_err();
        assert!(err.to_string().contains("unknown credential profile 'oc1'"));
    }

    #[test]
    fn test_classify_status_maps_denial_codes_to_access_denied() {
        for code in [401u16, 403, 404] {
            let status = StatusCode::from_u16(code).unwrap();
            assert_eq!(classify_status(status), Some(QueryStatus::AccessDenied));
        }
    }

    #[test]
    fn test_classify_status_passes_success_codes() {
        assert_eq!(classify_status(StatusCode::OK), None);
        assert_eq!(classify_status(StatusCode::NO_CONTENT), None);
    }

    #[test]
    fn test_classify_status_maps_other_failures_to_transport_error() {
        for code in [429u16, 500, 502, 503] {
            let status = StatusCode::from_u16(code).unwrap();
            assert_eq!(classify_status(status), Some(QueryStatus::TransportError));
        }
    }

    #[test]
    fn test_page_pause_skips_the_first_page() {
        let client = client("https://marketplace.example.com").unwrap();
        assert_eq!(client.page_pause(0), None);
        assert_eq!(client.page_pause(1), Some(HttpConfig::default().page_spacing));
        assert_eq!(client.page_pause(7), Some(HttpConfig::default().page_spacing));
    }

    #[test]
    fn test_page_pause_disabled_by_zero_spacing() {
        let config = HttpConfig {
            page_spacing: Duration::ZERO,
            ..HttpConfig::default()
        };
        let client = MarketplaceClient::new(
            &partition("https://marketplace.example.com"),
            Credential::new("token"),
            &config,
        )
        .unwrap();
        assert_eq!(client.page_pause(3), None);
    }
}

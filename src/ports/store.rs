use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for relational store reads
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum StoreError {
    /// Error when the store cannot be reached
    #[error("Connection error: {0}")]
    Connect(String),

    /// Error when a query or row scan fails
    #[error("{operation} failed: {source}")]
    Query {
        /// The read operation that failed (e.g. "querying delivery services")
        operation: &'static str,
        /// The underlying driver error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Error when an offline snapshot is malformed
    #[error("Invalid store snapshot: {0}")]
    Snapshot(String),

    /// Error when reading a snapshot file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Wrap a driver error with the name of the read operation that produced it.
    pub fn query(
        operation: &'static str,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Query {
            operation,
            source: Box::new(source),
        }
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// One active delivery service joined to its type and profile names.
///
/// Every nullable column stays an `Option` so the decoder can apply its
/// column-specific defaulting rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryServiceRow {
    pub xml_id: String,
    pub miss_lat: Option<f64>,
    pub miss_long: Option<f64>,
    pub protocol: Option<i64>,
    pub ttl: Option<i64>,
    pub routing_name: Option<String>,
    pub geo_provider: Option<i64>,
    #[serde(rename = "type")]
    pub type_name: String,
    pub geo_limit: Option<i64>,
    pub geo_limit_countries: Option<String>,
    pub geolimit_redirect_url: Option<String>,
    pub initial_dispersion: Option<i64>,
    pub regional_geo_blocking: bool,
    pub max_dns_answers: Option<i64>,
    pub profile: Option<String>,
    pub dns_bypass_ip: Option<String>,
    pub dns_bypass_ip6: Option<String>,
    pub dns_bypass_ttl: Option<i64>,
    pub dns_bypass_cname: Option<String>,
    pub http_bypass_fqdn: Option<String>,
    pub ipv6_routing_enabled: Option<bool>,
    pub deep_caching_type: Option<String>,
    pub tr_request_headers: Option<String>,
    pub tr_response_headers: Option<String>,
    pub anonymous_blocking_enabled: bool,
}

/// A regex attached to a delivery service, with the names of both type rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegexRow {
    pub xml_id: String,
    pub pattern: String,
    /// Regex type name, e.g. `HOST_REGEXP`
    pub regex_type: String,
    /// Delivery service type name, e.g. `DNS_LIVE` or `HTTP`
    pub ds_type: String,
    /// Match-set index; a null set number is read as 0
    #[serde(default)]
    pub set_number: i64,
}

/// A static DNS override record for an active delivery service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticDnsRow {
    pub xml_id: String,
    pub host: String,
    pub ttl: i64,
    pub address: String,
    /// Type name, e.g. `CNAME_RECORD`
    pub record_type: String,
}

/// A parameter of a profile attached to at least one server of the CDN.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileParameterRow {
    pub profile: String,
    pub name: String,
    pub value: String,
}

/// CrConfigStore defines the port (interface) for the read-only queries a
/// synthesis run issues. Each method is parameterized by CDN name.
///
/// All four reads of one run are expected to observe the same state; adapters
/// backed by a live database should serve them from a single snapshot.
#[async_trait]
pub trait CrConfigStore: Send + Sync {
    /// Active delivery services of the CDN.
    async fn delivery_services(&self, cdn: &str) -> StoreResult<Vec<DeliveryServiceRow>>;

    /// Static DNS entries of the CDN's active delivery services, in storage order.
    async fn static_dns_entries(&self, cdn: &str) -> StoreResult<Vec<StaticDnsRow>>;

    /// Regexes of the CDN's active delivery services, ordered by set number ascending.
    async fn regexes(&self, cdn: &str) -> StoreResult<Vec<RegexRow>>;

    /// Parameters of every profile attached to a server in the CDN.
    async fn server_profile_parameters(&self, cdn: &str) -> StoreResult<Vec<ProfileParameterRow>>;
}

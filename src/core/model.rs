//! Output types of a synthesis run.
//!
//! These map directly onto the JSON document traffic routers consume. Field
//! names and encodings (booleans rendered as `"true"`/`"false"` strings, the
//! `match-type` key, `long` for longitude) follow the router wire format, so
//! serialization is part of the contract. Every map is a `BTreeMap` to keep the
//! rendered document byte-for-byte stable for the same input.
use std::{collections::BTreeMap, fmt, sync::Arc};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

/// Minimum TTL advertised in the CDN SOA record.
pub const CDN_SOA_MINIMUM_SECS: u64 = 30;
/// Expire interval of the CDN SOA record (7 days).
pub const CDN_SOA_EXPIRE_SECS: u64 = 604_800;
/// Retry interval of the CDN SOA record (2 hours).
pub const CDN_SOA_RETRY_SECS: u64 = 7_200;
/// Refresh interval of the CDN SOA record (8 hours).
pub const CDN_SOA_REFRESH_SECS: u64 = 28_800;
/// Administrative contact of the CDN SOA record.
pub const CDN_SOA_ADMIN: &str = "traffic_ops";
/// Default TTL of the top-level SOA record.
pub const DEFAULT_TLD_TTL_SOA_SECS: i64 = 86_400;
/// Default TTL of the top-level NS records.
pub const DEFAULT_TLD_TTL_NS_SECS: i64 = 3_600;

fn serialize_bool_str<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(if *value { "true" } else { "false" })
}

fn serialize_i64_str<S: Serializer>(value: &i64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.to_string())
}

fn is_true(value: &bool) -> bool {
    *value
}

/// Routing axis of a delivery service, derived from its type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RoutingAxis {
    Dns,
    Http,
}

impl RoutingAxis {
    /// Types whose name begins with `DNS` are DNS-routed; everything else is HTTP-routed.
    pub fn from_type_name(type_name: &str) -> Self {
        if type_name.starts_with("DNS") {
            RoutingAxis::Dns
        } else {
            RoutingAxis::Http
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingAxis::Dns => "DNS",
            RoutingAxis::Http => "HTTP",
        }
    }
}

impl fmt::Display for RoutingAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request attribute a match entry is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MatchType {
    Host,
    Path,
    Header,
}

impl MatchType {
    /// Classify a regex type name. Non-routing types (e.g. `STEERING_REGEXP`) yield `None`.
    pub fn from_regex_type(regex_type: &str) -> Option<Self> {
        match regex_type {
            "HOST_REGEXP" => Some(MatchType::Host),
            "PATH_REGEXP" => Some(MatchType::Path),
            "HEADER_REGEXP" => Some(MatchType::Header),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchEntry {
    pub regex: String,
    #[serde(rename = "match-type")]
    pub match_type: MatchType,
}

/// An ordered group of match entries. Placeholder slots in a delivery
/// service's match-set list are `MatchSet::default()`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MatchSet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<RoutingAxis>,
    #[serde(rename = "matchlist")]
    pub match_list: Vec<MatchEntry>,
}

impl MatchSet {
    pub fn is_empty(&self) -> bool {
        self.match_list.is_empty()
    }
}

/// Accepted schemes and HTTPS redirect behaviour of a delivery service.
///
/// Routers treat a missing `acceptHttp` as true, so it is only rendered when false.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolPolicy {
    #[serde(
        serialize_with = "serialize_bool_str",
        skip_serializing_if = "is_true"
    )]
    pub accept_http: bool,
    #[serde(serialize_with = "serialize_bool_str")]
    pub accept_https: bool,
    #[serde(serialize_with = "serialize_bool_str")]
    pub redirect_on_https: bool,
}

impl ProtocolPolicy {
    pub const HTTP_ONLY: Self = Self::new(true, false, false);
    pub const HTTPS_ONLY: Self = Self::new(false, true, false);
    pub const HTTP_AND_HTTPS: Self = Self::new(true, true, false);
    pub const HTTP_TO_HTTPS: Self = Self::new(true, true, true);

    const fn new(accept_http: bool, accept_https: bool, redirect_on_https: bool) -> Self {
        Self {
            accept_http,
            accept_https,
            redirect_on_https,
        }
    }

    /// Map the stored protocol code. Null and unknown codes fall back to code 0.
    pub fn from_code(code: Option<i64>) -> Self {
        match code {
            Some(1) => Self::HTTPS_ONLY,
            Some(2) => Self::HTTP_AND_HTTPS,
            Some(3) => Self::HTTP_TO_HTTPS,
            _ => Self::HTTP_ONLY,
        }
    }
}

impl Default for ProtocolPolicy {
    fn default() -> Self {
        Self::HTTP_ONLY
    }
}

/// Geolocation service a router consults for this delivery service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum GeoProvider {
    #[default]
    #[serde(rename = "maxmindGeolocationService")]
    Maxmind,
    #[serde(rename = "neustarGeolocationService")]
    Neustar,
}

impl GeoProvider {
    /// Null and unknown codes fall back to code 0 (MaxMind).
    pub fn from_code(code: Option<i64>) -> Self {
        match code {
            Some(1) => GeoProvider::Neustar,
            _ => GeoProvider::Maxmind,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeepCachingType {
    #[default]
    Never,
    Always,
    Invalid,
}

impl DeepCachingType {
    /// Case-insensitive; the empty string means `NEVER`, anything unrecognised is `INVALID`.
    pub fn from_column(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "always" => DeepCachingType::Always,
            "never" | "" => DeepCachingType::Never,
            _ => DeepCachingType::Invalid,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MissLocation {
    pub lat: f64,
    #[serde(rename = "long")]
    pub lon: f64,
}

/// CDN-wide start-of-authority parameters, shared by every delivery service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Soa {
    pub admin: String,
    pub expire: String,
    pub minimum: String,
    pub refresh: String,
    pub retry: String,
}

impl Soa {
    pub fn cdn_default() -> Self {
        Self {
            admin: CDN_SOA_ADMIN.to_string(),
            expire: CDN_SOA_EXPIRE_SECS.to_string(),
            minimum: CDN_SOA_MINIMUM_SECS.to_string(),
            refresh: CDN_SOA_REFRESH_SECS.to_string(),
            retry: CDN_SOA_RETRY_SECS.to_string(),
        }
    }
}

impl Default for Soa {
    fn default() -> Self {
        Self::cdn_default()
    }
}

/// Per-record-type TTLs of a delivery service, in seconds, rendered as strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Ttls {
    #[serde(rename = "A")]
    pub a: String,
    #[serde(rename = "AAAA")]
    pub aaaa: String,
    #[serde(rename = "NS")]
    pub ns: String,
    #[serde(rename = "SOA")]
    pub soa: String,
}

/// CDN-wide TTL defaults for the top-level NS and SOA records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TtlDefaults {
    #[serde(rename = "NS")]
    pub ns: String,
    #[serde(rename = "SOA")]
    pub soa: String,
}

impl Default for TtlDefaults {
    fn default() -> Self {
        Self {
            ns: DEFAULT_TLD_TTL_NS_SECS.to_string(),
            soa: DEFAULT_TLD_TTL_SOA_SECS.to_string(),
        }
    }
}

/// Fallback target handed to clients when cache routing cannot serve a request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BypassDestination {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip6: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fqdn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
}

impl BypassDestination {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Dispersion {
    #[serde(serialize_with = "serialize_i64_str")]
    pub limit: i64,
    #[serde(serialize_with = "serialize_bool_str")]
    pub shuffled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoEnabled {
    pub country_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StaticDnsEntry {
    pub name: String,
    pub ttl: i64,
    pub value: String,
    #[serde(rename = "type")]
    pub record_type: String,
}

/// Complete routing configuration of one delivery service.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryService {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anonymous_blocking_enabled: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub bypass_destination: BTreeMap<RoutingAxis, BypassDestination>,
    #[serde(serialize_with = "serialize_bool_str")]
    pub coverage_zone_only: bool,
    pub deep_caching_type: DeepCachingType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispersion: Option<Dispersion>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub domains: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub geo_enabled: Vec<GeoEnabled>,
    #[serde(rename = "geoLimitRedirectURL", skip_serializing_if = "Option::is_none")]
    pub geo_limit_redirect_url: Option<String>,
    #[serde(rename = "geolocationProvider")]
    pub geolocation_provider: GeoProvider,
    #[serde(serialize_with = "serialize_bool_str")]
    pub ip6_routing_enabled: bool,
    #[serde(rename = "matchsets", skip_serializing_if = "Vec::is_empty")]
    pub match_sets: Vec<MatchSet>,
    #[serde(rename = "maxDnsIpsForLocation", skip_serializing_if = "Option::is_none")]
    pub max_dns_ips_for_location: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub miss_location: Option<MissLocation>,
    pub protocol: ProtocolPolicy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regional_geo_blocking: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub request_headers: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub response_headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routing_name: Option<String>,
    pub soa: Arc<Soa>,
    #[serde(serialize_with = "serialize_bool_str")]
    pub ssl_enabled: bool,
    #[serde(rename = "staticDnsEntries", skip_serializing_if = "Vec::is_empty")]
    pub static_dns_entries: Vec<StaticDnsEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<i64>,
    pub ttls: Ttls,
}

/// Provenance of a generated document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentStats {
    pub cdn_name: String,
    pub domain_name: String,
    pub generated_at: DateTime<Utc>,
}

/// The consolidated routing configuration of one CDN.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrConfigDocument {
    /// Resolved CDN-wide parameters
    pub config: BTreeMap<String, String>,
    /// Delivery service records keyed by xml id
    pub delivery_services: BTreeMap<String, DeliveryService>,
    pub soa: Arc<Soa>,
    pub ttls: TtlDefaults,
    pub stats: DocumentStats,
}

impl CrConfigDocument {
    /// Render as compact JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Render as indented JSON.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_codes_map_to_fixed_policies() {
        assert_eq!(ProtocolPolicy::from_code(None), ProtocolPolicy::HTTP_ONLY);
        assert_eq!(ProtocolPolicy::from_code(Some(0)), ProtocolPolicy::HTTP_ONLY);
        assert_eq!(ProtocolPolicy::from_code(Some(1)), ProtocolPolicy::HTTPS_ONLY);
        assert_eq!(
            ProtocolPolicy::from_code(Some(2)),
            ProtocolPolicy::HTTP_AND_HTTPS
        );
        assert_eq!(ProtocolPolicy::from_code(Some(3)), ProtocolPolicy::HTTP_TO_HTTPS);
        assert_eq!(ProtocolPolicy::from_code(Some(9)), ProtocolPolicy::HTTP_ONLY);
    }

    #[test]
    fn protocol_omits_accept_http_when_true() {
        let json = serde_json::to_value(ProtocolPolicy::HTTP_TO_HTTPS).unwrap();
        assert!(json.get("acceptHttp").is_none());
        assert_eq!(json["acceptHttps"], "true");
        assert_eq!(json["redirectOnHttps"], "true");

        let json = serde_json::to_value(ProtocolPolicy::HTTPS_ONLY).unwrap();
        assert_eq!(json["acceptHttp"], "false");
    }

    #[test]
    fn geo_provider_wire_names() {
        assert_eq!(
            serde_json::to_value(GeoProvider::from_code(Some(1))).unwrap(),
            "neustarGeolocationService"
        );
        assert_eq!(
            serde_json::to_value(GeoProvider::from_code(None)).unwrap(),
            "maxmindGeolocationService"
        );
    }

    #[test]
    fn routing_axis_from_type_name() {
        assert_eq!(RoutingAxis::from_type_name("DNS"), RoutingAxis::Dns);
        assert_eq!(RoutingAxis::from_type_name("DNS_LIVE_NATNL"), RoutingAxis::Dns);
        assert_eq!(RoutingAxis::from_type_name("HTTP_LIVE"), RoutingAxis::Http);
        assert_eq!(RoutingAxis::from_type_name("STEERING"), RoutingAxis::Http);
    }

    #[test]
    fn deep_caching_type_parsing() {
        assert_eq!(DeepCachingType::from_column("ALWAYS"), DeepCachingType::Always);
        assert_eq!(DeepCachingType::from_column("never"), DeepCachingType::Never);
        assert_eq!(DeepCachingType::from_column(""), DeepCachingType::Never);
        assert_eq!(DeepCachingType::from_column("sometimes"), DeepCachingType::Invalid);
    }

    #[test]
    fn soa_defaults_render_as_seconds() {
        let json = serde_json::to_value(Soa::cdn_default()).unwrap();
        assert_eq!(json["admin"], "traffic_ops");
        assert_eq!(json["expire"], "604800");
        assert_eq!(json["minimum"], "30");
        assert_eq!(json["refresh"], "28800");
        assert_eq!(json["retry"], "7200");
    }

    #[test]
    fn dispersion_and_miss_location_wire_names() {
        let json = serde_json::to_value(Dispersion {
            limit: 3,
            shuffled: true,
        })
        .unwrap();
        assert_eq!(json["limit"], "3");
        assert_eq!(json["shuffled"], "true");

        let json = serde_json::to_value(MissLocation {
            lat: 12.3,
            lon: 45.6,
        })
        .unwrap();
        assert_eq!(json["lat"], 12.3);
        assert_eq!(json["long"], 45.6);
    }

    #[test]
    fn empty_match_set_renders_empty_list() {
        let json = serde_json::to_value(MatchSet::default()).unwrap();
        assert_eq!(json, serde_json::json!({ "matchlist": [] }));
    }
}

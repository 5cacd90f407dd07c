//! Decoding of one denormalized delivery-service row into its routing record.
//!
//! `decode` is a pure function of the row and the maps precomputed for the run.
//! The defaulting rules below are relied on by deployed routers and are kept
//! exactly, including the places where one column is null-checked and its
//! neighbour is not:
//!
//! * geo-limit is read without a null check (null behaves like 0), and the
//!   redirect URL is attached as an empty string when null;
//! * the deep-caching type is only parsed when the column is non-null.
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use crate::{
    core::{
        diagnostics::{Coordinate, Diagnostic, Diagnostics},
        error::{SynthesisError, SynthesisResult},
        matchsets::RoutingRules,
        model::{
            BypassDestination, DEFAULT_TLD_TTL_NS_SECS, DEFAULT_TLD_TTL_SOA_SECS, DeepCachingType,
            DeliveryService, Dispersion, GeoEnabled, GeoProvider, MissLocation, ProtocolPolicy,
            RoutingAxis, Soa, StaticDnsEntry, Ttls,
        },
        params::{PARAM_TTL_NS, PARAM_TTL_SOA, ResolvedParameters},
    },
    ports::store::DeliveryServiceRow,
};

/// Delimiter between `name: value` pairs in the header rewrite columns.
pub const HEADER_DELIMITER: &str = "__RETURN__";

const GEO_LIMIT_NONE: i64 = 0;
const GEO_LIMIT_CZF_ONLY: i64 = 1;

/// Everything the decoder reads besides the row itself.
#[derive(Debug, Clone, Copy)]
pub struct DecodeContext<'a> {
    pub params: &'a ResolvedParameters,
    pub rules: &'a RoutingRules,
    pub static_dns: &'a HashMap<String, Vec<StaticDnsEntry>>,
    pub soa: &'a Arc<Soa>,
}

/// Decode one row. Non-fatal conditions go to `diagnostics`; an inconsistent
/// row is a fatal error for the whole run.
pub fn decode(
    row: &DeliveryServiceRow,
    ctx: &DecodeContext<'_>,
    diagnostics: &mut Diagnostics,
) -> SynthesisResult<DeliveryService> {
    let xml_id = row.xml_id.as_str();
    if xml_id.trim().is_empty() {
        return Err(SynthesisError::decode(
            xml_id,
            format!("delivery service of type '{}' has an empty xml id", row.type_name),
        ));
    }

    let axis = RoutingAxis::from_type_name(&row.type_name);
    let protocol = ProtocolPolicy::from_code(row.protocol);

    let mut ds = DeliveryService {
        anonymous_blocking_enabled: None,
        bypass_destination: BTreeMap::new(),
        coverage_zone_only: false,
        deep_caching_type: DeepCachingType::default(),
        dispersion: None,
        domains: Vec::new(),
        geo_enabled: Vec::new(),
        geo_limit_redirect_url: None,
        geolocation_provider: GeoProvider::from_code(row.geo_provider),
        ip6_routing_enabled: row.ipv6_routing_enabled.unwrap_or(false),
        match_sets: Vec::new(),
        max_dns_ips_for_location: None,
        miss_location: decode_miss_location(row, diagnostics),
        protocol,
        regional_geo_blocking: None,
        request_headers: Vec::new(),
        response_headers: BTreeMap::new(),
        routing_name: row.routing_name.clone(),
        soa: Arc::clone(ctx.soa),
        ssl_enabled: protocol.accept_https,
        static_dns_entries: Vec::new(),
        ttl: row.ttl,
        ttls: decode_ttls(row, ctx.params, diagnostics),
    };

    if let Some(deep_caching_type) = &row.deep_caching_type {
        ds.deep_caching_type = DeepCachingType::from_column(deep_caching_type);
    }

    match ctx.rules.match_sets.get(xml_id) {
        Some(match_sets) => ds.match_sets = match_sets.clone(),
        None => diagnostics.record(Diagnostic::MissingMatchSets {
            xml_id: xml_id.to_string(),
        }),
    }
    match ctx.rules.domains.get(xml_id) {
        Some(domains) => ds.domains = domains.clone(),
        None => diagnostics.record(Diagnostic::MissingDomains {
            xml_id: xml_id.to_string(),
        }),
    }

    apply_geo_limit(&mut ds, row, axis);

    match axis {
        RoutingAxis::Dns => apply_dns_fields(&mut ds, row),
        RoutingAxis::Http => apply_http_fields(&mut ds, row),
    }

    if let Some(headers) = non_empty(&row.tr_response_headers) {
        ds.response_headers = parse_response_headers(headers);
    }
    if let Some(headers) = non_empty(&row.tr_request_headers) {
        ds.request_headers = parse_request_headers(headers);
    }

    match ctx.static_dns.get(xml_id) {
        Some(entries) => ds.static_dns_entries = entries.clone(),
        None => tracing::debug!(delivery_service = xml_id, "no static DNS entries"),
    }

    Ok(ds)
}

fn non_empty(column: &Option<String>) -> Option<&str> {
    column.as_deref().filter(|value| !value.is_empty())
}

fn decode_miss_location(
    row: &DeliveryServiceRow,
    diagnostics: &mut Diagnostics,
) -> Option<MissLocation> {
    match (row.miss_lat, row.miss_long) {
        (Some(lat), Some(lon)) => Some(MissLocation { lat, lon }),
        (Some(_), None) => {
            diagnostics.record(Diagnostic::PartialMissLocation {
                xml_id: row.xml_id.clone(),
                present: Coordinate::Latitude,
            });
            None
        }
        (None, Some(_)) => {
            diagnostics.record(Diagnostic::PartialMissLocation {
                xml_id: row.xml_id.clone(),
                present: Coordinate::Longitude,
            });
            None
        }
        (None, None) => None,
    }
}

/// NS/SOA start from the CDN defaults and take a resolved override only when
/// it parses as an integer. A and AAAA both carry the row's own TTL.
fn decode_ttls(
    row: &DeliveryServiceRow,
    params: &ResolvedParameters,
    diagnostics: &mut Diagnostics,
) -> Ttls {
    let ns = ttl_override(row, params, PARAM_TTL_NS, DEFAULT_TLD_TTL_NS_SECS, diagnostics);
    let soa = ttl_override(row, params, PARAM_TTL_SOA, DEFAULT_TLD_TTL_SOA_SECS, diagnostics);
    let record_ttl = row.ttl.map(|ttl| ttl.to_string()).unwrap_or_default();

    Ttls {
        a: record_ttl.clone(),
        aaaa: record_ttl,
        ns: ns.to_string(),
        soa: soa.to_string(),
    }
}

fn ttl_override(
    row: &DeliveryServiceRow,
    params: &ResolvedParameters,
    parameter: &str,
    default: i64,
    diagnostics: &mut Diagnostics,
) -> i64 {
    let Some(value) = params.get(parameter) else {
        return default;
    };
    match value.parse::<i64>() {
        Ok(seconds) => seconds,
        Err(_) => {
            diagnostics.record(Diagnostic::MalformedTtlParameter {
                xml_id: row.xml_id.clone(),
                profile: row.profile.clone(),
                parameter: parameter.to_string(),
                value: value.to_string(),
            });
            default
        }
    }
}

fn apply_geo_limit(ds: &mut DeliveryService, row: &DeliveryServiceRow, axis: RoutingAxis) {
    let redirect_url = || row.geolimit_redirect_url.clone().unwrap_or_default();

    match row.geo_limit.unwrap_or(GEO_LIMIT_NONE) {
        GEO_LIMIT_NONE => ds.coverage_zone_only = false,
        GEO_LIMIT_CZF_ONLY => {
            ds.coverage_zone_only = true;
            if axis == RoutingAxis::Http {
                ds.geo_limit_redirect_url = Some(redirect_url());
            }
        }
        _ => {
            ds.coverage_zone_only = false;
            if axis == RoutingAxis::Http {
                ds.geo_limit_redirect_url = Some(redirect_url());
            }
            if let Some(countries) = &row.geo_limit_countries {
                ds.geo_enabled = countries
                    .split(',')
                    .map(|code| GeoEnabled {
                        country_code: code.trim().to_string(),
                    })
                    .collect();
            }
        }
    }
}

fn apply_dns_fields(ds: &mut DeliveryService, row: &DeliveryServiceRow) {
    let bypass = BypassDestination {
        ip: non_empty(&row.dns_bypass_ip).map(str::to_string),
        ip6: non_empty(&row.dns_bypass_ip6).map(str::to_string),
        ttl: row.dns_bypass_ttl,
        cname: non_empty(&row.dns_bypass_cname).map(str::to_string),
        ..BypassDestination::default()
    };
    if !bypass.is_empty() {
        ds.bypass_destination.insert(RoutingAxis::Dns, bypass);
    }
    ds.max_dns_ips_for_location = row.max_dns_answers;
}

fn apply_http_fields(ds: &mut DeliveryService, row: &DeliveryServiceRow) {
    if let Some(fqdn) = non_empty(&row.http_bypass_fqdn) {
        let bypass = match fqdn.split_once(':') {
            Some((host, port)) => BypassDestination {
                fqdn: Some(host.to_string()),
                port: Some(port.to_string()),
                ..BypassDestination::default()
            },
            None => BypassDestination {
                fqdn: Some(fqdn.to_string()),
                ..BypassDestination::default()
            },
        };
        ds.bypass_destination.insert(RoutingAxis::Http, bypass);
    }

    ds.regional_geo_blocking = Some(row.regional_geo_blocking.to_string());
    ds.anonymous_blocking_enabled = Some(row.anonymous_blocking_enabled.to_string());
    ds.dispersion = row.initial_dispersion.map(|limit| Dispersion {
        limit,
        shuffled: true,
    });
}

fn split_header(piece: &str) -> (&str, &str) {
    let (name, value) = piece.split_once(':').unwrap_or((piece, ""));
    (name.trim(), value.trim_matches(|c: char| c.is_whitespace() || c == '"'))
}

/// `"X-A: 1__RETURN__X-B: 2"` → `{"X-A": "1", "X-B": "2"}`; a repeated name keeps the last value.
pub fn parse_response_headers(column: &str) -> BTreeMap<String, String> {
    column
        .split(HEADER_DELIMITER)
        .map(split_header)
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect()
}

/// Header names only, in column order.
pub fn parse_request_headers(column: &str) -> Vec<String> {
    column
        .split(HEADER_DELIMITER)
        .map(|piece| split_header(piece).0.to_string())
        .collect()
}

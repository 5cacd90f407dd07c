//! CDN-wide delivery-service parameter resolution.
//!
//! Parameters live on server profiles. Only a fixed allow-list of names is
//! relevant to delivery services, and for those every profile attached to a
//! server of the CDN must agree: two different values is a hard error rather
//! than last-write-wins.
use std::collections::{BTreeMap, HashMap};

use crate::{
    core::error::{SynthesisError, SynthesisResult},
    ports::store::{CrConfigStore, ProfileParameterRow},
};

pub const PARAM_SOA_ADMIN: &str = "tld.soa.admin";
pub const PARAM_SOA_EXPIRE: &str = "tld.soa.expire";
pub const PARAM_SOA_MINIMUM: &str = "tld.soa.minimum";
pub const PARAM_SOA_REFRESH: &str = "tld.soa.refresh";
pub const PARAM_SOA_RETRY: &str = "tld.soa.retry";
pub const PARAM_TTL_SOA: &str = "tld.ttls.SOA";
pub const PARAM_TTL_NS: &str = "tld.ttls.NS";
pub const PARAM_LOG_REQUEST_HEADERS: &str = "LogRequestHeaders";

/// Parameter names merged into the resolved set.
pub const DS_PARAMETER_NAMES: [&str; 8] = [
    PARAM_SOA_ADMIN,
    PARAM_SOA_EXPIRE,
    PARAM_SOA_MINIMUM,
    PARAM_SOA_REFRESH,
    PARAM_SOA_RETRY,
    PARAM_TTL_SOA,
    PARAM_TTL_NS,
    PARAM_LOG_REQUEST_HEADERS,
];

/// profile name → (parameter name → value). Sorted by profile so every scan
/// visits profiles in the same order.
pub type ProfileParameters = BTreeMap<String, HashMap<String, String>>;

/// Flat, conflict-free parameter mapping valid for a whole CDN.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedParameters {
    values: BTreeMap<String, String>,
}

impl ResolvedParameters {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn into_map(self) -> BTreeMap<String, String> {
        self.values
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ResolvedParameters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Group parameter rows by profile. A repeated (profile, name) pair keeps the last value.
pub fn group_by_profile(rows: Vec<ProfileParameterRow>) -> ProfileParameters {
    let mut profiles = ProfileParameters::new();
    for row in rows {
        profiles
            .entry(row.profile)
            .or_default()
            .insert(row.name, row.value);
    }
    profiles
}

/// Merge the allow-listed parameters of every profile.
///
/// One pass keeps, per parameter, the first value seen and the profile it came
/// from; a later profile with a different value fails with both sides named.
pub fn resolve(profiles: &ProfileParameters) -> SynthesisResult<ResolvedParameters> {
    let mut resolved: BTreeMap<String, (&str, &str)> = BTreeMap::new();

    for (profile, params) in profiles {
        for name in DS_PARAMETER_NAMES {
            let Some(value) = params.get(name) else {
                continue;
            };
            match resolved.get(name) {
                Some((seen_value, seen_profile)) if *seen_value != value.as_str() => {
                    return Err(SynthesisError::ParameterConflict {
                        parameter: name.to_string(),
                        profile: (*seen_profile).to_string(),
                        value: (*seen_value).to_string(),
                        other_profile: profile.clone(),
                        other_value: value.clone(),
                    });
                }
                Some(_) => {}
                None => {
                    resolved.insert(name.to_string(), (value.as_str(), profile.as_str()));
                }
            }
        }
    }

    Ok(resolved
        .into_iter()
        .map(|(name, (value, _))| (name, value))
        .collect())
}

/// Fetch the server profile parameters of `cdn` and resolve them.
pub async fn resolve_parameters(
    store: &dyn CrConfigStore,
    cdn: &str,
) -> SynthesisResult<ResolvedParameters> {
    let rows = store.server_profile_parameters(cdn).await?;
    tracing::debug!(rows = rows.len(), "fetched server profile parameters");
    let profiles = group_by_profile(rows);
    let resolved = resolve(&profiles)?;
    tracing::debug!(
        profiles = profiles.len(),
        resolved = resolved.len(),
        "resolved delivery service parameters"
    );
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(profile: &str, name: &str, value: &str) -> ProfileParameterRow {
        ProfileParameterRow {
            profile: profile.to_string(),
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn merges_allow_listed_parameters_only() {
        let profiles = group_by_profile(vec![
            row("EDGE", PARAM_TTL_SOA, "12345"),
            row("EDGE", "health.threshold.loadavg", "25"),
            row("MID", PARAM_TTL_NS, "60"),
        ]);

        let resolved = resolve(&profiles).unwrap();
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved.get(PARAM_TTL_SOA), Some("12345"));
        assert_eq!(resolved.get(PARAM_TTL_NS), Some("60"));
        assert_eq!(resolved.get("health.threshold.loadavg"), None);
    }

    #[test]
    fn agreeing_profiles_resolve() {
        let profiles = group_by_profile(vec![
            row("EDGE", PARAM_SOA_ADMIN, "ops"),
            row("MID", PARAM_SOA_ADMIN, "ops"),
        ]);
        assert_eq!(resolve(&profiles).unwrap().get(PARAM_SOA_ADMIN), Some("ops"));
    }

    #[test]
    fn conflicting_profiles_fail_with_both_sides() {
        let profiles = group_by_profile(vec![
            row("EDGE_B", PARAM_SOA_ADMIN, "b"),
            row("EDGE_A", PARAM_SOA_ADMIN, "a"),
        ]);

        match resolve(&profiles) {
            Err(SynthesisError::ParameterConflict {
                parameter,
                profile,
                value,
                other_profile,
                other_value,
            }) => {
                assert_eq!(parameter, PARAM_SOA_ADMIN);
                assert_eq!((profile.as_str(), value.as_str()), ("EDGE_A", "a"));
                assert_eq!((other_profile.as_str(), other_value.as_str()), ("EDGE_B", "b"));
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn resolution_is_independent_of_row_order() {
        let rows = vec![
            row("P1", PARAM_TTL_SOA, "100"),
            row("P2", PARAM_TTL_NS, "50"),
            row("P3", PARAM_TTL_SOA, "100"),
            row("P3", PARAM_LOG_REQUEST_HEADERS, "X-Trace"),
        ];
        let expected = resolve(&group_by_profile(rows.clone())).unwrap();

        let mut reversed = rows.clone();
        reversed.reverse();
        assert_eq!(resolve(&group_by_profile(reversed)).unwrap(), expected);

        let mut rotated = rows;
        rotated.rotate_left(2);
        assert_eq!(resolve(&group_by_profile(rotated)).unwrap(), expected);
    }

    #[test]
    fn conflict_report_is_independent_of_row_order() {
        let rows = vec![
            row("P1", PARAM_TTL_NS, "1"),
            row("P2", PARAM_TTL_NS, "2"),
            row("P3", PARAM_TTL_NS, "3"),
        ];
        let first = resolve(&group_by_profile(rows.clone())).unwrap_err().to_string();

        let mut reversed = rows;
        reversed.reverse();
        let second = resolve(&group_by_profile(reversed)).unwrap_err().to_string();
        assert_eq!(first, second);
    }
}

//! Reconstruction of per-delivery-service match-set lists from regex rows.
use std::collections::HashMap;

use crate::{
    core::{
        diagnostics::{Diagnostic, Diagnostics},
        error::{SynthesisError, SynthesisResult},
        model::{MatchEntry, MatchSet, MatchType, RoutingAxis},
    },
    ports::store::{CrConfigStore, RegexRow},
};

/// Largest accepted regex set number. The match-set list is dense, so a
/// larger index would allocate that many placeholder slots.
pub const MAX_MATCH_SET_INDEX: usize = 1023;

/// Match-sets and derived routing domains, keyed by delivery service xml id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoutingRules {
    pub match_sets: HashMap<String, Vec<MatchSet>>,
    pub domains: HashMap<String, Vec<String>>,
}

/// Turn a host regex into a plain host label by dropping `\`, `.*` and `.`,
/// then append the CDN domain: `\.example\..*` + `cdn.example.com` becomes
/// `example.cdn.example.com`.
pub fn host_pattern_to_domain(pattern: &str, domain: &str) -> String {
    let mut host = String::with_capacity(pattern.len() + domain.len() + 1);
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {}
            '.' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                }
            }
            _ => host.push(c),
        }
    }
    host.push('.');
    host.push_str(domain);
    host
}

/// Build dense match-set lists from rows ordered by set number.
///
/// The list is grown to cover a row's set number before the row is
/// classified, so a skipped row still extends the list and the final length is
/// always the largest set number seen plus one.
pub fn assemble(
    rows: &[RegexRow],
    domain: &str,
    diagnostics: &mut Diagnostics,
) -> SynthesisResult<RoutingRules> {
    let mut rules = RoutingRules::default();

    for row in rows {
        let set_number = usize::try_from(row.set_number)
            .ok()
            .filter(|n| *n <= MAX_MATCH_SET_INDEX)
            .ok_or_else(|| {
                SynthesisError::decode(
                    &row.xml_id,
                    format!(
                        "regex set number {} for pattern '{}' is outside 0..={MAX_MATCH_SET_INDEX}",
                        row.set_number, row.pattern
                    ),
                )
            })?;

        let match_sets = rules.match_sets.entry(row.xml_id.clone()).or_default();
        if match_sets.len() <= set_number {
            match_sets.resize_with(set_number + 1, MatchSet::default);
        }

        let Some(match_type) = MatchType::from_regex_type(&row.regex_type) else {
            diagnostics.record(Diagnostic::UnknownRegexType {
                xml_id: row.xml_id.clone(),
                regex_type: row.regex_type.clone(),
            });
            continue;
        };

        let match_set = &mut match_sets[set_number];
        match_set.protocol = Some(RoutingAxis::from_type_name(&row.ds_type));
        match_set.match_list.push(MatchEntry {
            regex: row.pattern.clone(),
            match_type,
        });

        if match_type == MatchType::Host && set_number == 0 {
            rules
                .domains
                .entry(row.xml_id.clone())
                .or_default()
                .push(host_pattern_to_domain(&row.pattern, domain));
        }
    }

    Ok(rules)
}

/// Fetch the regexes of `cdn` and assemble its routing rules.
pub async fn assemble_routing_rules(
    store: &dyn CrConfigStore,
    cdn: &str,
    domain: &str,
    diagnostics: &mut Diagnostics,
) -> SynthesisResult<RoutingRules> {
    let rows = store.regexes(cdn).await?;
    tracing::debug!(rows = rows.len(), "fetched delivery service regexes");
    let rules = assemble(&rows, domain, diagnostics)?;
    tracing::debug!(
        delivery_services = rules.match_sets.len(),
        with_domains = rules.domains.len(),
        "assembled regex match sets"
    );
    Ok(rules)
}

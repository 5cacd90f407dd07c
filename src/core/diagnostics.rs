//! Non-fatal conditions observed during a synthesis run.
//!
//! Each diagnostic is logged at its own level the moment it is recorded and is
//! kept in the run report, so callers can inspect what the log stream saw.
use std::fmt;

use crate::metrics::increment_diagnostics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coordinate {
    Latitude,
    Longitude,
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Coordinate::Latitude => f.write_str("latitude"),
            Coordinate::Longitude => f.write_str("longitude"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DiagnosticLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// Regex type with no routing meaning (e.g. `STEERING_REGEXP`); the row was skipped.
    UnknownRegexType { xml_id: String, regex_type: String },
    /// Only one of the miss-location coordinates is set; the location was omitted.
    PartialMissLocation { xml_id: String, present: Coordinate },
    /// A TTL override parameter is not an integer; the default was kept.
    MalformedTtlParameter {
        xml_id: String,
        /// Profile assigned to the delivery service, if any.
        profile: Option<String>,
        parameter: String,
        value: String,
    },
    MissingMatchSets { xml_id: String },
    MissingDomains { xml_id: String },
}

impl Diagnostic {
    /// Stable label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Diagnostic::UnknownRegexType { .. } => "unknown_regex_type",
            Diagnostic::PartialMissLocation { .. } => "partial_miss_location",
            Diagnostic::MalformedTtlParameter { .. } => "malformed_ttl_parameter",
            Diagnostic::MissingMatchSets { .. } => "missing_match_sets",
            Diagnostic::MissingDomains { .. } => "missing_domains",
        }
    }

    pub fn level(&self) -> DiagnosticLevel {
        match self {
            Diagnostic::UnknownRegexType { .. } => DiagnosticLevel::Info,
            Diagnostic::MalformedTtlParameter { .. } => DiagnosticLevel::Error,
            _ => DiagnosticLevel::Warn,
        }
    }

    pub fn xml_id(&self) -> &str {
        match self {
            Diagnostic::UnknownRegexType { xml_id, .. }
            | Diagnostic::PartialMissLocation { xml_id, .. }
            | Diagnostic::MalformedTtlParameter { xml_id, .. }
            | Diagnostic::MissingMatchSets { xml_id }
            | Diagnostic::MissingDomains { xml_id } => xml_id,
        }
    }

    fn emit(&self) {
        let kind = self.kind();
        let xml_id = self.xml_id();
        match self.level() {
            DiagnosticLevel::Info => tracing::info!(kind, delivery_service = xml_id, "{self}"),
            DiagnosticLevel::Warn => tracing::warn!(kind, delivery_service = xml_id, "{self}"),
            DiagnosticLevel::Error => tracing::error!(kind, delivery_service = xml_id, "{self}"),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::UnknownRegexType { xml_id, regex_type } => write!(
                f,
                "unknown delivery service '{xml_id}' regex type: {regex_type} - skipping"
            ),
            Diagnostic::PartialMissLocation { xml_id, present } => {
                let missing = match present {
                    Coordinate::Latitude => Coordinate::Longitude,
                    Coordinate::Longitude => Coordinate::Latitude,
                };
                write!(
                    f,
                    "delivery service {xml_id} has miss {present} but not {missing}: omitting miss location"
                )
            }
            Diagnostic::MalformedTtlParameter {
                xml_id,
                profile,
                parameter,
                value,
            } => write!(
                f,
                "delivery service {xml_id} (profile {}) param {parameter} '{value}' not a number - skipping",
                profile.as_deref().unwrap_or("none")
            ),
            Diagnostic::MissingMatchSets { xml_id } => {
                write!(f, "no regex matchsets for delivery service: {xml_id}")
            }
            Diagnostic::MissingDomains { xml_id } => {
                write!(f, "no host regex for delivery service: {xml_id}")
            }
        }
    }
}

/// Accumulates the diagnostics of one run.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log, count and keep a diagnostic.
    pub fn record(&mut self, diagnostic: Diagnostic) {
        diagnostic.emit();
        increment_diagnostics(diagnostic.kind());
        self.entries.push(diagnostic);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of recorded diagnostics at or above `level`.
    pub fn count_at_least(&self, level: DiagnosticLevel) -> usize {
        self.entries.iter().filter(|d| d.level() >= level).count()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_keeps_order_and_levels() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.record(Diagnostic::UnknownRegexType {
            xml_id: "ds1".to_string(),
            regex_type: "STEERING_REGEXP".to_string(),
        });
        diagnostics.record(Diagnostic::MissingDomains {
            xml_id: "ds2".to_string(),
        });

        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics.count_at_least(DiagnosticLevel::Warn), 1);
        let kinds: Vec<_> = diagnostics.iter().map(Diagnostic::kind).collect();
        assert_eq!(kinds, vec!["unknown_regex_type", "missing_domains"]);
    }

    #[test]
    fn partial_miss_location_names_missing_coordinate() {
        let diagnostic = Diagnostic::PartialMissLocation {
            xml_id: "ds1".to_string(),
            present: Coordinate::Latitude,
        };
        assert_eq!(
            diagnostic.to_string(),
            "delivery service ds1 has miss latitude but not longitude: omitting miss location"
        );
        assert_eq!(diagnostic.level(), DiagnosticLevel::Warn);
    }
}

//! Configuration data structures for crconfig.
//!
//! These types map directly to TOML (also JSON / YAML) configuration files. Everything
//! except the data source has a default so that minimal configs remain concise.
use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_max_connections() -> u32 {
    4
}

fn default_acquire_timeout() -> String {
    "30s".to_string()
}

fn default_pretty() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Top-level settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrConfigSettings {
    /// The CDN to synthesize for
    #[serde(default)]
    pub cdn: CdnSettings,
    /// Where the operational data is read from
    pub source: SourceConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Upper bound on a whole synthesis run, e.g. "2m"
    #[serde(default)]
    pub run_timeout: Option<String>,
}

impl CrConfigSettings {
    /// Parsed `run_timeout`. Validation guarantees this parses.
    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout
            .as_deref()
            .and_then(|t| humantime::parse_duration(t).ok())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CdnSettings {
    /// CDN name as stored in the database
    pub name: String,
    /// Domain suffix delivery-service domains are rooted at
    pub domain: String,
}

/// Data source for a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Live operational database
    Postgres {
        url: String,
        #[serde(default = "default_max_connections")]
        max_connections: u32,
        /// How long to wait for a pooled connection
        #[serde(default = "default_acquire_timeout")]
        acquire_timeout: String,
    },
    /// JSON snapshot of the relevant tables
    Snapshot { path: String },
}

impl SourceConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            SourceConfig::Postgres { .. } => "postgres",
            SourceConfig::Snapshot { .. } => "snapshot",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// File to write the document to; stdout when unset
    pub path: Option<String>,
    #[serde(default = "default_pretty")]
    pub pretty: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: None,
            pretty: default_pretty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. "info" or "crconfig=debug,sqlx=warn"
    #[serde(default = "default_log_level")]
    pub level: String,
    pub json: bool,
    pub include_spans: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            include_spans: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_optional_sections() {
        let settings: CrConfigSettings = serde_json::from_str(
            r#"{ "cdn": { "name": "cdn1" }, "source": { "type": "postgres", "url": "postgres://localhost/to" } }"#,
        )
        .unwrap();

        assert_eq!(settings.cdn.name, "cdn1");
        assert_eq!(settings.cdn.domain, "");
        assert!(settings.output.pretty);
        assert_eq!(settings.logging.level, "info");
        assert_eq!(
            settings.source,
            SourceConfig::Postgres {
                url: "postgres://localhost/to".to_string(),
                max_connections: 4,
                acquire_timeout: "30s".to_string(),
            }
        );
        assert_eq!(settings.run_timeout(), None);
    }

    #[test]
    fn run_timeout_parses_humantime() {
        let settings = CrConfigSettings {
            cdn: CdnSettings::default(),
            source: SourceConfig::Snapshot {
                path: "snap.json".to_string(),
            },
            output: OutputConfig::default(),
            logging: LoggingConfig::default(),
            run_timeout: Some("1m 30s".to_string()),
        };
        assert_eq!(settings.run_timeout(), Some(Duration::from_secs(90)));
        assert_eq!(settings.source.kind(), "snapshot");
    }
}

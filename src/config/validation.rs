#![allow(clippy::collapsible_if)]

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing_subscriber::EnvFilter;

use crate::config::models::{CrConfigSettings, LoggingConfig, SourceConfig};

static CDN_NAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.\-]*$").expect("invalid cdn name regex"));

static DOMAIN_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9]([a-zA-Z0-9\-]{0,61}[a-zA-Z0-9])?(\.[a-zA-Z0-9]([a-zA-Z0-9\-]{0,61}[a-zA-Z0-9])?)*$")
        .expect("invalid domain regex")
});

/// Validation result type alias
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validation error types
#[derive(Debug, thiserror::Error, Clone)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("Invalid duration '{value}' for {field}: {reason}")]
    InvalidDuration {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },
}

/// Settings validator. Collects every problem before failing.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the entire configuration
    pub fn validate(config: &CrConfigSettings) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = Self::validate_cdn_name(&config.cdn.name) {
            errors.push(e);
        }
        if let Err(e) = Self::validate_domain(&config.cdn.domain) {
            errors.push(e);
        }
        if let Err(mut source_errors) = Self::validate_source(&config.source) {
            errors.append(&mut source_errors);
        }
        if let Some(timeout) = &config.run_timeout {
            if let Err(e) = Self::validate_duration("run_timeout", timeout) {
                errors.push(e);
            }
        }
        if let Err(e) = Self::validate_logging(&config.logging) {
            errors.push(e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::ValidationFailed {
                message: Self::format_multiple_errors(errors),
            })
        }
    }

    fn validate_cdn_name(name: &str) -> ValidationResult<()> {
        if name.is_empty() {
            return Err(ValidationError::MissingField {
                field: "cdn.name".to_string(),
            });
        }
        if !CDN_NAME_REGEX.is_match(name) {
            return Err(ValidationError::InvalidField {
                field: "cdn.name".to_string(),
                message: format!(
                    "'{name}' may only contain letters, digits, '-', '_' and '.'"
                ),
            });
        }
        Ok(())
    }

    fn validate_domain(domain: &str) -> ValidationResult<()> {
        if domain.is_empty() {
            return Err(ValidationError::MissingField {
                field: "cdn.domain".to_string(),
            });
        }
        if !DOMAIN_REGEX.is_match(domain) {
            return Err(ValidationError::InvalidField {
                field: "cdn.domain".to_string(),
                message: format!("Invalid domain suffix: '{domain}'"),
            });
        }
        Ok(())
    }

    fn validate_source(source: &SourceConfig) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        match source {
            SourceConfig::Postgres {
                url,
                max_connections,
                acquire_timeout,
            } => {
                if !(url.starts_with("postgres://") || url.starts_with("postgresql://")) {
                    errors.push(ValidationError::InvalidField {
                        field: "source.url".to_string(),
                        message: "URL scheme must be 'postgres' or 'postgresql'".to_string(),
                    });
                }
                if *max_connections == 0 {
                    errors.push(ValidationError::InvalidField {
                        field: "source.max_connections".to_string(),
                        message: "Must be at least 1".to_string(),
                    });
                }
                if let Err(e) = Self::validate_duration("source.acquire_timeout", acquire_timeout)
                {
                    errors.push(e);
                }
            }
            SourceConfig::Snapshot { path } => {
                if path.is_empty() {
                    errors.push(ValidationError::MissingField {
                        field: "source.path".to_string(),
                    });
                } else if !Path::new(path).is_file() {
                    errors.push(ValidationError::InvalidField {
                        field: "source.path".to_string(),
                        message: format!("Snapshot file '{path}' does not exist"),
                    });
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_duration(field: &str, value: &str) -> ValidationResult<()> {
        match humantime::parse_duration(value) {
            Ok(d) if d.is_zero() => Err(ValidationError::InvalidDuration {
                field: field.to_string(),
                value: value.to_string(),
                reason: "must be greater than zero".to_string(),
            }),
            Ok(_) => Ok(()),
            Err(e) => Err(ValidationError::InvalidDuration {
                field: field.to_string(),
                value: value.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    fn validate_logging(logging: &LoggingConfig) -> ValidationResult<()> {
        EnvFilter::try_new(&logging.level)
            .map(|_| ())
            .map_err(|e| ValidationError::InvalidField {
                field: "logging.level".to_string(),
                message: e.to_string(),
            })
    }

    /// Format multiple validation errors into a readable message
    fn format_multiple_errors(errors: Vec<ValidationError>) -> String {
        if errors.is_empty() {
            return "No errors".to_string();
        }

        if errors.len() == 1 {
            return errors[0].to_string();
        }

        let mut message = format!("Found {} validation errors:\n", errors.len());
        for (i, error) in errors.iter().enumerate() {
            message.push_str(&format!("  {}. {}\n", i + 1, error));
        }
        message
    }
}

#[cfg(test)]
mod tests {
    use tempfile::NamedTempFile;

    use super::*;
    use crate::config::models::{CdnSettings, OutputConfig};

    fn minimal_valid_config() -> CrConfigSettings {
        CrConfigSettings {
            cdn: CdnSettings {
                name: "cdn1".to_string(),
                domain: "cdn.example.com".to_string(),
            },
            source: SourceConfig::Postgres {
                url: "postgres://traffic_ops@localhost/traffic_ops".to_string(),
                max_connections: 4,
                acquire_timeout: "30s".to_string(),
            },
            output: OutputConfig::default(),
            logging: LoggingConfig::default(),
            run_timeout: Some("2m".to_string()),
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(ConfigValidator::validate(&minimal_valid_config()).is_ok());
    }

    #[test]
    fn test_missing_cdn_name() {
        let mut config = minimal_valid_config();
        config.cdn.name = String::new();

        let err = ConfigValidator::validate(&config).unwrap_err();
        assert!(err.to_string().contains("cdn.name"));
    }

    #[test]
    fn test_invalid_domain() {
        let mut config = minimal_valid_config();
        config.cdn.domain = "bad domain..com".to_string();

        let err = ConfigValidator::validate(&config).unwrap_err();
        assert!(err.to_string().contains("Invalid domain suffix"));
    }

    #[test]
    fn test_postgres_source_errors_are_collected() {
        let mut config = minimal_valid_config();
        config.source = SourceConfig::Postgres {
            url: "mysql://localhost/to".to_string(),
            max_connections: 0,
            acquire_timeout: "soon".to_string(),
        };

        let message = ConfigValidator::validate(&config).unwrap_err().to_string();
        assert!(message.contains("Found 3 validation errors"), "{message}");
        assert!(message.contains("source.url"));
        assert!(message.contains("source.max_connections"));
        assert!(message.contains("source.acquire_timeout"));
    }

    #[test]
    fn test_snapshot_path_must_exist() {
        let mut config = minimal_valid_config();
        config.source = SourceConfig::Snapshot {
            path: "/definitely/not/here.json".to_string(),
        };
        assert!(ConfigValidator::validate(&config).is_err());

        let snapshot = NamedTempFile::with_suffix(".json").unwrap();
        config.source = SourceConfig::Snapshot {
            path: snapshot.path().to_str().unwrap().to_string(),
        };
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_zero_run_timeout() {
        let mut config = minimal_valid_config();
        config.run_timeout = Some("0s".to_string());

        let err = ConfigValidator::validate(&config).unwrap_err();
        assert!(err.to_string().contains("run_timeout"));
    }
}

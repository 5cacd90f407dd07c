use std::{collections::HashMap, path::Path};

use config::{Config, Environment, File, FileFormat};
use eyre::{Context, Result};

use crate::config::models::CrConfigSettings;

/// Prefix of environment overrides, e.g. `CRCONFIG_SOURCE__URL`
pub const ENV_PREFIX: &str = "CRCONFIG";
/// Separator between nested keys in environment overrides
pub const ENV_SEPARATOR: &str = "__";

/// Load configuration from a file using the config crate, with environment overrides.
/// Supports multiple formats: TOML, YAML, JSON.
pub async fn load_config(config_path: &str) -> Result<CrConfigSettings> {
    load_config_sync(config_path)
}

/// Load configuration synchronously
pub fn load_config_sync(config_path: &str) -> Result<CrConfigSettings> {
    build_config(config_path, Environment::with_prefix(ENV_PREFIX))
}

/// Load configuration with an explicit set of environment variables instead of
/// the process environment.
pub fn load_config_with_env(
    config_path: &str,
    env: HashMap<String, String>,
) -> Result<CrConfigSettings> {
    build_config(
        config_path,
        Environment::with_prefix(ENV_PREFIX).source(Some(env)),
    )
}

fn file_format(config_path: &Path) -> FileFormat {
    match config_path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml") | Some("yml") => FileFormat::Yaml,
        Some("json") => FileFormat::Json,
        _ => FileFormat::Toml,
    }
}

fn build_config(config_path: &str, env: Environment) -> Result<CrConfigSettings> {
    let config_path = Path::new(config_path);
    let format = file_format(config_path);

    let settings = Config::builder()
        .add_source(File::new(
            config_path
                .to_str()
                .ok_or_else(|| eyre::eyre!("Invalid UTF-8 path: {}", config_path.display()))?,
            format,
        ))
        .add_source(
            env.prefix_separator("_")
                .separator(ENV_SEPARATOR)
                .try_parsing(true),
        )
        .build()
        .with_context(|| format!("Failed to build config from {}", config_path.display()))?;

    settings.try_deserialize().with_context(|| {
        format!(
            "Failed to deserialize config from {}",
            config_path.display()
        )
    })
}

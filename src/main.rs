use std::{path::Path, sync::Arc};

use clap::Parser;
use color_eyre::{
    Result,
    eyre::{Context, eyre},
};
use crconfig::{
    CrConfigStore, CrConfigSynthesizer, PostgresStore, SnapshotStore,
    config::{ConfigValidator, CrConfigSettings, SourceConfig, loader::load_config},
    core::DiagnosticLevel,
    metrics, tracing_setup,
};
use tokio::io::AsyncWriteExt;

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    #[clap(subcommand)]
    command: Option<Commands>,

    #[clap(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Parser, Debug)]
enum Commands {
    /// Synthesize the CR config document (default)
    Generate {
        /// Configuration file to use
        #[clap(short, long, default_value = "config.toml")]
        config: String,
        /// CDN to synthesize for, overriding cdn.name
        #[clap(long)]
        cdn: Option<String>,
        /// Domain suffix, overriding cdn.domain
        #[clap(long)]
        domain: Option<String>,
        /// Output file, overriding output.path; "-" writes to stdout
        #[clap(short, long)]
        output: Option<String>,
    },
    /// Validate configuration file
    Validate {
        /// Configuration file to validate
        #[clap(short, long, default_value = "config.toml")]
        config: String,
    },
    /// Initialize a new configuration file
    Init {
        /// Output path for the new config file
        #[clap(short, long, default_value = "config.toml")]
        config: String,
    },
}

/// Overrides given on the command line for `generate`
#[derive(Debug, Default)]
struct Overrides {
    cdn: Option<String>,
    domain: Option<String>,
    output: Option<String>,
}

impl Overrides {
    fn apply(self, settings: &mut CrConfigSettings) {
        if let Some(cdn) = self.cdn {
            settings.cdn.name = cdn;
        }
        if let Some(domain) = self.domain {
            settings.cdn.domain = domain;
        }
        match self.output.as_deref() {
            Some("-") => settings.output.path = None,
            Some(path) => settings.output.path = Some(path.to_string()),
            None => {}
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    match args.command {
        Some(Commands::Validate { config }) => validate_config_command(&config).await,
        Some(Commands::Init { config }) => init_config_command(&config).await,
        Some(Commands::Generate {
            config,
            cdn,
            domain,
            output,
        }) => generate_command(&config, Overrides { cdn, domain, output }).await,
        None => generate_command(&args.config, Overrides::default()).await,
    }
}

async fn open_store(source: &SourceConfig) -> Result<Arc<dyn CrConfigStore>> {
    match source {
        SourceConfig::Postgres {
            url,
            max_connections,
            acquire_timeout,
        } => {
            let acquire_timeout = humantime::parse_duration(acquire_timeout)
                .with_context(|| format!("Invalid acquire_timeout '{acquire_timeout}'"))?;
            let store = PostgresStore::connect(url, *max_connections, acquire_timeout)
                .await
                .context("Failed to connect to Postgres")?;
            let snapshot = store
                .begin_snapshot()
                .await
                .context("Failed to open database snapshot")?;
            Ok(Arc::new(snapshot))
        }
        SourceConfig::Snapshot { path } => {
            let store = SnapshotStore::from_path(path)
                .await
                .with_context(|| format!("Failed to load snapshot from {path}"))?;
            Ok(Arc::new(store))
        }
    }
}

/// Synthesize one document and write it out
async fn generate_command(config_path: &str, overrides: Overrides) -> Result<()> {
    let mut settings = load_config(config_path)
        .await
        .with_context(|| format!("Failed to load config from {config_path}"))?;
    overrides.apply(&mut settings);
    ConfigValidator::validate(&settings).map_err(|e| eyre!("{e}"))?;

    tracing_setup::init_tracing_with_config(
        &settings.logging.level,
        settings.logging.json,
        settings.logging.include_spans,
    )
    .map_err(|e| eyre!("Failed to initialize tracing: {}", e))?;
    metrics::init_metrics().map_err(|e| eyre!("Failed to initialize metrics: {}", e))?;

    let cdn = settings.cdn.name.as_str();
    let domain = settings.cdn.domain.as_str();
    tracing::info!(
        cdn,
        domain,
        source = settings.source.kind(),
        "Starting CR config synthesis"
    );

    let store = open_store(&settings.source).await?;
    let synthesizer = CrConfigSynthesizer::new(store);
    let run = synthesizer.synthesize(cdn, domain);

    let result = match settings.run_timeout() {
        Some(limit) => tokio::time::timeout(limit, run).await.map_err(|_| {
            eyre!(
                "Synthesis for CDN {cdn} did not finish within {}",
                humantime::format_duration(limit)
            )
        })?,
        None => run.await,
    };
    let report = result.with_context(|| format!("Failed to synthesize CR config for CDN {cdn}"))?;

    let problems = report.diagnostics.count_at_least(DiagnosticLevel::Warn);
    if problems > 0 {
        tracing::warn!(
            cdn,
            problems,
            "CR config synthesized with data problems; see earlier log entries"
        );
    }

    let json = if settings.output.pretty {
        report.document.to_json_pretty()
    } else {
        report.document.to_json()
    }
    .context("Failed to serialize CR config")?;

    match &settings.output.path {
        Some(path) => {
            tokio::fs::write(path, json.as_bytes())
                .await
                .with_context(|| format!("Failed to write CR config to {path}"))?;
            tracing::info!(
                path = %path,
                delivery_services = report.document.delivery_services.len(),
                "CR config written"
            );
        }
        None => {
            let mut stdout = tokio::io::stdout();
            stdout
                .write_all(json.as_bytes())
                .await
                .context("Failed to write CR config to stdout")?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }
    }

    tracing_setup::shutdown_tracing();

    Ok(())
}

/// Validate configuration file and exit
async fn validate_config_command(config_path: &str) -> Result<()> {
    println!("🔍 Validating configuration file: {config_path}");

    // First check if file exists and is readable
    if !Path::new(config_path).exists() {
        eprintln!("❌ Error: Configuration file '{config_path}' not found");
        std::process::exit(1);
    }

    let config = match load_config(config_path).await {
        Ok(config) => {
            println!("✅ Configuration parsing: OK");
            config
        }
        Err(e) => {
            eprintln!("❌ Configuration parsing failed:");
            eprintln!("   {e:#}");
            std::process::exit(1);
        }
    };

    match ConfigValidator::validate(&config) {
        Ok(()) => {
            println!("✅ Configuration validation: OK");
            println!();
            println!("📋 Configuration Summary:");
            println!("   • CDN: {}", config.cdn.name);
            println!("   • Domain: {}", config.cdn.domain);
            println!("   • Source: {}", config.source.kind());
            println!(
                "   • Output: {}",
                config.output.path.as_deref().unwrap_or("stdout")
            );
            println!(
                "   • Run Timeout: {}",
                config.run_timeout.as_deref().unwrap_or("none")
            );
            println!();
            println!("🎉 Configuration is valid and ready to use!");
            Ok(())
        }
        Err(e) => {
            eprintln!("❌ Configuration validation failed:");
            eprintln!("{e}");
            println!();
            println!("💡 Common fixes:");
            println!("   • Database URLs must start with postgres:// or postgresql://");
            println!("   • Snapshot files must exist");
            println!("   • Durations use humantime units (e.g., '30s', '2m')");
            std::process::exit(1);
        }
    }
}

/// Initialize a new configuration file
async fn init_config_command(config_path: &str) -> Result<()> {
    let path = Path::new(config_path);
    if path.exists() {
        eprintln!("❌ Error: Configuration file '{config_path}' already exists");
        std::process::exit(1);
    }

    let default_config = r#"# crconfig configuration

# Abort a run that takes longer than this
run_timeout = "2m"

[cdn]
name = "cdn1"
domain = "cdn.example.com"

# Live database
[source]
type = "postgres"
url = "postgres://traffic_ops@localhost:5432/traffic_ops"
max_connections = 4
acquire_timeout = "30s"

# Offline snapshot of the relevant tables
# [source]
# type = "snapshot"
# path = "tables.json"

[output]
# path = "crconfig.json"   # stdout when unset
pretty = true

[logging]
level = "info"
json = false
include_spans = false
"#;

    tokio::fs::write(path, default_config)
        .await
        .context("Failed to write config file")?;
    println!("✅ Created default configuration at: {config_path}");
    println!("   Run 'crconfig generate --config {config_path}' to synthesize a CR config");
    Ok(())
}

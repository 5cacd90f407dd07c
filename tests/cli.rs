use std::{fs, path::Path, process::Command};

use serde_json::Value;
use tempfile::TempDir;

const SNAPSHOT: &str = r#"
{
  "deliveryServices": [
    { "cdn": "cdn1", "xml_id": "ds1", "type": "HTTP_LIVE", "protocol": 1 }
  ],
  "regexes": [
    { "cdn": "cdn1", "xml_id": "ds1", "pattern": ".*\\.ds1\\..*", "regex_type": "HOST_REGEXP", "ds_type": "HTTP_LIVE" }
  ]
}
"#;

fn crconfig() -> Command {
    Command::new(env!("CARGO_BIN_EXE_crconfig"))
}

fn write_config(dir: &Path) -> String {
    let snapshot = dir.join("tables.json");
    fs::write(&snapshot, SNAPSHOT).unwrap();

    let config = dir.join("config.toml");
    fs::write(
        &config,
        format!(
            r#"
[cdn]
name = "cdn1"
domain = "cdn.example.com"

[source]
type = "snapshot"
path = "{}"

[logging]
level = "warn"
"#,
            snapshot.display()
        ),
    )
    .unwrap();
    config.to_str().unwrap().to_string()
}

#[test]
fn test_generate_writes_document() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());
    let output = dir.path().join("crconfig.json");

    let status = crconfig()
        .args(["generate", "--config", &config, "--output"])
        .arg(&output)
        .status()
        .unwrap();
    assert!(status.success());

    let doc: Value = serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    let ds = &doc["deliveryServices"]["ds1"];
    assert_eq!(ds["domains"][0], "ds1.cdn.example.com");
    assert_eq!(ds["sslEnabled"], "true");
    assert_eq!(doc["stats"]["cdnName"], "cdn1");
}

#[test]
fn test_generate_to_stdout_with_overrides() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());

    let output = crconfig()
        .args([
            "generate",
            "--config",
            &config,
            "--cdn",
            "cdn2",
            "--domain",
            "other.example.net",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());

    let doc: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(doc["stats"]["cdnName"], "cdn2");
    assert_eq!(doc["stats"]["domainName"], "other.example.net");
    assert!(doc["deliveryServices"].as_object().unwrap().is_empty());
}

#[test]
fn test_generate_rejects_invalid_config() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());

    let output = crconfig()
        .args(["generate", "--config", &config, "--domain", "not a domain"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
}

#[test]
fn test_validate_and_init() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());

    let status = crconfig()
        .args(["validate", "--config", &config])
        .status()
        .unwrap();
    assert!(status.success());

    // refuses to overwrite an existing file
    let status = crconfig()
        .args(["init", "--config", &config])
        .status()
        .unwrap();
    assert!(!status.success());

    let fresh = dir.path().join("fresh.toml");
    let status = crconfig()
        .args(["init", "--config"])
        .arg(&fresh)
        .status()
        .unwrap();
    assert!(status.success());
    assert!(fs::read_to_string(&fresh).unwrap().contains("[source]"));
}

//! Config file location and reading.

use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Default config file name.
const CONFIG_FILE_NAME: &str = "config.yaml";

/// Resolve the config file used when none is given on the command line.
/// Priority: `INFINIGPT_CONFIG` env > `./config.yaml` > `~/.infinigpt/config.yaml`.
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var("INFINIGPT_CONFIG") {
        return PathBuf::from(path);
    }
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return local;
    }
    match dirs::home_dir() {
        Some(home) => home.join(".infinigpt").join(CONFIG_FILE_NAME),
        None => local,
    }
}

/// Read a config file into an untyped value tree.
///
/// YAML and JSON are both accepted; JSON parses as YAML.
pub async fn load_raw(path: &Path) -> Result<Value> {
    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let value = parse_raw(&raw)
        .with_context(|| format!("Failed to parse config at: {}", path.display()))?;
    info!(path = %path.display(), "Loaded config");
    Ok(value)
}

/// Parse config text into a JSON value tree.
pub fn parse_raw(raw: &str) -> Result<Value> {
    let yaml: serde_yaml::Value = serde_yaml::from_str(raw).context("Invalid YAML/JSON")?;
    let value = serde_json::to_value(yaml).context("Config is not representable as JSON")?;
    if value.is_null() {
        debug!("Config file is empty; using defaults");
        return Ok(Value::Object(serde_json::Map::new()));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_yaml() {
        let v = parse_raw("gateway:\n  endpoint: https://wiki.example.org\n").unwrap();
        assert_eq!(v["gateway"]["endpoint"], "https://wiki.example.org");
    }

    #[test]
    fn parses_json() {
        let v = parse_raw(r#"{"history": {"maxTurns": 10}}"#).unwrap();
        assert_eq!(v["history"]["maxTurns"], 10);
    }

    #[test]
    fn empty_file_is_empty_object() {
        let v = parse_raw("").unwrap();
        assert!(v.as_object().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_file_is_error() {
        let path = std::env::temp_dir().join(format!("infinigpt-missing-{}.yaml", uuid::Uuid::new_v4()));
        assert!(load_raw(&path).await.is_err());
    }
}

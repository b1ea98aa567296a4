use super::types::ApiDescription;
use anyhow::Context;
use serde_json::Value;
use std::path::Path;

/// Build an [`ApiDescription`] from an already parsed JSON value.
///
/// Keys the model does not know (`swagger`, `info`, `trace` operations,
/// `$ref` path items) are ignored.
pub fn load_api_from_value(value: Value) -> anyhow::Result<ApiDescription> {
    let api: ApiDescription =
        serde_json::from_value(value).context("Invalid API description")?;
    Ok(api)
}

/// Parse an API description from a string. YAML is a superset of JSON, so
/// `yaml = true` accepts both.
pub fn parse_api(content: &str, yaml: bool) -> anyhow::Result<ApiDescription> {
    let value: Value = if yaml {
        serde_yaml::from_str(content).context("Failed to parse YAML API description")?
    } else {
        serde_json::from_str(content).context("Failed to parse JSON API description")?
    };
    load_api_from_value(value)
}

/// Load an API description from a `.yaml`, `.yml` or `.json` file.
pub fn load_api(file_path: impl AsRef<Path>) -> anyhow::Result<ApiDescription> {
    let file_path = file_path.as_ref();
    let content = std::fs::read_to_string(file_path)
        .with_context(|| format!("Failed to read {}", file_path.display()))?;
    let yaml = matches!(
        file_path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    parse_api(&content, yaml).with_context(|| format!("Failed to load {}", file_path.display()))
}

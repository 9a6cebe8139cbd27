// Configuration file loaders

use crate::{ConfigError, Result};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FileFormat {
    Json,
    Toml,
    Env,
}

impl FileFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "json" => Some(FileFormat::Json),
            "toml" => Some(FileFormat::Toml),
            "env" => Some(FileFormat::Env),
            _ => None,
        }
    }
}

/// Configuration file loader
///
/// Every format is flattened into the same key space the environment loader
/// produces: nested tables are joined with `_` and keys are lowercased, so
/// `[messaging] base_url = ".."` and `PRAXIS_MESSAGING_BASE_URL` both land on
/// `messaging_base_url`.
pub struct ConfigLoader {
    format: FileFormat,
}

impl ConfigLoader {
    pub fn new(format: FileFormat) -> Self {
        Self { format }
    }

    /// Auto-detect format from file extension
    pub fn auto(path: &str) -> Result<Self> {
        let ext = Path::new(path)
            .extension()
            .and_then(|s| s.to_str())
            .ok_or_else(|| ConfigError::LoadError("No file extension found".to_string()))?;

        let format = FileFormat::from_extension(ext)
            .ok_or_else(|| ConfigError::LoadError(format!("Unsupported format: {}", ext)))?;

        Ok(Self::new(format))
    }

    /// Load configuration from file
    pub fn load_file(&self, path: &str) -> Result<Map<String, Value>> {
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadError(format!("Failed to read {}: {}", path, e)))?;

        self.parse(&content)
    }

    /// Parse configuration from string into flattened keys
    pub fn parse(&self, content: &str) -> Result<Map<String, Value>> {
        let tree = match self.format {
            FileFormat::Json => serde_json::from_str(content)
                .map_err(|e| ConfigError::ParseError(format!("JSON parse error: {}", e)))?,
            FileFormat::Toml => toml::from_str::<Value>(content)
                .map_err(|e| ConfigError::ParseError(format!("TOML parse error: {}", e)))?,
            FileFormat::Env => return Ok(parse_env(content)),
        };

        let Value::Object(root) = tree else {
            return Err(ConfigError::ParseError(
                "Top-level configuration must be a table".to_string(),
            ));
        };

        let mut flat = Map::new();
        flatten_into(&mut flat, None, root);
        Ok(flat)
    }
}

fn flatten_into(out: &mut Map<String, Value>, prefix: Option<&str>, table: Map<String, Value>) {
    for (key, value) in table {
        let key = match prefix {
            Some(prefix) => format!("{}_{}", prefix, key.to_lowercase()),
            None => key.to_lowercase(),
        };
        match value {
            Value::Object(nested) => flatten_into(out, Some(&key), nested),
            other => {
                out.insert(key, other);
            }
        }
    }
}

fn parse_env(content: &str) -> Map<String, Value> {
    let mut map = Map::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim().trim_start_matches("export ").trim();
            let value = value.trim().trim_matches('"').trim_matches('\'');
            map.insert(key.to_lowercase(), Value::String(value.to_string()));
        }
    }

    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_flattens() {
        let loader = ConfigLoader::new(FileFormat::Json);
        let json = r#"{"messaging": {"base_url": "https://api.example.com", "max_retries": 3}}"#;

        let result = loader.parse(json).unwrap();
        assert_eq!(result["messaging_base_url"], "https://api.example.com");
        assert_eq!(result["messaging_max_retries"], 3);
    }

    #[test]
    fn test_parse_toml_flattens() {
        let loader = ConfigLoader::new(FileFormat::Toml);
        let toml = r#"
            [events]
            max_retries = 2
            backoff_multiplier = 1.5

            [calendar]
            base_url = "https://calendar.example.com"
        "#;

        let result = loader.parse(toml).unwrap();
        assert_eq!(result["events_max_retries"], 2);
        assert_eq!(result["events_backoff_multiplier"], 1.5);
        assert_eq!(result["calendar_base_url"], "https://calendar.example.com");
    }

    #[test]
    fn test_parse_env() {
        let loader = ConfigLoader::new(FileFormat::Env);
        let env = r#"
            MESSAGING_API_KEY=abc
            # Comment
            export MESSAGING_SENDER_ID="1234"
        "#;

        let result = loader.parse(env).unwrap();
        assert_eq!(result["messaging_api_key"], "abc");
        assert_eq!(result["messaging_sender_id"], "1234");
    }

    #[test]
    fn test_non_table_root_is_rejected() {
        let loader = ConfigLoader::new(FileFormat::Json);
        assert!(loader.parse("[1, 2, 3]").is_err());
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(FileFormat::from_extension("json"), Some(FileFormat::Json));
        assert_eq!(FileFormat::from_extension("TOML"), Some(FileFormat::Toml));
        assert_eq!(FileFormat::from_extension("env"), Some(FileFormat::Env));
        assert_eq!(FileFormat::from_extension("yaml"), None);
        assert!(ConfigLoader::auto("settings").is_err());
    }
}

// Environment variable loading

use crate::{ConfigError, Result};
use std::collections::HashMap;
use std::env;

/// Environment variable loader
///
/// With a prefix of `PRAXIS`, `PRAXIS_MESSAGING_API_KEY` is exposed as the
/// key `messaging_api_key`. Variables outside the prefix are ignored.
pub struct EnvLoader {
    prefix: Option<String>,
}

impl EnvLoader {
    pub fn new(prefix: Option<String>) -> Self {
        Self { prefix }
    }

    /// Load all matching environment variables
    pub fn load(&self) -> Result<HashMap<String, String>> {
        Ok(self.filter(env::vars()))
    }

    /// Apply prefix filtering and key normalisation to a set of variables
    pub fn filter<I>(&self, vars: I) -> HashMap<String, String>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut config = HashMap::new();

        for (key, value) in vars {
            match &self.prefix {
                Some(prefix) => {
                    let Some(rest) = key.strip_prefix(prefix.as_str()) else {
                        continue;
                    };
                    let Some(trimmed) = rest.strip_prefix('_') else {
                        continue;
                    };
                    if !trimmed.is_empty() {
                        config.insert(trimmed.to_lowercase(), value);
                    }
                }
                None => {
                    config.insert(key.to_lowercase(), value);
                }
            }
        }

        config
    }

    /// Load a specific environment variable
    pub fn load_var(&self, key: &str) -> Result<String> {
        let full_key = match &self.prefix {
            Some(prefix) => format!("{}_{}", prefix, key.to_uppercase()),
            None => key.to_uppercase(),
        };

        env::var(&full_key).map_err(|source| ConfigError::EnvError {
            key: full_key.clone(),
            source,
        })
    }

    /// Load with default value
    pub fn load_var_or(&self, key: &str, default: &str) -> String {
        self.load_var(key).unwrap_or_else(|_| default.to_string())
    }
}

impl Default for EnvLoader {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // std::env::set_var is unsafe under edition 2024, so prefix handling is
    // exercised through `filter` with synthetic variables.

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_prefix_filtering() {
        let loader = EnvLoader::new(Some("PRAXIS".to_string()));
        let config = loader.filter(vars(&[
            ("PRAXIS_MESSAGING_API_KEY", "secret"),
            ("PRAXIS_EVENTS_MAX_RETRIES", "4"),
            ("PRAXISX_OTHER", "nope"),
            ("HOME", "/root"),
        ]));

        assert_eq!(config.len(), 2);
        assert_eq!(config.get("messaging_api_key").map(String::as_str), Some("secret"));
        assert_eq!(config.get("events_max_retries").map(String::as_str), Some("4"));
    }

    #[test]
    fn test_no_prefix_keeps_everything() {
        let loader = EnvLoader::default();
        let config = loader.filter(vars(&[("A_B", "1"), ("C", "2")]));
        assert_eq!(config.get("a_b").map(String::as_str), Some("1"));
        assert_eq!(config.get("c").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_env_loader_with_default() {
        let loader = EnvLoader::new(None);
        assert_eq!(loader.load_var_or("NONEXISTENT_VAR_12345", "default"), "default");
    }

    #[test]
    fn test_env_loader_missing_var() {
        let loader = EnvLoader::new(Some("PRAXIS_TEST".to_string()));
        assert!(loader.load_var("MISSING_VAR_67890").is_err());
    }
}

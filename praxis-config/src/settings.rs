//! Typed settings read from the flat configuration key space.
//!
//! Secrets such as API keys come only from configuration. `Debug` output
//! redacts them so settings can be logged safely.

use crate::{ConfigManager, ConfigValidator, Result, Validate};
use std::fmt;
use std::time::Duration;

/// Settings for one outbound integration (messaging provider, calendar
/// provider, ...), read from keys prefixed with the integration name.
///
/// | key                                  | default  |
/// |--------------------------------------|----------|
/// | `<name>_base_url`                    | required |
/// | `<name>_timeout_ms`                  | 10000    |
/// | `<name>_max_retries`                 | 2        |
/// | `<name>_circuit_failure_threshold`   | 5        |
/// | `<name>_circuit_cooldown_ms`         | 30000    |
/// | `<name>_api_key`                     | none     |
/// | `<name>_sender_id`                   | none     |
#[derive(Clone, PartialEq)]
pub struct IntegrationSettings {
    /// Logical target name; also the circuit breaker key
    pub name: String,
    pub base_url: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub circuit_failure_threshold: u32,
    pub circuit_cooldown: Duration,
    pub api_key: Option<String>,
    /// Provider-side endpoint id (phone number id, calendar id, ...)
    pub sender_id: Option<String>,
}

impl IntegrationSettings {
    pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
    pub const DEFAULT_MAX_RETRIES: u32 = 2;
    pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
    pub const DEFAULT_COOLDOWN_MS: u64 = 30_000;

    /// Settings with defaults for everything but the base URL
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            timeout: Duration::from_millis(Self::DEFAULT_TIMEOUT_MS),
            max_retries: Self::DEFAULT_MAX_RETRIES,
            circuit_failure_threshold: Self::DEFAULT_FAILURE_THRESHOLD,
            circuit_cooldown: Duration::from_millis(Self::DEFAULT_COOLDOWN_MS),
            api_key: None,
            sender_id: None,
        }
    }

    /// Read and validate settings for `name`
    pub fn from_config(config: &ConfigManager, name: &str) -> Result<Self> {
        let key = |suffix: &str| format!("{}_{}", name.to_lowercase(), suffix);

        let settings = Self {
            name: name.to_string(),
            base_url: config.get_string(&key("base_url"))?,
            timeout: Duration::from_millis(
                config.get_parsed_or(&key("timeout_ms"), Self::DEFAULT_TIMEOUT_MS)?,
            ),
            max_retries: config.get_parsed_or(&key("max_retries"), Self::DEFAULT_MAX_RETRIES)?,
            circuit_failure_threshold: config.get_parsed_or(
                &key("circuit_failure_threshold"),
                Self::DEFAULT_FAILURE_THRESHOLD,
            )?,
            circuit_cooldown: Duration::from_millis(
                config.get_parsed_or(&key("circuit_cooldown_ms"), Self::DEFAULT_COOLDOWN_MS)?,
            ),
            api_key: config.get_string(&key("api_key")).ok(),
            sender_id: config.get_string(&key("sender_id")).ok(),
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Whether settings for `name` are present at all
    pub fn is_configured(config: &ConfigManager, name: &str) -> bool {
        config.has(&format!("{}_base_url", name.to_lowercase()))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_circuit(mut self, failure_threshold: u32, cooldown: Duration) -> Self {
        self.circuit_failure_threshold = failure_threshold;
        self.circuit_cooldown = cooldown;
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_sender_id(mut self, id: impl Into<String>) -> Self {
        self.sender_id = Some(id.into());
        self
    }
}

impl Validate for IntegrationSettings {
    fn validate(&self) -> Result<()> {
        ConfigValidator::not_empty(&self.name, "name")?;
        ConfigValidator::is_url(&self.base_url, &format!("{}_base_url", self.name))?;
        ConfigValidator::in_range(
            self.circuit_failure_threshold,
            1,
            u32::MAX,
            &format!("{}_circuit_failure_threshold", self.name),
        )?;
        if self.timeout.is_zero() {
            return Err(crate::ConfigError::ValidationError(format!(
                "{}_timeout_ms must be greater than zero",
                self.name
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for IntegrationSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntegrationSettings")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("circuit_failure_threshold", &self.circuit_failure_threshold)
            .field("circuit_cooldown", &self.circuit_cooldown)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("sender_id", &self.sender_id)
            .finish()
    }
}

/// Redelivery settings for the domain event bus
#[derive(Debug, Clone, PartialEq)]
pub struct EventBusSettings {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for EventBusSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            backoff_multiplier: 2.0,
        }
    }
}

impl EventBusSettings {
    /// Read `events_max_retries`, `events_base_delay_ms` and
    /// `events_backoff_multiplier`, falling back to the defaults
    pub fn from_config(config: &ConfigManager) -> Result<Self> {
        let defaults = Self::default();
        let settings = Self {
            max_retries: config.get_parsed_or("events_max_retries", defaults.max_retries)?,
            base_delay: Duration::from_millis(
                config.get_parsed_or("events_base_delay_ms", defaults.base_delay.as_millis() as u64)?,
            ),
            backoff_multiplier: config
                .get_parsed_or("events_backoff_multiplier", defaults.backoff_multiplier)?,
        };
        settings.validate()?;
        Ok(settings)
    }
}

impl Validate for EventBusSettings {
    fn validate(&self) -> Result<()> {
        ConfigValidator::in_range(
            self.backoff_multiplier,
            1.0,
            16.0,
            "events_backoff_multiplier",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ConfigError, FileFormat};

    #[test]
    fn test_integration_defaults() {
        let config = ConfigManager::new();
        config
            .set("messaging_base_url", "https://graph.example.com/v1")
            .unwrap();

        let settings = IntegrationSettings::from_config(&config, "messaging").unwrap();
        assert_eq!(settings.timeout, Duration::from_millis(10_000));
        assert_eq!(settings.max_retries, 2);
        assert_eq!(settings.circuit_failure_threshold, 5);
        assert_eq!(settings.circuit_cooldown, Duration::from_secs(30));
        assert!(settings.api_key.is_none());
    }

    #[test]
    fn test_integration_from_env_style_strings() {
        let config = ConfigManager::new();
        config
            .load_str(
                "CALENDAR_BASE_URL=https://calendar.example.com\n\
                 CALENDAR_TIMEOUT_MS=2500\n\
                 CALENDAR_MAX_RETRIES=4\n\
                 CALENDAR_CIRCUIT_FAILURE_THRESHOLD=3\n\
                 CALENDAR_CIRCUIT_COOLDOWN_MS=1000\n\
                 CALENDAR_API_KEY=s3cret\n\
                 CALENDAR_SENDER_ID=primary\n",
                FileFormat::Env,
            )
            .unwrap();

        let settings = IntegrationSettings::from_config(&config, "calendar").unwrap();
        assert_eq!(settings.timeout, Duration::from_millis(2500));
        assert_eq!(settings.max_retries, 4);
        assert_eq!(settings.circuit_failure_threshold, 3);
        assert_eq!(settings.circuit_cooldown, Duration::from_secs(1));
        assert_eq!(settings.api_key.as_deref(), Some("s3cret"));
        assert_eq!(settings.sender_id.as_deref(), Some("primary"));
    }

    #[test]
    fn test_missing_base_url() {
        let config = ConfigManager::new();
        assert!(!IntegrationSettings::is_configured(&config, "messaging"));
        assert!(matches!(
            IntegrationSettings::from_config(&config, "messaging"),
            Err(ConfigError::KeyNotFound(_))
        ));
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let config = ConfigManager::new();
        config.set("messaging_base_url", "graph.example.com").unwrap();
        assert!(IntegrationSettings::from_config(&config, "messaging").is_err());

        config.set("messaging_base_url", "https://graph.example.com").unwrap();
        config.set("messaging_circuit_failure_threshold", 0).unwrap();
        assert!(IntegrationSettings::from_config(&config, "messaging").is_err());
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let settings =
            IntegrationSettings::new("messaging", "https://x.example.com").with_api_key("topsecret");
        let rendered = format!("{:?}", settings);
        assert!(!rendered.contains("topsecret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_event_bus_settings() {
        let config = ConfigManager::new();
        assert_eq!(
            EventBusSettings::from_config(&config).unwrap(),
            EventBusSettings::default()
        );

        config.set("events_max_retries", "2").unwrap();
        config.set("events_base_delay_ms", 50).unwrap();
        config.set("events_backoff_multiplier", "3").unwrap();
        let settings = EventBusSettings::from_config(&config).unwrap();
        assert_eq!(settings.max_retries, 2);
        assert_eq!(settings.base_delay, Duration::from_millis(50));
        assert_eq!(settings.backoff_multiplier, 3.0);
    }
}

//! Resilient client configuration.

use crate::circuit_breaker::CircuitBreakerConfig;
use crate::retry::RetryConfig;
use praxis_config::IntegrationSettings;
use std::time::Duration;

/// Configuration for one [`ResilientHttpClient`](crate::ResilientHttpClient).
#[derive(Debug, Clone)]
pub struct ResilientClientConfig {
    /// Logical target name; keys the shared circuit breaker.
    pub target: String,
    /// Base URL request paths are resolved against.
    pub base_url: String,
    /// Per-attempt timeout, covering connect, send and body read.
    pub timeout: Duration,
    pub retry: RetryConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    /// Default headers for all requests.
    pub default_headers: Vec<(String, String)>,
    /// User agent string.
    pub user_agent: String,
}

impl ResilientClientConfig {
    pub fn new(target: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            base_url: base_url.into(),
            timeout: Duration::from_millis(IntegrationSettings::DEFAULT_TIMEOUT_MS),
            retry: RetryConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            default_headers: Vec::new(),
            user_agent: format!("praxis-http-client/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Create a new configuration builder.
    pub fn builder(
        target: impl Into<String>,
        base_url: impl Into<String>,
    ) -> ResilientClientConfigBuilder {
        ResilientClientConfigBuilder {
            config: Self::new(target, base_url),
        }
    }
}

impl From<&IntegrationSettings> for ResilientClientConfig {
    fn from(settings: &IntegrationSettings) -> Self {
        let mut config = Self::new(&settings.name, &settings.base_url);
        config.timeout = settings.timeout;
        config.retry.max_retries = settings.max_retries;
        config.circuit_breaker = CircuitBreakerConfig::new(
            settings.circuit_failure_threshold,
            settings.circuit_cooldown,
        );
        config
    }
}

/// Builder for [`ResilientClientConfig`].
#[derive(Debug)]
pub struct ResilientClientConfigBuilder {
    config: ResilientClientConfig,
}

impl ResilientClientConfigBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.retry.max_retries = max_retries;
        self
    }

    /// Set the full retry configuration.
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    pub fn circuit_breaker(mut self, failure_threshold: u32, cooldown: Duration) -> Self {
        self.config.circuit_breaker = CircuitBreakerConfig::new(failure_threshold, cooldown);
        self
    }

    /// Add a default header for all requests.
    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.push((name.into(), value.into()));
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    pub fn build(self) -> ResilientClientConfig {
        self.config
    }
}

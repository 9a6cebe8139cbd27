//! Integration error types.

use praxis_config::ConfigError;
use praxis_http_client::HttpClientError;
use praxis_tenancy::TenantError;
use thiserror::Error;

/// Result type for integration operations.
pub type Result<T> = std::result::Result<T, IntegrationError>;

/// Integration errors.
#[derive(Debug, Error)]
pub enum IntegrationError {
    /// A required setting (API key, sender id, ...) is missing.
    #[error("Integration {integration} is not configured: missing {setting}")]
    NotConfigured {
        integration: String,
        setting: &'static str,
    },

    /// The provider rejected the request or could not be reached.
    #[error(transparent)]
    Http(#[from] HttpClientError),

    #[error(transparent)]
    Tenant(#[from] TenantError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

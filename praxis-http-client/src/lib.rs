//! # Praxis HTTP Client
//!
//! Outbound HTTP for third-party integrations (messaging providers,
//! calendar providers) that must not let a degraded dependency stall the
//! core request path.
//!
//! ## Features
//!
//! - **Circuit Breaker**: one breaker per target, shared through a
//!   [`CircuitBreakerRegistry`]; fails fast while the target is unhealthy and
//!   probes it with a single trial call after a cooldown
//! - **Retry with Backoff**: timeouts, connection failures, 408, 429 and 5xx
//!   are retried with exponential backoff; other 4xx fail immediately
//! - **Timeouts**: enforced per attempt
//! - **Background sends**: `*_in_background` variants for notifications that
//!   must never block or fail the caller
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use praxis_config::IntegrationSettings;
//! use praxis_http_client::{CircuitBreakerRegistry, ResilientHttpClient};
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = IntegrationSettings::new("messaging", "https://graph.example.com/v1");
//! let registry = CircuitBreakerRegistry::new();
//! let client = ResilientHttpClient::from_settings(&settings, &registry)?;
//!
//! match client.post("messages", &json!({ "to": "+5511999999999" }), None).await {
//!     Ok(response) => println!("sent: {}", response.status()),
//!     Err(e) if e.is_circuit_open() => println!("messaging unavailable, skipping"),
//!     Err(e) => return Err(e.into()),
//! }
//! # Ok(())
//! # }
//! ```

mod circuit_breaker;
mod client;
mod config;
mod error;
mod registry;
mod response;
mod retry;

pub use circuit_breaker::{CallPermit, CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use client::ResilientHttpClient;
pub use config::{ResilientClientConfig, ResilientClientConfigBuilder};
pub use error::{CircuitOpenError, ErrorClass, HttpClientError, Result};
pub use registry::CircuitBreakerRegistry;
pub use response::Response;
pub use retry::RetryConfig;

// Re-export common types
pub use bytes::Bytes;
pub use http::{HeaderMap, HeaderValue, Method, StatusCode, header};
pub use url::Url;

/// Prelude for common imports.
///
/// ```
/// use praxis_http_client::prelude::*;
/// ```
pub mod prelude {
    pub use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
    pub use crate::client::ResilientHttpClient;
    pub use crate::config::{ResilientClientConfig, ResilientClientConfigBuilder};
    pub use crate::error::{ErrorClass, HttpClientError, Result};
    pub use crate::registry::CircuitBreakerRegistry;
    pub use crate::response::Response;
    pub use crate::retry::RetryConfig;
    pub use http::{HeaderMap, HeaderValue, Method, StatusCode, header};
}

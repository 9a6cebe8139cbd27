//! Resilient HTTP client implementation.

use crate::{
    CircuitBreaker, CircuitBreakerRegistry, HttpClientError, ResilientClientConfig, Response,
    Result,
};
use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http::{HeaderMap, Method};
use praxis_config::IntegrationSettings;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{Instrument, Span, debug, warn};
use url::Url;

/// HTTP client for one external target, guarded by a circuit breaker and
/// retrying retryable failures with exponential backoff.
///
/// Every attempt first asks the breaker for admission and reports its
/// outcome back. Timeouts, connection failures, 408, 429 and 5xx are retried
/// up to `max_retries` times; other 4xx answers fail at once.
///
/// # Examples
///
/// ```no_run
/// use praxis_http_client::{CircuitBreakerRegistry, ResilientClientConfig, ResilientHttpClient};
/// use std::time::Duration;
///
/// # async fn run() -> praxis_http_client::Result<()> {
/// let registry = CircuitBreakerRegistry::new();
/// let config = ResilientClientConfig::builder("calendar", "https://calendar.example.com/v3")
///     .timeout(Duration::from_secs(5))
///     .max_retries(2)
///     .build();
///
/// let client = ResilientHttpClient::with_registry(config, &registry)?;
/// let calendars: serde_json::Value = client.get_json("calendars", None).await?;
/// # let _ = calendars;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ResilientHttpClient {
    inner: reqwest::Client,
    config: Arc<ResilientClientConfig>,
    base_url: Url,
    breaker: Arc<CircuitBreaker>,
}

impl ResilientHttpClient {
    /// Create a client with its own, unshared breaker.
    pub fn new(config: ResilientClientConfig) -> Result<Self> {
        let breaker = Arc::new(CircuitBreaker::new(
            config.target.clone(),
            config.circuit_breaker.clone(),
        ));
        Self::with_breaker(config, breaker)
    }

    /// Create a client sharing the registry's breaker for its target.
    pub fn with_registry(
        config: ResilientClientConfig,
        registry: &CircuitBreakerRegistry,
    ) -> Result<Self> {
        let breaker = registry.get_or_create(&config.target, config.circuit_breaker.clone());
        Self::with_breaker(config, breaker)
    }

    /// Create a client from integration settings.
    pub fn from_settings(
        settings: &IntegrationSettings,
        registry: &CircuitBreakerRegistry,
    ) -> Result<Self> {
        Self::with_registry(ResilientClientConfig::from(settings), registry)
    }

    pub fn with_breaker(config: ResilientClientConfig, breaker: Arc<CircuitBreaker>) -> Result<Self> {
        let mut base_url = Url::parse(&config.base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let mut headers = HeaderMap::new();
        for (name, value) in &config.default_headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| HttpClientError::InvalidHeader(format!("{}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| HttpClientError::InvalidHeader(format!("{}: {}", name, e)))?;
            headers.insert(name, value);
        }

        let inner = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self {
            inner,
            config: Arc::new(config),
            base_url,
            breaker,
        })
    }

    /// Get the client configuration.
    pub fn config(&self) -> &ResilientClientConfig {
        &self.config
    }

    pub fn target(&self) -> &str {
        &self.config.target
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub async fn get(&self, path: &str, headers: Option<&HeaderMap>) -> Result<Response> {
        self.send(Method::GET, path, None, headers).await
    }

    pub async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        headers: Option<&HeaderMap>,
    ) -> Result<Response> {
        self.request(Method::POST, path, Some(body), headers).await
    }

    pub async fn put<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        headers: Option<&HeaderMap>,
    ) -> Result<Response> {
        self.request(Method::PUT, path, Some(body), headers).await
    }

    pub async fn delete(&self, path: &str, headers: Option<&HeaderMap>) -> Result<Response> {
        self.send(Method::DELETE, path, None, headers).await
    }

    /// Any method, with an optional JSON body.
    pub async fn request<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        headers: Option<&HeaderMap>,
    ) -> Result<Response> {
        let body = body.map(encode).transpose()?;
        self.send(method, path, body, headers).await
    }

    /// GET and decode the JSON response.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        headers: Option<&HeaderMap>,
    ) -> Result<T> {
        self.get(path, headers).await?.json()
    }

    /// POST a JSON body and decode the JSON response.
    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        headers: Option<&HeaderMap>,
    ) -> Result<T> {
        self.post(path, body, headers).await?.json()
    }

    /// Fire-and-forget POST. Failures are logged, never returned.
    pub fn post_in_background<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        headers: Option<HeaderMap>,
    ) -> JoinHandle<()> {
        self.spawn_encoded(Method::POST, path, body, headers)
    }

    /// Fire-and-forget PUT. Failures are logged, never returned.
    pub fn put_in_background<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        headers: Option<HeaderMap>,
    ) -> JoinHandle<()> {
        self.spawn_encoded(Method::PUT, path, body, headers)
    }

    /// Fire-and-forget DELETE. Failures are logged, never returned.
    pub fn delete_in_background(&self, path: &str, headers: Option<HeaderMap>) -> JoinHandle<()> {
        self.spawn_send(Method::DELETE, path, None, headers)
    }

    fn spawn_encoded<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
        headers: Option<HeaderMap>,
    ) -> JoinHandle<()> {
        match encode(body) {
            Ok(body) => self.spawn_send(method, path, Some(body), headers),
            Err(e) => {
                warn!(target_name = %self.config.target, %method, path, error = %e, "Background request not sent");
                tokio::spawn(async {})
            }
        }
    }

    fn spawn_send(
        &self,
        method: Method,
        path: &str,
        body: Option<Bytes>,
        headers: Option<HeaderMap>,
    ) -> JoinHandle<()> {
        let client = self.clone();
        let path = path.to_string();

        tokio::spawn(
            async move {
                if let Err(e) = client.send(method.clone(), &path, body, headers.as_ref()).await {
                    warn!(
                        target_name = %client.config.target,
                        %method,
                        path = %path,
                        error = %e,
                        "Background request failed"
                    );
                }
            }
            .instrument(Span::current()),
        )
    }

    /// Execute a request with circuit breaker and retry logic.
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Bytes>,
        headers: Option<&HeaderMap>,
    ) -> Result<Response> {
        let url = self.url_for(path)?;
        let retry = &self.config.retry;
        let mut attempts = 0;

        loop {
            attempts += 1;

            let permit = self.breaker.try_acquire().inspect_err(|_| {
                debug!(target_name = %self.config.target, %method, url = %url, "Circuit open, failing fast");
            })?;

            let error = match self.attempt(&method, &url, body.clone(), headers).await {
                Ok(response) => {
                    permit.success();
                    return Ok(response);
                }
                Err(e) => e,
            };

            if error.is_dependency_failure() {
                permit.failure();
            } else {
                permit.success();
            }

            if !error.is_retryable() {
                return Err(error);
            }

            if !retry.should_retry(attempts, &error) {
                return Err(HttpClientError::RetryExhausted {
                    attempts,
                    last: Box::new(error),
                });
            }

            let delay = retry.delay_for_attempt(attempts - 1);
            debug!(
                target_name = %self.config.target,
                %method,
                url = %url,
                attempt = attempts,
                retry_in_ms = delay.as_millis() as u64,
                error = %error,
                "Retrying request"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// One network attempt, bounded by the configured timeout.
    async fn attempt(
        &self,
        method: &Method,
        url: &Url,
        body: Option<Bytes>,
        headers: Option<&HeaderMap>,
    ) -> Result<Response> {
        let timeout = self.config.timeout;

        let mut request = self.inner.request(method.clone(), url.clone());
        if let Some(headers) = headers {
            request = request.headers(headers.clone());
        }
        if let Some(body) = body {
            request = request.header(CONTENT_TYPE, "application/json").body(body);
        }

        let exchange = async {
            let response = request
                .send()
                .await
                .map_err(|e| HttpClientError::from_transport(e, timeout))?;
            Response::from_reqwest(response, timeout).await
        };

        tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| HttpClientError::Timeout(timeout))??
            .error_for_status()
    }

    fn url_for(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }
}

fn encode<B: Serialize + ?Sized>(body: &B) -> Result<Bytes> {
    Ok(Bytes::from(serde_json::to_vec(body)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn client(base_url: &str) -> ResilientHttpClient {
        ResilientHttpClient::new(ResilientClientConfig::new("test", base_url)).unwrap()
    }

    #[test]
    fn test_paths_resolve_under_base_path() {
        let client = client("https://api.example.com/v1");

        assert_eq!(
            client.url_for("messages").unwrap().as_str(),
            "https://api.example.com/v1/messages"
        );
        assert_eq!(
            client.url_for("/messages/42").unwrap().as_str(),
            "https://api.example.com/v1/messages/42"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let result = ResilientHttpClient::new(ResilientClientConfig::new("test", "not a url"));
        assert!(matches!(result, Err(HttpClientError::InvalidUrl(_))));
    }

    #[test]
    fn test_invalid_default_header() {
        let config = ResilientClientConfig::builder("test", "https://api.example.com")
            .default_header("bad header", "x")
            .build();
        assert!(matches!(
            ResilientHttpClient::new(config),
            Err(HttpClientError::InvalidHeader(_))
        ));
    }

    #[test]
    fn test_shared_breaker_via_registry() {
        let registry = CircuitBreakerRegistry::new();
        let config = ResilientClientConfig::builder("calendar", "https://calendar.example.com")
            .circuit_breaker(2, Duration::from_secs(5))
            .build();

        let a = ResilientHttpClient::with_registry(config.clone(), &registry).unwrap();
        let b = ResilientHttpClient::with_registry(config, &registry).unwrap();
        assert!(Arc::ptr_eq(a.breaker(), b.breaker()));
    }
}

//! Circuit breaker pattern implementation.
//!
//! One breaker guards one logical target. It opens after a run of
//! consecutive failures, rejects calls while cooling down, then lets a
//! single trial call decide whether to close again.

use crate::error::CircuitOpenError;
use parking_lot::Mutex;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls pass through.
    Closed,
    /// Calls are rejected without reaching the target.
    Open,
    /// One trial call is let through to test whether the target recovered.
    HalfOpen,
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,
    /// Time spent open before a trial call is allowed.
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(30),
        }
    }
}

impl CircuitBreakerConfig {
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            failure_threshold,
            cooldown,
        }
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

/// Circuit breaker implementation.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
}

/// Admission ticket returned by [`CircuitBreaker::try_acquire`].
///
/// Report the outcome with [`success`](Self::success) or
/// [`failure`](Self::failure). A trial permit dropped without an outcome
/// (e.g. the caller was cancelled) frees the trial slot again.
#[must_use = "report the call outcome on the permit"]
#[derive(Debug)]
pub struct CallPermit<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    settled: bool,
}

impl CallPermit<'_> {
    /// Whether this call is the half-open trial.
    pub fn is_trial(&self) -> bool {
        self.trial
    }

    pub fn success(mut self) {
        self.settled = true;
        self.breaker.record_success();
    }

    pub fn failure(mut self) {
        self.settled = true;
        self.breaker.record_failure();
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if self.trial && !self.settled {
            let mut inner = self.breaker.inner.lock();
            if inner.state == CircuitState::HalfOpen {
                debug!(target_name = %self.breaker.name, "Trial call abandoned, releasing slot");
                inner.trial_in_flight = false;
            }
        }
    }
}

impl CircuitBreaker {
    /// Create a new circuit breaker for the named target.
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                trial_in_flight: false,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Get the current circuit state.
    pub fn state(&self) -> CircuitState {
        let mut inner = self.inner.lock();
        self.refresh(&mut inner);
        inner.state
    }

    /// Ask to make a call.
    ///
    /// Closed admits everyone. Open rejects everyone until the cooldown has
    /// elapsed. Half-open admits exactly one trial; concurrent callers are
    /// rejected until the trial reports.
    pub fn try_acquire(&self) -> Result<CallPermit<'_>, CircuitOpenError> {
        let mut inner = self.inner.lock();
        self.refresh(&mut inner);

        let trial = match inner.state {
            CircuitState::Closed => false,
            CircuitState::HalfOpen if !inner.trial_in_flight => {
                inner.trial_in_flight = true;
                true
            }
            CircuitState::HalfOpen | CircuitState::Open => {
                return Err(CircuitOpenError {
                    target: self.name.clone(),
                });
            }
        };

        Ok(CallPermit {
            breaker: self,
            trial,
            settled: false,
        })
    }

    /// Record a successful call.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => inner.consecutive_failures = 0,
            CircuitState::HalfOpen => {
                info!(target_name = %self.name, "Circuit breaker closing");
                inner.state = CircuitState::Closed;
                inner.consecutive_failures = 0;
                inner.opened_at = None;
                inner.trial_in_flight = false;
            }
            CircuitState::Open => {
                // Late result of a call admitted before the circuit opened
                debug!(target_name = %self.name, "Success recorded while circuit open, ignoring");
            }
        }
    }

    /// Record a failed call.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
                if inner.consecutive_failures >= self.config.failure_threshold.max(1) {
                    warn!(
                        target_name = %self.name,
                        failures = inner.consecutive_failures,
                        cooldown_ms = self.config.cooldown.as_millis() as u64,
                        "Circuit breaker opening"
                    );
                    self.open(&mut inner);
                }
            }
            CircuitState::HalfOpen => {
                inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
                warn!(target_name = %self.name, "Trial call failed, circuit breaker reopening");
                self.open(&mut inner);
            }
            CircuitState::Open => {}
        }
    }

    /// Run `f` under the breaker, recording its outcome.
    pub async fn call<F, Fut, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<CircuitOpenError>,
    {
        let permit = self.try_acquire()?;
        match f().await {
            Ok(value) => {
                permit.success();
                Ok(value)
            }
            Err(e) => {
                permit.failure();
                Err(e)
            }
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.inner.lock().consecutive_failures
    }

    /// When the circuit last opened, if it is not closed.
    pub fn opened_at(&self) -> Option<Instant> {
        self.inner.lock().opened_at
    }

    /// Force the breaker back to closed.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        if inner.state != CircuitState::Closed {
            info!(target_name = %self.name, "Circuit breaker reset");
        }
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.trial_in_flight = false;
    }

    fn open(&self, inner: &mut BreakerState) {
        inner.state = CircuitState::Open;
        inner.opened_at = Some(Instant::now());
        inner.trial_in_flight = false;
    }

    /// Move open to half-open once the cooldown has elapsed.
    fn refresh(&self, inner: &mut BreakerState) {
        if inner.state != CircuitState::Open {
            return;
        }
        if let Some(opened) = inner.opened_at
            && opened.elapsed() >= self.config.cooldown
        {
            debug!(target_name = %self.name, "Circuit breaker half-open");
            inner.state = CircuitState::HalfOpen;
            inner.trial_in_flight = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HttpClientError;
    use tokio::time::advance;

    fn breaker(threshold: u32) -> CircuitBreaker {
        CircuitBreaker::new(
            "calendar",
            CircuitBreakerConfig::new(threshold, Duration::from_secs(30)),
        )
    }

    #[test]
    fn test_circuit_breaker_opens_after_failures() {
        let cb = breaker(3);

        assert_eq!(cb.state(), CircuitState::Closed);
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.try_acquire().is_ok());

        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(cb.opened_at().is_some());

        let err = cb.try_acquire().unwrap_err();
        assert_eq!(err.target, "calendar");
    }

    #[test]
    fn test_success_resets_consecutive_failures() {
        let cb = breaker(3);

        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        cb.record_failure();

        assert_eq!(cb.consecutive_failures(), 2);
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_after_cooldown() {
        let cb = breaker(1);
        cb.record_failure();

        advance(Duration::from_secs(29)).await;
        assert_eq!(cb.state(), CircuitState::Open);

        advance(Duration::from_secs(1)).await;
        assert_eq!(cb.state(), CircuitState::HalfOpen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exactly_one_trial_call() {
        let cb = breaker(1);
        cb.record_failure();
        advance(Duration::from_secs(30)).await;

        let trial = cb.try_acquire().unwrap();
        assert!(trial.is_trial());
        assert!(cb.try_acquire().is_err());
        assert!(cb.try_acquire().is_err());

        trial.success();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.consecutive_failures(), 0);
        assert!(cb.opened_at().is_none());
        assert!(!cb.try_acquire().unwrap().is_trial());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_trial_reopens_with_fresh_cooldown() {
        let cb = breaker(1);
        cb.record_failure();
        let first_open = cb.opened_at().unwrap();

        advance(Duration::from_secs(30)).await;
        cb.try_acquire().unwrap().failure();

        assert_eq!(cb.state(), CircuitState::Open);
        assert!(cb.opened_at().unwrap() > first_open);

        advance(Duration::from_secs(15)).await;
        assert_eq!(cb.state(), CircuitState::Open);
        advance(Duration::from_secs(15)).await;
        assert_eq!(cb.state(), CircuitState::HalfOpen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_trial_frees_slot() {
        let cb = breaker(1);
        cb.record_failure();
        advance(Duration::from_secs(30)).await;

        drop(cb.try_acquire().unwrap());

        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert!(cb.try_acquire().unwrap().is_trial());
    }

    #[tokio::test]
    async fn test_call_records_outcomes() {
        let cb = breaker(2);

        let ok: Result<u32, HttpClientError> = cb.call(|| async { Ok(7) }).await;
        assert_eq!(ok.unwrap(), 7);

        for _ in 0..2 {
            let _ = cb
                .call(|| async { Err::<(), _>(HttpClientError::Connection("reset".into())) })
                .await;
        }
        assert_eq!(cb.state(), CircuitState::Open);

        let rejected = cb.call(|| async { Ok::<_, HttpClientError>(()) }).await;
        assert!(matches!(rejected, Err(HttpClientError::CircuitOpen { .. })));
    }

    #[test]
    fn test_reset() {
        let cb = breaker(1);
        cb.record_failure();
        cb.reset();

        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.consecutive_failures(), 0);
    }
}

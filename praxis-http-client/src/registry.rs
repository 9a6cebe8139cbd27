//! Shared circuit breakers, one per logical target.

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Hands out the breaker for a target name, creating it on first use.
///
/// Every client talking to the same target shares one breaker, so the
/// target's health is tracked across all callers.
#[derive(Debug, Default, Clone)]
pub struct CircuitBreakerRegistry {
    breakers: Arc<RwLock<HashMap<String, Arc<CircuitBreaker>>>>,
}

impl CircuitBreakerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The breaker for `target`. `config` only applies when it is created.
    pub fn get_or_create(&self, target: &str, config: CircuitBreakerConfig) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.read().get(target) {
            return breaker.clone();
        }

        self.breakers
            .write()
            .entry(target.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(target, config)))
            .clone()
    }

    pub fn get(&self, target: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.read().get(target).cloned()
    }

    /// Current state of every breaker, sorted by target name.
    pub fn states(&self) -> Vec<(String, CircuitState)> {
        let mut states: Vec<_> = self
            .breakers
            .read()
            .iter()
            .map(|(name, breaker)| (name.clone(), breaker.state()))
            .collect();
        states.sort_by(|a, b| a.0.cmp(&b.0));
        states
    }

    pub fn reset_all(&self) {
        for breaker in self.breakers.read().values() {
            breaker.reset();
        }
    }

    pub fn len(&self) -> usize {
        self.breakers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_same_target_shares_breaker() {
        let registry = CircuitBreakerRegistry::new();
        let config = CircuitBreakerConfig::new(1, Duration::from_secs(30));

        let a = registry.get_or_create("messaging", config.clone());
        let b = registry.get_or_create("messaging", CircuitBreakerConfig::default());
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(b.config().failure_threshold, 1);

        a.record_failure();
        assert_eq!(registry.get("messaging").unwrap().state(), CircuitState::Open);

        let other = registry.get_or_create("calendar", config);
        assert_eq!(other.state(), CircuitState::Closed);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_states_and_reset_all() {
        let registry = CircuitBreakerRegistry::new();
        registry
            .get_or_create("messaging", CircuitBreakerConfig::new(1, Duration::from_secs(30)))
            .record_failure();
        registry.get_or_create("calendar", CircuitBreakerConfig::default());

        assert_eq!(
            registry.states(),
            vec![
                ("calendar".to_string(), CircuitState::Closed),
                ("messaging".to_string(), CircuitState::Open),
            ]
        );

        registry.reset_all();
        assert!(registry.states().iter().all(|(_, s)| *s == CircuitState::Closed));
    }
}

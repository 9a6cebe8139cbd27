//! Composition root.

use praxis_config::{ConfigManager, EventBusSettings, IntegrationSettings};
use praxis_events::EventBus;
use praxis_http_client::{CircuitBreakerRegistry, CircuitState};
use praxis_integrations::{
    CALENDAR, CalendarSyncAdapter, MESSAGING, MessagingAdapter, Result,
};
use std::sync::Arc;
use tracing::info;

/// Process-wide services, built once at startup and handed to use cases.
///
/// Owns the single [`EventBus`] and the [`CircuitBreakerRegistry`] every
/// outbound client shares. Integrations are present only when their
/// `<name>_base_url` is configured. Tests build a fresh instance each so no
/// subscriptions, dead letters or breaker state leak between them.
///
/// # Examples
///
/// ```
/// use praxis::CoreServices;
/// use praxis::config::ConfigManager;
///
/// let config = ConfigManager::new();
/// config.set("events_max_retries", 2).unwrap();
///
/// let services = CoreServices::from_config(&config).unwrap();
/// assert_eq!(services.events().config().retry.max_retries, 2);
/// assert!(services.messaging().is_none());
/// ```
#[derive(Clone)]
pub struct CoreServices {
    events: EventBus,
    breakers: CircuitBreakerRegistry,
    messaging: Option<Arc<MessagingAdapter>>,
    calendar: Option<Arc<CalendarSyncAdapter>>,
}

impl CoreServices {
    /// Services around `events`, with no integrations.
    pub fn new(events: EventBus) -> Self {
        Self {
            events,
            breakers: CircuitBreakerRegistry::new(),
            messaging: None,
            calendar: None,
        }
    }

    /// Build everything from configuration.
    ///
    /// An integration whose base URL is set but whose other settings are
    /// missing or invalid is a startup error, not a silently disabled
    /// integration.
    pub fn from_config(config: &ConfigManager) -> Result<Self> {
        let events = EventBus::from_settings(&EventBusSettings::from_config(config)?);
        let mut services = Self::new(events);

        if IntegrationSettings::is_configured(config, MESSAGING) {
            let settings = IntegrationSettings::from_config(config, MESSAGING)?;
            let adapter = MessagingAdapter::from_settings(&settings, &services.breakers)?;
            services.messaging = Some(Arc::new(adapter));
        }
        if IntegrationSettings::is_configured(config, CALENDAR) {
            let settings = IntegrationSettings::from_config(config, CALENDAR)?;
            let adapter = CalendarSyncAdapter::from_settings(&settings, &services.breakers)?;
            services.calendar = Some(Arc::new(adapter));
        }

        info!(
            messaging = services.messaging.is_some(),
            calendar = services.calendar.is_some(),
            "Core services ready"
        );
        Ok(services)
    }

    pub fn with_messaging(mut self, adapter: MessagingAdapter) -> Self {
        self.messaging = Some(Arc::new(adapter));
        self
    }

    pub fn with_calendar(mut self, adapter: CalendarSyncAdapter) -> Self {
        self.calendar = Some(Arc::new(adapter));
        self
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Registry new adapters must be built against to share breakers.
    pub fn breakers(&self) -> &CircuitBreakerRegistry {
        &self.breakers
    }

    pub fn messaging(&self) -> Option<&Arc<MessagingAdapter>> {
        self.messaging.as_ref()
    }

    pub fn calendar(&self) -> Option<&Arc<CalendarSyncAdapter>> {
        self.calendar.as_ref()
    }

    /// Breaker state per integration target, for health endpoints.
    pub fn integration_health(&self) -> Vec<(String, CircuitState)> {
        self.breakers.states()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use praxis_integrations::IntegrationError;

    #[test]
    fn test_integrations_from_config() {
        let config = ConfigManager::new();
        config.set("messaging_base_url", "https://graph.example.com/v1").unwrap();
        config.set("messaging_api_key", "k").unwrap();
        config.set("messaging_sender_id", "1001").unwrap();

        let services = CoreServices::from_config(&config).unwrap();

        assert!(services.messaging().is_some());
        assert!(services.calendar().is_none());
        assert_eq!(
            services.integration_health(),
            vec![(MESSAGING.to_string(), CircuitState::Closed)]
        );
    }

    #[test]
    fn test_incomplete_integration_fails_startup() {
        let config = ConfigManager::new();
        config.set("calendar_base_url", "https://calendar.example.com/v3").unwrap();

        let err = CoreServices::from_config(&config).err().unwrap();
        assert!(matches!(
            err,
            IntegrationError::NotConfigured { setting: "api_key", .. }
        ));
    }

    #[test]
    fn test_instances_do_not_share_state() {
        let a = CoreServices::new(EventBus::new());
        let b = CoreServices::new(EventBus::new());

        a.events().subscribe_fn("invoice.paid", "billing", |_event| async {
            Ok::<(), praxis_events::EventHandlerError>(())
        });

        assert_eq!(a.events().subscription_count("invoice.paid"), 1);
        assert_eq!(b.events().subscription_count("invoice.paid"), 0);
    }
}

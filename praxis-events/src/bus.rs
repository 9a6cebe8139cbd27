//! Event bus implementation

use crate::dead_letter::{DeadLetterEntry, DeadLetterStore};
use crate::error::{EventBusError, EventHandlerError};
use crate::event::DomainEvent;
use crate::handler::{EventHandler, FnHandler};
use crate::retry::RetryPolicy;
use dashmap::DashMap;
use futures::FutureExt;
use futures::future::join_all;
use praxis_config::EventBusSettings;
use praxis_tenancy::{AuthenticatedContext, TenantContextStore, TenantError};
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// User id bound for handlers when the event was not triggered by a person.
pub const SYSTEM_USER: &str = "system";

#[derive(Clone)]
struct Subscription {
    module_name: String,
    handler: Arc<dyn EventHandler>,
}

/// In-process event bus.
///
/// Modules subscribe by event name under their own module name. `publish`
/// runs every subscriber with its own retry loop, waits for all of them and
/// never fails: exhausted deliveries land in the dead-letter store.
///
/// Handlers run on the publishing task, so they see the publisher's
/// [`TenantContextStore`] context. When nothing is bound (replays, background
/// jobs) the handler runs under a context derived from the event. An event
/// whose tenant differs from the bound one is never handed to a handler: each
/// subscriber gets a fatal dead letter instead.
///
/// # Examples
///
/// ```
/// use praxis_events::{DomainEvent, EventBus, EventHandlerError};
///
/// # tokio_test::block_on(async {
/// let bus = EventBus::new();
/// bus.subscribe_fn("invoice.paid", "notifications", |event: DomainEvent| async move {
///     assert_eq!(event.tenant_id(), "clinic-a");
///     Ok::<(), EventHandlerError>(())
/// });
///
/// let report = bus.publish(DomainEvent::new("invoice.paid", "clinic-a", "inv-1")).await;
/// assert!(report.all_delivered());
/// assert!(bus.dead_letters().is_empty());
/// # });
/// ```
#[derive(Clone)]
pub struct EventBus {
    subscriptions: Arc<DashMap<String, Vec<Subscription>>>,
    dead_letters: Arc<DeadLetterStore>,
    config: Arc<EventBusConfig>,
}

/// Event bus configuration
#[derive(Debug, Clone)]
pub struct EventBusConfig {
    /// Redelivery policy applied to every subscriber
    pub retry: RetryPolicy,

    /// Run different modules' handlers concurrently
    pub concurrent: bool,

    /// Emit info/debug logs for subscriptions and deliveries
    pub enable_logging: bool,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            concurrent: true,
            enable_logging: true,
        }
    }
}

/// How one module's delivery ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    DeadLettered { dead_letter_id: Uuid },
}

/// Result of delivering one event to one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDelivery {
    pub module_name: String,
    pub attempts: u32,
    pub outcome: DeliveryOutcome,
}

impl ModuleDelivery {
    pub fn is_delivered(&self) -> bool {
        self.outcome == DeliveryOutcome::Delivered
    }
}

/// Per-module outcome of a publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    pub event_id: Uuid,
    pub event_name: String,
    pub deliveries: Vec<ModuleDelivery>,
}

impl PublishReport {
    pub fn subscriber_count(&self) -> usize {
        self.deliveries.len()
    }

    /// True when every subscriber succeeded (vacuously true with none).
    pub fn all_delivered(&self) -> bool {
        self.deliveries.iter().all(ModuleDelivery::is_delivered)
    }

    pub fn delivery_for(&self, module_name: &str) -> Option<&ModuleDelivery> {
        self.deliveries.iter().find(|d| d.module_name == module_name)
    }

    pub fn dead_lettered_modules(&self) -> Vec<&str> {
        self.deliveries
            .iter()
            .filter(|d| !d.is_delivered())
            .map(|d| d.module_name.as_str())
            .collect()
    }

    pub fn total_attempts(&self) -> u32 {
        self.deliveries.iter().map(|d| d.attempts).sum()
    }
}

impl EventBus {
    /// Create new event bus
    pub fn new() -> Self {
        Self::with_config(EventBusConfig::default())
    }

    /// Create event bus with custom config
    pub fn with_config(config: EventBusConfig) -> Self {
        Self {
            subscriptions: Arc::new(DashMap::new()),
            dead_letters: Arc::new(DeadLetterStore::new()),
            config: Arc::new(config),
        }
    }

    /// Create event bus with the retry policy from configuration
    pub fn from_settings(settings: &EventBusSettings) -> Self {
        Self::with_config(EventBusConfig {
            retry: RetryPolicy::from(settings),
            ..EventBusConfig::default()
        })
    }

    pub fn builder() -> EventBusBuilder {
        EventBusBuilder::new()
    }

    pub fn config(&self) -> &EventBusConfig {
        &self.config
    }

    /// Register `handler` for `event_name` on behalf of `module_name`.
    ///
    /// Registering twice delivers twice; callers subscribe once at startup.
    pub fn subscribe<H>(
        &self,
        event_name: impl Into<String>,
        module_name: impl Into<String>,
        handler: H,
    ) where
        H: EventHandler + 'static,
    {
        let event_name = event_name.into();
        let module_name = module_name.into();

        if self.config.enable_logging {
            debug!(event = %event_name, module = %module_name, "Subscribed handler");
        }

        self.subscriptions
            .entry(event_name)
            .or_default()
            .push(Subscription {
                module_name,
                handler: Arc::new(handler),
            });
    }

    /// Register an async closure taking the event by value.
    pub fn subscribe_fn<F, Fut>(
        &self,
        event_name: impl Into<String>,
        module_name: impl Into<String>,
        f: F,
    ) where
        F: Fn(DomainEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), EventHandlerError>> + Send + 'static,
    {
        self.subscribe(event_name, module_name, FnHandler::new(f));
    }

    /// Deliver `event` to every subscriber and wait for all of them.
    pub async fn publish(&self, event: DomainEvent) -> PublishReport {
        let subscriptions: Vec<Subscription> = self
            .subscriptions
            .get(event.event_name())
            .map(|subs| subs.value().clone())
            .unwrap_or_default();

        if self.config.enable_logging {
            info!(
                event = %event.event_name(),
                event_id = %event.event_id(),
                tenant_id = %event.tenant_id(),
                subscribers = subscriptions.len(),
                "Publishing event"
            );
        }

        let deliveries = if self.config.concurrent {
            join_all(subscriptions.iter().map(|sub| self.deliver(&event, sub))).await
        } else {
            let mut deliveries = Vec::with_capacity(subscriptions.len());
            for sub in &subscriptions {
                deliveries.push(self.deliver(&event, sub).await);
            }
            deliveries
        };

        PublishReport {
            event_id: event.event_id(),
            event_name: event.event_name().to_string(),
            deliveries,
        }
    }

    /// Run the retry loop again for one dead-lettered delivery.
    ///
    /// The entry is removed first; exhausting the attempts again records a
    /// fresh entry.
    pub async fn replay_dead_letter(&self, id: Uuid) -> Result<ModuleDelivery, EventBusError> {
        let entry = self
            .dead_letters
            .get(id)
            .ok_or(EventBusError::DeadLetterNotFound(id))?;

        let subscription = self
            .find_subscription(entry.event.event_name(), &entry.module_name)
            .ok_or_else(|| EventBusError::SubscriptionNotFound {
                event_name: entry.event.event_name().to_string(),
                module_name: entry.module_name.clone(),
            })?;

        if self.dead_letters.take(id).is_none() {
            return Err(EventBusError::DeadLetterNotFound(id));
        }

        if self.config.enable_logging {
            info!(
                dead_letter_id = %id,
                event = %entry.event.event_name(),
                module = %entry.module_name,
                "Replaying dead letter"
            );
        }

        Ok(self.deliver(&entry.event, &subscription).await)
    }

    async fn deliver(&self, event: &DomainEvent, subscription: &Subscription) -> ModuleDelivery {
        let policy = &self.config.retry;
        let module_name = subscription.module_name.as_str();
        let mut attempts = 0;

        if let Some(ctx) = TenantContextStore::try_get_context()
            && ctx.tenant_id != event.tenant_id()
        {
            let mismatch = EventHandlerError::from(TenantError::TenantMismatch {
                expected: ctx.tenant_id.clone(),
                found: event.tenant_id().to_string(),
            });
            return self.dead_letter(event, module_name, mismatch, attempts);
        }

        loop {
            attempts += 1;

            let result = with_event_context(
                event,
                AssertUnwindSafe(subscription.handler.handle(event)).catch_unwind(),
            )
            .await;

            let failure = match result {
                Ok(Ok(())) => {
                    if self.config.enable_logging {
                        debug!(
                            event = %event.event_name(),
                            module = %module_name,
                            attempts,
                            "Event delivered"
                        );
                    }
                    return ModuleDelivery {
                        module_name: module_name.to_string(),
                        attempts,
                        outcome: DeliveryOutcome::Delivered,
                    };
                }
                Ok(Err(e)) => e,
                Err(panic) => EventHandlerError::Transient(format!(
                    "handler panicked: {}",
                    panic_message(panic.as_ref())
                )),
            };

            if failure.is_fatal() || attempts >= policy.max_attempts() {
                return self.dead_letter(event, module_name, failure, attempts);
            }

            let delay = policy.delay_for(attempts - 1);
            warn!(
                event = %event.event_name(),
                module = %module_name,
                attempt = attempts,
                retry_in_ms = delay.as_millis() as u64,
                error = %failure,
                "Event handler failed, retrying"
            );
            sleep(delay).await;
        }
    }

    fn dead_letter(
        &self,
        event: &DomainEvent,
        module_name: &str,
        failure: EventHandlerError,
        attempts: u32,
    ) -> ModuleDelivery {
        let entry = DeadLetterEntry::new(event.clone(), module_name, &failure, attempts);
        let dead_letter_id = entry.id;

        error!(
            event = %event.event_name(),
            event_id = %event.event_id(),
            tenant_id = %event.tenant_id(),
            module = %module_name,
            attempts,
            error = %failure,
            "Event delivery failed, recorded dead letter"
        );
        self.dead_letters.push(entry);

        ModuleDelivery {
            module_name: module_name.to_string(),
            attempts,
            outcome: DeliveryOutcome::DeadLettered { dead_letter_id },
        }
    }

    fn find_subscription(&self, event_name: &str, module_name: &str) -> Option<Subscription> {
        self.subscriptions
            .get(event_name)?
            .iter()
            .find(|s| s.module_name == module_name)
            .cloned()
    }

    /// All dead letters, oldest first
    pub fn dead_letters(&self) -> Vec<DeadLetterEntry> {
        self.dead_letters.list()
    }

    pub fn dead_letters_for_module(&self, module_name: &str) -> Vec<DeadLetterEntry> {
        self.dead_letters.for_module(module_name)
    }

    pub fn clear_dead_letters(&self) -> usize {
        self.dead_letters.clear()
    }

    /// Number of subscriptions for an event name
    pub fn subscription_count(&self, event_name: &str) -> usize {
        self.subscriptions
            .get(event_name)
            .map(|s| s.len())
            .unwrap_or(0)
    }

    /// Modules subscribed to an event name, in registration order
    pub fn modules_for(&self, event_name: &str) -> Vec<String> {
        self.subscriptions
            .get(event_name)
            .map(|subs| subs.iter().map(|s| s.module_name.clone()).collect())
            .unwrap_or_default()
    }

    /// Drop every subscription `module_name` holds for `event_name`
    pub fn unsubscribe_module(&self, event_name: &str, module_name: &str) -> usize {
        let Some(mut subs) = self.subscriptions.get_mut(event_name) else {
            return 0;
        };
        let before = subs.len();
        subs.retain(|s| s.module_name != module_name);
        let removed = before - subs.len();
        drop(subs);

        self.subscriptions.remove_if(event_name, |_, subs| subs.is_empty());

        if self.config.enable_logging && removed > 0 {
            info!(event = %event_name, module = %module_name, removed, "Unsubscribed module");
        }
        removed
    }

    /// Clear all subscriptions
    pub fn clear(&self) {
        self.subscriptions.clear();
        if self.config.enable_logging {
            info!("Cleared all event subscriptions");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Run a handler attempt under the bound context, or under one derived from
/// the event when nothing is bound. Callers have already rejected a bound
/// context for another tenant.
async fn with_event_context<F: Future>(event: &DomainEvent, fut: F) -> F::Output {
    if TenantContextStore::has_context() {
        return fut.await;
    }
    let ctx = AuthenticatedContext::new(
        event.tenant_id(),
        event.triggered_by().unwrap_or(SYSTEM_USER),
    );
    TenantContextStore::run_with_context(ctx, fut).await
}

async fn sleep(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}

/// Event bus builder
pub struct EventBusBuilder {
    config: EventBusConfig,
}

impl EventBusBuilder {
    pub fn new() -> Self {
        Self {
            config: EventBusConfig::default(),
        }
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.config.retry = policy;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.retry.max_retries = max_retries;
        self
    }

    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.config.retry.base_delay = delay;
        self
    }

    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.config.retry.backoff_multiplier = multiplier;
        self
    }

    pub fn max_delay(mut self, max_delay: Duration) -> Self {
        self.config.retry.max_delay = Some(max_delay);
        self
    }

    /// Enable/disable concurrent fan-out across modules
    pub fn concurrent(mut self, enabled: bool) -> Self {
        self.config.concurrent = enabled;
        self
    }

    /// Enable/disable logging
    pub fn enable_logging(mut self, enabled: bool) -> Self {
        self.config.enable_logging = enabled;
        self
    }

    pub fn build(self) -> EventBus {
        EventBus::with_config(self.config)
    }
}

impl Default for EventBusBuilder {
    fn default() -> Self {
        Self::new()
    }
}

//! # Praxis
//!
//! Core of a multi-tenant clinic management backend. Three cooperating
//! pieces keep clinics isolated from each other and the core isolated from
//! its dependencies:
//!
//! - **Tenant context** ([`tenancy`]): the authentication boundary binds an
//!   [`AuthenticatedContext`](tenancy::AuthenticatedContext) to the request;
//!   use cases and repositories read the tenant from it, never from request
//!   bodies, which [`TenantBodyGuard`](tenancy::TenantBodyGuard) scans for
//!   smuggled tenant ids.
//! - **Domain events** ([`events`]): modules react to each other's events
//!   through an in-process [`EventBus`](events::EventBus) with per-subscriber
//!   retry and a dead-letter store.
//! - **Resilient integrations** ([`http_client`], [`integrations`]): outbound
//!   calls go through a per-target circuit breaker with timeouts and
//!   exponential backoff.
//!
//! [`CoreServices`] wires them together from configuration.
//!
//! ## Quick Start
//!
//! ```
//! use praxis::prelude::*;
//!
//! # tokio_test::block_on(async {
//! let services = CoreServices::new(EventBus::new());
//!
//! services.events().subscribe_fn(APPOINTMENT_COMPLETED, "billing", |event| async move {
//!     assert_eq!(event.tenant_id(), "clinic-a");
//!     Ok::<(), EventHandlerError>(())
//! });
//!
//! let ctx = AuthenticatedContext::new("clinic-a", "dr-lima");
//! let report = TenantContextStore::run_with_context(ctx, async {
//!     let event = DomainEvent::for_current_tenant(
//!         APPOINTMENT_COMPLETED,
//!         "apt-1",
//!         serde_json::json!({}),
//!     )
//!     .unwrap();
//!     services.events().publish(event).await
//! })
//! .await;
//!
//! assert!(report.all_delivered());
//! # });
//! ```

#[cfg(feature = "integrations")]
mod app;

#[cfg(feature = "integrations")]
pub use app::CoreServices;

pub use praxis_config as config;
pub use praxis_core as http;
pub use praxis_tenancy as tenancy;

#[cfg(feature = "events")]
pub use praxis_events as events;

#[cfg(feature = "http-client")]
pub use praxis_http_client as http_client;

#[cfg(feature = "integrations")]
pub use praxis_integrations as integrations;

/// Prelude for common imports
pub mod prelude {
    pub use praxis_core::{Error, HttpMethod, HttpRequest, HttpResponse, Middleware, MiddlewareChain};
    pub use praxis_tenancy::prelude::*;

    #[cfg(feature = "events")]
    pub use praxis_events::contracts::*;
    #[cfg(feature = "events")]
    pub use praxis_events::{
        DomainEvent, EventBus, EventHandler, EventHandlerError, PublishReport, RetryPolicy,
    };

    #[cfg(feature = "http-client")]
    pub use praxis_http_client::{
        CircuitBreaker, CircuitBreakerRegistry, CircuitState, HttpClientError, ResilientHttpClient,
    };

    #[cfg(feature = "integrations")]
    pub use crate::CoreServices;
    #[cfg(feature = "integrations")]
    pub use praxis_integrations::{
        CalendarSyncAdapter, MessagingAdapter, NotifyOutcome, PatientNotifier, SyncOutcome,
    };
}

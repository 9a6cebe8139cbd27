//! Domain events for Praxis
//!
//! Business modules (scheduling, clinical, billing, ...) react to each
//! other's state changes through an in-process [`EventBus`] instead of
//! calling each other.
//!
//! - Each subscriber is registered under its module name and retried on its
//!   own under a [`RetryPolicy`] with exponential backoff.
//! - A subscriber that keeps failing is recorded in the dead-letter store and
//!   never affects the other modules or the publisher.
//! - `publish` waits for every subscriber, then returns a [`PublishReport`].
//!
//! ## Quick Start
//!
//! ```
//! use praxis_events::contracts::{AppointmentCompleted, APPOINTMENT_COMPLETED};
//! use praxis_events::{DomainEvent, EventBus, EventHandlerError};
//! use praxis_tenancy::{AuthenticatedContext, TenantContextStore};
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let bus = EventBus::builder()
//!     .max_retries(2)
//!     .base_delay(Duration::from_millis(1))
//!     .build();
//!
//! bus.subscribe_fn(APPOINTMENT_COMPLETED, "billing", |event: DomainEvent| async move {
//!     let completed: AppointmentCompleted = event.payload_as()?;
//!     assert_eq!(completed.appointment_id, "apt-1");
//!     Ok::<(), EventHandlerError>(())
//! });
//!
//! let ctx = AuthenticatedContext::new("clinic-a", "dr-who");
//! let report = TenantContextStore::run_with_context(ctx, async {
//!     let event = DomainEvent::record(&AppointmentCompleted {
//!         appointment_id: "apt-1".into(),
//!         patient_id: "pat-1".into(),
//!         professional_id: "dr-who".into(),
//!         procedure_id: None,
//!         completed_at: praxis_events::Utc::now(),
//!     })
//!     .unwrap();
//!     bus.publish(event).await
//! })
//! .await;
//!
//! assert!(report.all_delivered());
//! # });
//! ```

pub mod bus;
pub mod contracts;
pub mod dead_letter;
pub mod error;
pub mod event;
pub mod handler;
pub mod retry;

pub use bus::{
    DeliveryOutcome, EventBus, EventBusBuilder, EventBusConfig, ModuleDelivery, PublishReport,
    SYSTEM_USER,
};
pub use dead_letter::{DeadLetterEntry, DeadLetterStore};
pub use error::{EventBusError, EventError, EventHandlerError};
pub use event::{DomainEvent, EventPayload};
pub use handler::{EventHandler, FnHandler};
pub use retry::RetryPolicy;

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use uuid::Uuid;

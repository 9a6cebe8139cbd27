//! # Praxis Integrations
//!
//! Adapters for the third-party providers the clinic core talks to. Each
//! adapter owns a [`ResilientHttpClient`](praxis_http_client::ResilientHttpClient)
//! whose breaker is shared through the application's
//! [`CircuitBreakerRegistry`](praxis_http_client::CircuitBreakerRegistry), and
//! reads the tenant from the request context rather than taking it as an
//! argument.
//!
//! - [`MessagingAdapter`]: appointment confirmations, reminders and
//!   cancellations sent to patients
//! - [`CalendarSyncAdapter`]: mirrors appointments into a professional's
//!   external calendar
//!
//! Both treat an unavailable provider as a skipped side effect, never as a
//! failure of the operation that triggered it.

mod calendar;
mod error;
mod messaging;

pub use calendar::{CALENDAR, CalendarEvent, CalendarSyncAdapter, SkipReason, SyncOutcome};
pub use error::{IntegrationError, Result};
pub use messaging::{
    MESSAGING, MessagingAdapter, NotificationKind, NotifyOutcome, PatientNotification,
    PatientNotifier,
};

//! Event errors

use praxis_tenancy::TenantError;
use thiserror::Error;
use uuid::Uuid;

/// Failure reported by a subscriber for one delivery attempt.
///
/// Handlers run business logic, so any failure is assumed transient and
/// retried. `Fatal` skips the remaining attempts and dead-letters at once.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error("{0}")]
    Transient(String),

    #[error("fatal: {0}")]
    Fatal(String),
}

impl EventHandlerError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal(message.into())
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}

impl From<TenantError> for EventHandlerError {
    fn from(error: TenantError) -> Self {
        if error.is_fatal() {
            Self::Fatal(error.to_string())
        } else {
            Self::Transient(error.to_string())
        }
    }
}

/// A payload that does not match its contract will not parse on retry either.
impl From<serde_json::Error> for EventHandlerError {
    fn from(error: serde_json::Error) -> Self {
        Self::Fatal(format!("invalid event payload: {}", error))
    }
}

/// Errors building an event.
#[derive(Debug, Error)]
pub enum EventError {
    #[error(transparent)]
    Tenant(#[from] TenantError),

    #[error("Payload serialization failed: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Event bus errors. `publish` itself never fails.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventBusError {
    #[error("Dead letter not found: {0}")]
    DeadLetterNotFound(Uuid),

    #[error("No subscription for event {event_name} in module {module_name}")]
    SubscriptionNotFound {
        event_name: String,
        module_name: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tenant_errors_classified() {
        let mismatch: EventHandlerError = TenantError::TenantMismatch {
            expected: "a".into(),
            found: "b".into(),
        }
        .into();
        assert!(mismatch.is_fatal());

        let missing: EventHandlerError = TenantError::ContextMissing.into();
        assert!(!missing.is_fatal());
    }

    #[test]
    fn test_payload_errors_are_fatal() {
        let err = serde_json::from_str::<u32>("\"x\"").unwrap_err();
        assert!(EventHandlerError::from(err).is_fatal());
    }
}

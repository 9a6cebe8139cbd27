//! Domain events

use crate::error::EventError;
use chrono::{DateTime, Utc};
use praxis_tenancy::TenantContextStore;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A completed business state change, published once and read by every
/// subscribed module.
///
/// Fields are read-only after construction. The tenant id is always the one
/// the triggering action ran under, so use cases build events with
/// [`for_current_tenant`](Self::for_current_tenant) or
/// [`record`](Self::record) rather than from request data.
///
/// `Deserialize` exists for dead-letter storage and replay. A deserialized
/// event carries whatever tenant its source wrote, so it is trusted data only
/// when the source is the bus itself; never build one from request input.
/// Inside a request [`EventBus::publish`](crate::EventBus::publish) refuses
/// events for any tenant but the bound one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    event_id: Uuid,
    event_name: String,
    occurred_at: DateTime<Utc>,
    tenant_id: String,
    aggregate_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    triggered_by: Option<String>,
    #[serde(default)]
    payload: Value,
}

impl DomainEvent {
    /// Build an event for an explicitly known tenant, e.g. from a scheduled
    /// job that already resolved it from storage.
    pub fn new(
        event_name: impl Into<String>,
        tenant_id: impl Into<String>,
        aggregate_id: impl Into<String>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_name: event_name.into(),
            occurred_at: Utc::now(),
            tenant_id: tenant_id.into(),
            aggregate_id: aggregate_id.into(),
            triggered_by: None,
            payload: Value::Null,
        }
    }

    /// Build an event stamped with the tenant and user of the current request.
    ///
    /// # Examples
    ///
    /// ```
    /// use praxis_events::DomainEvent;
    /// use praxis_tenancy::{AuthenticatedContext, TenantContextStore};
    /// use serde_json::json;
    ///
    /// let ctx = AuthenticatedContext::new("clinic-a", "dr-who");
    /// let event = TenantContextStore::sync_scope(ctx, || {
    ///     DomainEvent::for_current_tenant("patient.registered", "p-1", json!({ "name": "Ana" }))
    /// })
    /// .unwrap();
    ///
    /// assert_eq!(event.tenant_id(), "clinic-a");
    /// assert_eq!(event.triggered_by(), Some("dr-who"));
    /// ```
    pub fn for_current_tenant(
        event_name: impl Into<String>,
        aggregate_id: impl Into<String>,
        payload: Value,
    ) -> Result<Self, EventError> {
        let ctx = TenantContextStore::get_context()?;
        Ok(Self::new(event_name, ctx.tenant_id.clone(), aggregate_id)
            .with_triggered_by(ctx.user_id.clone())
            .with_json(payload))
    }

    /// Build an event from a typed contract payload for the current request.
    pub fn record<P: EventPayload>(payload: &P) -> Result<Self, EventError> {
        let value = serde_json::to_value(payload)?;
        Self::for_current_tenant(P::EVENT_NAME, payload.aggregate_id(), value)
    }

    pub fn with_triggered_by(mut self, user_id: impl Into<String>) -> Self {
        self.triggered_by = Some(user_id.into());
        self
    }

    pub fn with_json(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_payload<T: Serialize>(self, payload: &T) -> Result<Self, EventError> {
        Ok(self.with_json(serde_json::to_value(payload)?))
    }

    /// Deserialize the payload into its contract type.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.payload)
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn aggregate_id(&self) -> &str {
        &self.aggregate_id
    }

    pub fn triggered_by(&self) -> Option<&str> {
        self.triggered_by.as_deref()
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }
}

/// A typed payload bound to one event name.
pub trait EventPayload: Serialize + DeserializeOwned {
    const EVENT_NAME: &'static str;

    /// Id of the entity whose state changed
    fn aggregate_id(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use praxis_tenancy::{AuthenticatedContext, TenantError};
    use serde_json::json;

    #[test]
    fn test_new_event() {
        let event = DomainEvent::new("invoice.paid", "clinic-a", "inv-1");

        assert_eq!(event.event_name(), "invoice.paid");
        assert_eq!(event.tenant_id(), "clinic-a");
        assert_eq!(event.aggregate_id(), "inv-1");
        assert!(event.triggered_by().is_none());
        assert!(event.payload().is_null());
    }

    #[test]
    fn test_ids_are_unique() {
        let a = DomainEvent::new("x", "t", "1");
        let b = DomainEvent::new("x", "t", "1");
        assert_ne!(a.event_id(), b.event_id());
    }

    #[test]
    fn test_for_current_tenant_requires_context() {
        let result = DomainEvent::for_current_tenant("x", "1", Value::Null);
        assert!(matches!(
            result,
            Err(EventError::Tenant(TenantError::ContextMissing))
        ));
    }

    #[test]
    fn test_payload_round_trip() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Paid {
            amount_cents: u64,
        }

        let event = DomainEvent::new("invoice.paid", "t", "inv-1")
            .with_payload(&Paid { amount_cents: 4200 })
            .unwrap();

        assert_eq!(event.payload(), &json!({ "amount_cents": 4200 }));
        assert_eq!(event.payload_as::<Paid>().unwrap(), Paid { amount_cents: 4200 });
        assert!(event.payload_as::<String>().is_err());
    }

    #[test]
    fn test_serialized_form() {
        let ctx = AuthenticatedContext::new("clinic-a", "u1");
        let event = TenantContextStore::sync_scope(ctx, || {
            DomainEvent::for_current_tenant("patient.registered", "p1", json!({}))
        })
        .unwrap();

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["tenant_id"], "clinic-a");
        assert_eq!(value["triggered_by"], "u1");

        let back: DomainEvent = serde_json::from_value(value).unwrap();
        assert_eq!(back, event);
    }
}

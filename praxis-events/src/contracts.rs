//! Event names and payloads shared between modules.
//!
//! Modules depend on these contracts, never on each other.

use crate::event::EventPayload;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const APPOINTMENT_SCHEDULED: &str = "appointment.scheduled";
pub const APPOINTMENT_CANCELLED: &str = "appointment.cancelled";
pub const APPOINTMENT_COMPLETED: &str = "appointment.completed";
pub const PATIENT_REGISTERED: &str = "patient.registered";
pub const INVOICE_PAID: &str = "invoice.paid";

/// Raised by scheduling when an appointment is marked done. Clinical opens
/// the encounter record, billing charges the procedure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppointmentCompleted {
    pub appointment_id: String,
    pub patient_id: String,
    pub professional_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub procedure_id: Option<String>,
    pub completed_at: DateTime<Utc>,
}

impl EventPayload for AppointmentCompleted {
    const EVENT_NAME: &'static str = APPOINTMENT_COMPLETED;

    fn aggregate_id(&self) -> &str {
        &self.appointment_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::DomainEvent;
    use praxis_tenancy::{AuthenticatedContext, TenantContextStore};

    #[test]
    fn test_record_appointment_completed() {
        let payload = AppointmentCompleted {
            appointment_id: "apt-1".to_string(),
            patient_id: "pat-1".to_string(),
            professional_id: "pro-1".to_string(),
            procedure_id: Some("consult".to_string()),
            completed_at: Utc::now(),
        };

        let event = TenantContextStore::sync_scope(
            AuthenticatedContext::new("clinic-a", "pro-1"),
            || DomainEvent::record(&payload),
        )
        .unwrap();

        assert_eq!(event.event_name(), APPOINTMENT_COMPLETED);
        assert_eq!(event.aggregate_id(), "apt-1");
        assert_eq!(event.tenant_id(), "clinic-a");
        assert_eq!(event.payload_as::<AppointmentCompleted>().unwrap(), payload);
    }
}

//! Mirroring appointments into a professional's external calendar.

use crate::error::{IntegrationError, Result};
use chrono::{DateTime, Utc};
use praxis_config::IntegrationSettings;
use praxis_http_client::{
    CircuitBreakerRegistry, HeaderMap, HeaderValue, HttpClientError, ResilientHttpClient, header,
};
use praxis_tenancy::TenantContextStore;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Configuration name of the calendar integration.
pub const CALENDAR: &str = "calendar";

/// Appointment as seen by the calendar provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub appointment_id: String,
    pub title: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// Why a sync was not performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The provider's circuit is open.
    CircuitOpen,
    /// The provider kept failing until retries ran out.
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Synced,
    Skipped(SkipReason),
}

impl SyncOutcome {
    pub fn is_synced(&self) -> bool {
        matches!(self, Self::Synced)
    }
}

/// Calendar provider adapter.
///
/// Calendar sync is best effort: a degraded provider yields
/// [`SyncOutcome::Skipped`] instead of an error, while rejections the
/// provider would give again (bad payload, bad credentials) still surface as
/// errors. Every request carries the active tenant id.
#[derive(Clone)]
pub struct CalendarSyncAdapter {
    client: ResilientHttpClient,
    calendar_id: String,
    auth: HeaderMap,
}

impl CalendarSyncAdapter {
    /// Build from `calendar_*` settings. Requires API key and calendar id
    /// (`calendar_sender_id`).
    pub fn from_settings(
        settings: &IntegrationSettings,
        registry: &CircuitBreakerRegistry,
    ) -> Result<Self> {
        let missing = |setting| IntegrationError::NotConfigured {
            integration: settings.name.clone(),
            setting,
        };
        let api_key = settings.api_key.as_deref().ok_or_else(|| missing("api_key"))?;
        let calendar_id = settings.sender_id.clone().ok_or_else(|| missing("sender_id"))?;

        let mut auth = HeaderMap::new();
        auth.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|e| HttpClientError::InvalidHeader(e.to_string()))?,
        );

        Ok(Self {
            client: ResilientHttpClient::from_settings(settings, registry)?,
            calendar_id,
            auth,
        })
    }

    pub fn client(&self) -> &ResilientHttpClient {
        &self.client
    }

    /// Create or replace the calendar entry for an appointment.
    pub async fn upsert_appointment(&self, event: &CalendarEvent) -> Result<SyncOutcome> {
        let headers = self.headers()?;
        let path = self.event_path(&event.appointment_id);
        let result = self.client.put(&path, event, Some(&headers)).await;
        self.settle(&event.appointment_id, "upsert", result.map(|_| ()))
    }

    /// Remove the calendar entry for an appointment. An entry the provider
    /// no longer has counts as removed.
    pub async fn remove_appointment(&self, appointment_id: &str) -> Result<SyncOutcome> {
        let headers = self.headers()?;
        let path = self.event_path(appointment_id);
        let result = match self.client.delete(&path, Some(&headers)).await {
            Err(e) if e.status_code() == Some(404) => Ok(()),
            other => other.map(|_| ()),
        };
        self.settle(appointment_id, "remove", result)
    }

    fn event_path(&self, appointment_id: &str) -> String {
        format!("calendars/{}/events/{}", self.calendar_id, appointment_id)
    }

    fn headers(&self) -> Result<HeaderMap> {
        let tenant_id = TenantContextStore::require_tenant_id()?;
        let mut headers = self.auth.clone();
        headers.insert(
            "x-tenant-id",
            HeaderValue::from_str(&tenant_id)
                .map_err(|e| HttpClientError::InvalidHeader(e.to_string()))?,
        );
        Ok(headers)
    }

    fn settle(
        &self,
        appointment_id: &str,
        operation: &'static str,
        result: praxis_http_client::Result<()>,
    ) -> Result<SyncOutcome> {
        match result {
            Ok(()) => {
                info!(appointment_id, operation, "Calendar synced");
                Ok(SyncOutcome::Synced)
            }
            Err(e) if e.is_circuit_open() => {
                warn!(appointment_id, operation, "Calendar provider circuit open, sync skipped");
                Ok(SyncOutcome::Skipped(SkipReason::CircuitOpen))
            }
            Err(e @ HttpClientError::RetryExhausted { .. }) => {
                warn!(appointment_id, operation, error = %e, "Calendar provider unavailable, sync skipped");
                Ok(SyncOutcome::Skipped(SkipReason::Unavailable))
            }
            Err(e) => Err(e.into()),
        }
    }
}

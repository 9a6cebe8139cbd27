//! Patient notifications through a messaging provider.

use crate::error::{IntegrationError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use praxis_config::IntegrationSettings;
use praxis_http_client::{
    CircuitBreakerRegistry, HeaderMap, HeaderValue, HttpClientError, ResilientHttpClient, header,
};
use praxis_tenancy::TenantContextStore;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Configuration name of the messaging integration.
pub const MESSAGING: &str = "messaging";

/// What a notification is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    AppointmentConfirmation,
    AppointmentReminder,
    AppointmentCancellation,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AppointmentConfirmation => "appointment_confirmation",
            Self::AppointmentReminder => "appointment_reminder",
            Self::AppointmentCancellation => "appointment_cancellation",
        }
    }
}

/// A message to one patient about one appointment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientNotification {
    pub kind: NotificationKind,
    /// Recipient phone number in E.164 form
    pub recipient: String,
    pub patient_name: String,
    pub appointment_id: String,
    pub starts_at: DateTime<Utc>,
}

impl PatientNotification {
    /// Message text sent to the patient.
    pub fn text(&self) -> String {
        let when = self.starts_at.format("%Y-%m-%d %H:%M UTC");
        match self.kind {
            NotificationKind::AppointmentConfirmation => format!(
                "Hello {}, your appointment on {} is confirmed.",
                self.patient_name, when
            ),
            NotificationKind::AppointmentReminder => format!(
                "Hello {}, this is a reminder of your appointment on {}.",
                self.patient_name, when
            ),
            NotificationKind::AppointmentCancellation => format!(
                "Hello {}, your appointment on {} has been cancelled.",
                self.patient_name, when
            ),
        }
    }
}

/// Result of a notification attempt that did not error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    /// Accepted by the provider, with its message id when it returns one.
    Sent { message_id: Option<String> },
    /// Not sent because the provider is known to be unavailable.
    Skipped { reason: String },
}

/// Sends patient notifications. Use cases depend on this, not on a provider.
#[async_trait]
pub trait PatientNotifier: Send + Sync {
    async fn notify(&self, notification: &PatientNotification) -> Result<NotifyOutcome>;
}

/// Messaging provider adapter.
///
/// Posts to `{base_url}/{sender_id}/messages` with the API key as a bearer
/// token. An open circuit is logged and reported as
/// [`NotifyOutcome::Skipped`] so a degraded provider never fails the
/// appointment flow that triggered the message.
#[derive(Clone)]
pub struct MessagingAdapter {
    client: ResilientHttpClient,
    sender_id: String,
    auth: HeaderMap,
}

impl MessagingAdapter {
    /// Build from `messaging_*` settings. Requires API key and sender id.
    pub fn from_settings(
        settings: &IntegrationSettings,
        registry: &CircuitBreakerRegistry,
    ) -> Result<Self> {
        let api_key = settings
            .api_key
            .as_deref()
            .ok_or_else(|| not_configured(settings, "api_key"))?;
        let sender_id = settings
            .sender_id
            .clone()
            .ok_or_else(|| not_configured(settings, "sender_id"))?;

        let mut auth = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|e| HttpClientError::InvalidHeader(e.to_string()))?;
        auth.insert(header::AUTHORIZATION, bearer);

        Ok(Self {
            client: ResilientHttpClient::from_settings(settings, registry)?,
            sender_id,
            auth,
        })
    }

    pub fn client(&self) -> &ResilientHttpClient {
        &self.client
    }

    /// Send `notification` without waiting. Failures are logged only.
    ///
    /// The spawned task keeps the caller's tenant context.
    pub fn notify_in_background(self: &Arc<Self>, notification: PatientNotification) -> JoinHandle<()> {
        let adapter = Arc::clone(self);
        TenantContextStore::spawn(async move {
            if let Err(e) = adapter.notify(&notification).await {
                warn!(
                    tenant_id = ?TenantContextStore::try_get_context().map(|c| c.tenant_id.clone()),
                    appointment_id = %notification.appointment_id,
                    kind = notification.kind.as_str(),
                    error = %e,
                    "Patient notification failed"
                );
            }
        })
    }

    fn body(&self, notification: &PatientNotification, tenant_id: &str) -> Value {
        json!({
            "to": notification.recipient,
            "type": "text",
            "text": { "body": notification.text() },
            "metadata": {
                "tenant_id": tenant_id,
                "appointment_id": notification.appointment_id,
                "kind": notification.kind,
            }
        })
    }
}

#[async_trait]
impl PatientNotifier for MessagingAdapter {
    async fn notify(&self, notification: &PatientNotification) -> Result<NotifyOutcome> {
        let tenant_id = TenantContextStore::require_tenant_id()?;
        let path = format!("{}/messages", self.sender_id);
        let body = self.body(notification, &tenant_id);

        match self.client.post(&path, &body, Some(&self.auth)).await {
            Ok(response) => {
                let message_id = response
                    .json::<Value>()
                    .ok()
                    .and_then(|v| v["messages"][0]["id"].as_str().map(str::to_string));
                info!(
                    tenant_id = %tenant_id,
                    appointment_id = %notification.appointment_id,
                    kind = notification.kind.as_str(),
                    "Patient notification sent"
                );
                Ok(NotifyOutcome::Sent { message_id })
            }
            Err(e) if e.is_circuit_open() => {
                warn!(
                    tenant_id = %tenant_id,
                    appointment_id = %notification.appointment_id,
                    "Messaging provider unavailable, notification skipped"
                );
                Ok(NotifyOutcome::Skipped {
                    reason: e.to_string(),
                })
            }
            Err(e) => {
                debug!(error = %e, "Messaging provider request failed");
                Err(IntegrationError::Http(e))
            }
        }
    }
}

fn not_configured(settings: &IntegrationSettings, setting: &'static str) -> IntegrationError {
    IntegrationError::NotConfigured {
        integration: settings.name.clone(),
        setting,
    }
}

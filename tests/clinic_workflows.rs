//! End-to-end workflows across tenancy, events and integrations.

use chrono::Utc;
use praxis::config::ConfigManager;
use praxis::http::handler;
use praxis::integrations::{CALENDAR, CalendarEvent, SkipReason, SyncOutcome};
use praxis::prelude::*;
use praxis::tenancy::{InMemorySessionStore, TokenSessionResolver};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

fn completed(appointment_id: &str) -> AppointmentCompleted {
    AppointmentCompleted {
        appointment_id: appointment_id.to_string(),
        patient_id: "pat-1".to_string(),
        professional_id: "pro-1".to_string(),
        procedure_id: Some("proc-cleaning".to_string()),
        completed_at: Utc::now(),
    }
}

fn counter() -> Arc<AtomicU32> {
    Arc::new(AtomicU32::new(0))
}

#[tokio::test(start_paused = true)]
async fn test_flaky_billing_recovers_and_clinical_runs_once() {
    let bus = EventBus::builder()
        .max_retries(3)
        .base_delay(Duration::from_millis(100))
        .build();

    let billing_calls = counter();
    let clinical_calls = counter();

    let calls = billing_calls.clone();
    bus.subscribe_fn(APPOINTMENT_COMPLETED, "billing", move |_event| {
        let calls = calls.clone();
        async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err::<(), _>(EventHandlerError::transient("billing store busy"))
            } else {
                Ok(())
            }
        }
    });

    let calls = clinical_calls.clone();
    bus.subscribe_fn(APPOINTMENT_COMPLETED, "clinical", move |_event| {
        let calls = calls.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<(), EventHandlerError>(())
        }
    });

    let ctx = AuthenticatedContext::new("clinic-a", "dr-lima");
    let report = TenantContextStore::run_with_context(ctx, async {
        let event = DomainEvent::record(&completed("apt-1")).unwrap();
        bus.publish(event).await
    })
    .await;

    assert!(report.all_delivered());
    assert_eq!(billing_calls.load(Ordering::SeqCst), 3);
    assert_eq!(clinical_calls.load(Ordering::SeqCst), 1);
    assert!(bus.dead_letters().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_failing_clinical_is_dead_lettered_without_blocking_billing() {
    let bus = EventBus::builder()
        .max_retries(2)
        .base_delay(Duration::from_millis(100))
        .build();

    let clinical_calls = counter();
    let billing_calls = counter();

    let calls = clinical_calls.clone();
    bus.subscribe_fn(APPOINTMENT_COMPLETED, "clinical", move |_event| {
        let calls = calls.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(EventHandlerError::transient("encounter store down"))
        }
    });

    let calls = billing_calls.clone();
    bus.subscribe_fn(APPOINTMENT_COMPLETED, "billing", move |_event| {
        let calls = calls.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<(), EventHandlerError>(())
        }
    });

    let ctx = AuthenticatedContext::new("clinic-a", "dr-lima");
    let report = TenantContextStore::run_with_context(ctx, async {
        bus.publish(DomainEvent::record(&completed("apt-2")).unwrap())
            .await
    })
    .await;

    assert_eq!(clinical_calls.load(Ordering::SeqCst), 3);
    assert_eq!(billing_calls.load(Ordering::SeqCst), 1);
    assert_eq!(report.dead_lettered_modules(), vec!["clinical"]);

    let dead = bus.dead_letters();
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].module_name, "clinical");
    assert_eq!(dead[0].event.tenant_id(), "clinic-a");
    assert!(dead[0].error.contains("encounter store down"));
}

#[tokio::test(start_paused = true)]
async fn test_handlers_see_publisher_tenant_under_concurrent_requests() {
    let bus = EventBus::new();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let sink = seen.clone();
    bus.subscribe_fn(APPOINTMENT_COMPLETED, "billing", move |event| {
        let sink = sink.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            let current = TenantContextStore::require_tenant_id()?;
            sink.lock()
                .unwrap()
                .push((event.tenant_id().to_string(), current));
            Ok::<(), EventHandlerError>(())
        }
    });

    let request = |tenant: &'static str, appointment: &'static str| {
        let bus = bus.clone();
        TenantContextStore::run_with_context(AuthenticatedContext::new(tenant, "u"), async move {
            tokio::time::sleep(Duration::from_millis(1)).await;
            bus.publish(DomainEvent::record(&completed(appointment)).unwrap())
                .await
        })
    };

    let (a, b) = tokio::join!(request("clinic-a", "apt-a"), request("clinic-b", "apt-b"));
    assert!(a.all_delivered() && b.all_delivered());

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    for (event_tenant, context_tenant) in seen.iter() {
        assert_eq!(event_tenant, context_tenant);
    }
}

fn api_chain(sessions: Arc<InMemorySessionStore>) -> MiddlewareChain {
    MiddlewareChain::new()
        .with(AuthContextMiddleware::new(Arc::new(TokenSessionResolver::new(sessions))))
        .with(TenantBodyGuardMiddleware::default())
}

#[tokio::test]
async fn test_request_pipeline_guards_body_and_binds_tenant() {
    let sessions = Arc::new(InMemorySessionStore::new());
    sessions.insert("token-a", AuthenticatedContext::new("clinic-a", "reception-1"));
    let chain = api_chain(sessions);

    let create_patient = || {
        handler(|req: HttpRequest| async move {
            let body: Value = req.json()?;
            let tenant = TenantContextStore::require_tenant_id()?;
            HttpResponse::created().with_json(&json!({ "name": body["name"], "tenant": tenant }))
        })
    };

    let smuggled = HttpRequest::new("POST", "/patients")
        .with_header("Authorization", "Bearer token-a")
        .with_json(&json!({ "name": "Ana", "contact": { "Tenant-Id": "clinic-b" } }))
        .unwrap();
    let rejected = chain.apply(smuggled, create_patient()).await.unwrap();
    let body: Value = rejected.json().unwrap();
    assert_eq!(rejected.status, 400);
    assert_eq!(body["error"], "TENANT_ID_NOT_ALLOWED");

    let clean = HttpRequest::new("POST", "/patients")
        .with_header("Authorization", "Bearer token-a")
        .with_json(&json!({ "name": "Ana" }))
        .unwrap();
    let created = chain.apply(clean, create_patient()).await.unwrap();
    let body: Value = created.json().unwrap();
    assert_eq!(created.status, 201);
    assert_eq!(body["tenant"], "clinic-a");

    let anonymous = HttpRequest::new("POST", "/patients")
        .with_json(&json!({ "name": "Ana" }))
        .unwrap();
    let result = chain.apply(anonymous, create_patient()).await;
    assert!(matches!(result, Err(Error::Unauthorized(_))));
}

#[tokio::test]
async fn test_calendar_sync_degrades_when_provider_is_down() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let config = ConfigManager::new();
    config.set("calendar_base_url", server.uri()).unwrap();
    config.set("calendar_api_key", "cal-key").unwrap();
    config.set("calendar_sender_id", "primary").unwrap();
    config.set("calendar_max_retries", 0).unwrap();
    config.set("calendar_circuit_failure_threshold", 2).unwrap();
    config.set("calendar_timeout_ms", 500).unwrap();

    let services = CoreServices::from_config(&config).unwrap();
    let calendar = services.calendar().unwrap().clone();

    let event = CalendarEvent {
        appointment_id: "apt-7".to_string(),
        title: "Follow-up".to_string(),
        starts_at: Utc::now(),
        ends_at: Utc::now(),
        location: None,
    };

    let outcomes = TenantContextStore::run_with_context(
        AuthenticatedContext::new("clinic-a", "reception-1"),
        async {
            let mut outcomes = Vec::new();
            for _ in 0..3 {
                outcomes.push(calendar.upsert_appointment(&event).await.unwrap());
            }
            outcomes
        },
    )
    .await;

    assert_eq!(
        outcomes,
        vec![
            SyncOutcome::Skipped(SkipReason::Unavailable),
            SyncOutcome::Skipped(SkipReason::Unavailable),
            SyncOutcome::Skipped(SkipReason::CircuitOpen),
        ]
    );
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
    assert_eq!(
        services.integration_health(),
        vec![(CALENDAR.to_string(), CircuitState::Open)]
    );
}

//! Tenancy middleware
//!
//! [`AuthContextMiddleware`] binds the caller's identity for the rest of the
//! chain. [`TenantBodyGuardMiddleware`] refuses write bodies carrying a
//! tenant identifier. Register the guard after the auth middleware.

use crate::guard::{GuardDecision, TenantBodyGuard};
use crate::resolver::SessionResolver;
use crate::store::TenantContextStore;
use async_trait::async_trait;
use praxis_core::middleware::Next;
use praxis_core::{Error, HttpRequest, HttpResponse, Middleware};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// Resolves the session and runs the rest of the chain inside its context.
pub struct AuthContextMiddleware {
    resolver: Arc<dyn SessionResolver>,
    optional: bool,
}

impl AuthContextMiddleware {
    pub fn new(resolver: Arc<dyn SessionResolver>) -> Self {
        Self {
            resolver,
            optional: false,
        }
    }

    /// If true, unauthenticated requests proceed with no context bound.
    /// If false, they fail with 401.
    pub fn with_optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }
}

#[async_trait]
impl Middleware for AuthContextMiddleware {
    async fn handle(&self, request: HttpRequest, next: Next) -> Result<HttpResponse, Error> {
        match self.resolver.resolve(&request).await {
            Ok(ctx) => {
                debug!(tenant_id = %ctx.tenant_id, user_id = %ctx.user_id, "Session resolved");
                TenantContextStore::run_with_context(ctx, next(request)).await
            }
            Err(e) if self.optional => {
                debug!(error = %e, "Proceeding without session");
                TenantContextStore::scope(next(request)).await
            }
            Err(e) => Err(Error::Unauthorized(format!("Session resolution failed: {}", e))),
        }
    }
}

/// Error code for a write body that does not decode as its declared type.
pub const INVALID_REQUEST_BODY: &str = "INVALID_REQUEST_BODY";

/// Applies a [`TenantBodyGuard`] to every write body.
///
/// JSON and `application/x-www-form-urlencoded` bodies are decoded and
/// scanned; form keys in bracket notation (`patient[tenant_id]`) are scanned
/// as nested fields. A body that fails to decode as its declared content type
/// is refused with 400 [`INVALID_REQUEST_BODY`]. An undeclared body is tried
/// as JSON, then as a form.
pub struct TenantBodyGuardMiddleware {
    guard: TenantBodyGuard,
}

impl TenantBodyGuardMiddleware {
    pub fn new(guard: TenantBodyGuard) -> Self {
        Self { guard }
    }
}

impl Default for TenantBodyGuardMiddleware {
    fn default() -> Self {
        Self::new(TenantBodyGuard::new())
    }
}

#[async_trait]
impl Middleware for TenantBodyGuardMiddleware {
    async fn handle(&self, request: HttpRequest, next: Next) -> Result<HttpResponse, Error> {
        let Some(method) = request.http_method() else {
            return next(request).await;
        };

        if !method.is_mutating() || request.body.is_empty() {
            return next(request).await;
        }

        let body = match decode_body(&request) {
            Ok(body) => body,
            Err(reason) => {
                warn!(method = %method, path = %request.path, reason, "Rejected undecodable request body");
                return Ok(HttpResponse::error(400, INVALID_REQUEST_BODY, reason));
            }
        };

        match self.guard.check(method, &body) {
            GuardDecision::Allowed => next(request).await,
            GuardDecision::Rejected(rejection) => {
                warn!(
                    method = %method,
                    path = %request.path,
                    field = %rejection.path,
                    tenant_id = ?TenantContextStore::try_get_context().map(|c| c.tenant_id.clone()),
                    "Rejected request body carrying a tenant identifier"
                );
                Ok(HttpResponse::error(400, rejection.code, rejection.message()))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Json,
    Form,
    Undeclared,
}

fn body_kind(request: &HttpRequest) -> BodyKind {
    let Some(content_type) = request.header("content-type") else {
        return BodyKind::Undeclared;
    };
    let media_type = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if media_type == "application/x-www-form-urlencoded" {
        BodyKind::Form
    } else if media_type == "application/json" || media_type.ends_with("+json") {
        BodyKind::Json
    } else {
        BodyKind::Undeclared
    }
}

/// Decode a non-empty write body into a tree the guard can scan.
fn decode_body(request: &HttpRequest) -> Result<Value, &'static str> {
    match body_kind(request) {
        BodyKind::Json => {
            serde_json::from_slice(&request.body).map_err(|_| "Body is not valid JSON")
        }
        BodyKind::Form => decode_form(&request.body).ok_or("Body is not a valid form"),
        BodyKind::Undeclared => serde_json::from_slice(&request.body)
            .ok()
            .or_else(|| decode_form(&request.body))
            .ok_or("Body could not be decoded"),
    }
}

fn decode_form(body: &[u8]) -> Option<Value> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(body).ok()?;
    let mut root = Map::new();
    for (key, value) in pairs {
        let segments: Vec<&str> = key
            .split(['[', ']'])
            .filter(|segment| !segment.is_empty())
            .collect();
        insert_form_field(&mut root, &segments, value);
    }
    Some(Value::Object(root))
}

fn insert_form_field(map: &mut Map<String, Value>, segments: &[&str], value: String) {
    match segments {
        [] => {}
        [last] => {
            map.insert((*last).to_string(), Value::String(value));
        }
        [first, rest @ ..] => {
            let child = map
                .entry((*first).to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            if let Value::Object(child) = child {
                insert_form_field(child, rest, value);
            }
        }
    }
}

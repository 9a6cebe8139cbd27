//! Session resolution
//!
//! Maps an incoming request to the [`AuthenticatedContext`] of the caller.
//! Session mechanics (cookies, JWT, external IdP) stay behind these traits.

use crate::context::AuthenticatedContext;
use crate::error::{Result, TenantError};
use async_trait::async_trait;
use parking_lot::RwLock;
use praxis_core::HttpRequest;
use std::collections::HashMap;
use std::sync::Arc;

/// Resolves the caller's identity from a request.
#[async_trait]
pub trait SessionResolver: Send + Sync {
    async fn resolve(&self, request: &HttpRequest) -> Result<AuthenticatedContext>;
}

/// Lookup of session tokens, backed by whatever the deployment uses.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn find(&self, token: &str) -> Result<Option<AuthenticatedContext>>;
}

/// In-memory session store, for tests and single-node setups.
#[derive(Default, Clone)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, AuthenticatedContext>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, token: impl Into<String>, ctx: AuthenticatedContext) {
        self.sessions.write().insert(token.into(), ctx);
    }

    pub fn revoke(&self, token: &str) -> bool {
        self.sessions.write().remove(token).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn find(&self, token: &str) -> Result<Option<AuthenticatedContext>> {
        Ok(self.sessions.read().get(token).cloned())
    }
}

/// Resolves sessions from a bearer token or a session header.
///
/// # Examples
///
/// ```
/// use praxis_tenancy::{AuthenticatedContext, InMemorySessionStore, TokenSessionResolver};
/// use std::sync::Arc;
///
/// let store = InMemorySessionStore::new();
/// store.insert("tok-1", AuthenticatedContext::new("clinic-a", "dr-who"));
///
/// let resolver = TokenSessionResolver::new(Arc::new(store))
///     .with_session_header("x-session-token");
/// # let _ = resolver;
/// ```
pub struct TokenSessionResolver {
    store: Arc<dyn SessionStore>,
    session_header: Option<String>,
}

impl TokenSessionResolver {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            session_header: None,
        }
    }

    /// Also accept the raw token in this header when no bearer token is sent.
    pub fn with_session_header(mut self, header: impl Into<String>) -> Self {
        self.session_header = Some(header.into());
        self
    }

    fn extract_token<'a>(&self, request: &'a HttpRequest) -> Option<&'a str> {
        if let Some(auth) = request.header("authorization") {
            let mut parts = auth.splitn(2, ' ');
            if let (Some(scheme), Some(token)) = (parts.next(), parts.next())
                && scheme.eq_ignore_ascii_case("bearer")
                && !token.trim().is_empty()
            {
                return Some(token.trim());
            }
        }

        self.session_header
            .as_deref()
            .and_then(|name| request.header(name))
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

#[async_trait]
impl SessionResolver for TokenSessionResolver {
    async fn resolve(&self, request: &HttpRequest) -> Result<AuthenticatedContext> {
        let token = self
            .extract_token(request)
            .ok_or_else(|| TenantError::Unauthenticated("missing session token".to_string()))?;

        self.store
            .find(token)
            .await?
            .ok_or_else(|| TenantError::Unauthenticated("unknown or expired session".to_string()))
    }
}

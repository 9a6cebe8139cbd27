//! Tenant isolation for Praxis
//!
//! Every request carries exactly one tenant, taken from the authenticated
//! session and never from client input.
//!
//! - [`TenantContextStore`] binds an [`AuthenticatedContext`] to the request's
//!   task so any code on that request can read it without passing it around.
//! - [`AuthContextMiddleware`] resolves the session through a
//!   [`SessionResolver`] and runs the rest of the chain inside the context.
//! - [`TenantBodyGuard`] and its middleware reject write bodies that try to
//!   name a tenant.
//! - [`TenantScopedRepository`] and [`ensure_current_tenant`] keep storage
//!   reads and writes inside the active tenant.
//!
//! # Quick Start
//!
//! ```
//! use praxis_core::MiddlewareChain;
//! use praxis_tenancy::prelude::*;
//! use std::sync::Arc;
//!
//! let sessions = InMemorySessionStore::new();
//! sessions.insert("tok-1", AuthenticatedContext::new("clinic-a", "dr-who"));
//!
//! let chain = MiddlewareChain::new()
//!     .with(AuthContextMiddleware::new(Arc::new(TokenSessionResolver::new(Arc::new(sessions)))))
//!     .with(TenantBodyGuardMiddleware::default());
//! assert_eq!(chain.len(), 2);
//! ```

pub mod context;
pub mod error;
pub mod guard;
pub mod isolation;
pub mod middleware;
pub mod resolver;
pub mod store;

pub use context::{AuthenticatedContext, TenantType};
pub use error::{Result, TenantError};
pub use guard::{
    DEFAULT_MAX_DEPTH, GuardDecision, GuardRejection, TENANT_ID_NOT_ALLOWED, TenantBodyGuard,
    TenantBodyGuardBuilder,
};
pub use isolation::{TenantScoped, TenantScopedRepository, ensure_current_tenant};
pub use middleware::{AuthContextMiddleware, TenantBodyGuardMiddleware};
pub use resolver::{InMemorySessionStore, SessionResolver, SessionStore, TokenSessionResolver};
pub use store::TenantContextStore;

pub mod prelude {
    pub use crate::context::{AuthenticatedContext, TenantType};
    pub use crate::error::TenantError;
    pub use crate::guard::{GuardDecision, TENANT_ID_NOT_ALLOWED, TenantBodyGuard};
    pub use crate::isolation::{TenantScoped, TenantScopedRepository, ensure_current_tenant};
    pub use crate::middleware::{AuthContextMiddleware, TenantBodyGuardMiddleware};
    pub use crate::resolver::{
        InMemorySessionStore, SessionResolver, SessionStore, TokenSessionResolver,
    };
    pub use crate::store::TenantContextStore;
}

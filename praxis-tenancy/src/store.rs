//! Request-scoped tenant context.
//!
//! The context lives in a tokio task-local, so it follows the request's
//! future across every `.await` and is invisible to other requests
//! interleaved on the same executor. The authentication boundary is the only
//! writer; use cases and repositories only read.
//!
//! `tokio::spawn` starts a fresh task with no task-locals. Work that must
//! keep the caller's identity goes through [`TenantContextStore::spawn`] or
//! [`TenantContextStore::propagate`].

use crate::context::AuthenticatedContext;
use crate::error::{Result, TenantError};
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;

tokio::task_local! {
    static REQUEST_CONTEXT: RefCell<Option<Arc<AuthenticatedContext>>>;
}

/// Accessors for the context bound to the current request.
///
/// # Examples
///
/// ```
/// use praxis_tenancy::{AuthenticatedContext, TenantContextStore};
///
/// # tokio_test::block_on(async {
/// let ctx = AuthenticatedContext::new("tenant-1", "user-1");
///
/// let tenant = TenantContextStore::run_with_context(ctx, async {
///     tokio::task::yield_now().await;
///     TenantContextStore::require_tenant_id()
/// })
/// .await
/// .unwrap();
///
/// assert_eq!(tenant, "tenant-1");
/// assert!(TenantContextStore::require_tenant_id().is_err());
/// # });
/// ```
pub struct TenantContextStore;

impl TenantContextStore {
    /// Run `fut` with `ctx` bound for its whole execution.
    pub async fn run_with_context<F>(ctx: AuthenticatedContext, fut: F) -> F::Output
    where
        F: Future,
    {
        REQUEST_CONTEXT
            .scope(RefCell::new(Some(Arc::new(ctx))), fut)
            .await
    }

    /// Run `fut` inside an empty request scope, for boundaries that
    /// authenticate imperatively via [`set_context`](Self::set_context).
    pub async fn scope<F>(fut: F) -> F::Output
    where
        F: Future,
    {
        REQUEST_CONTEXT.scope(RefCell::new(None), fut).await
    }

    /// Synchronous variant of [`run_with_context`](Self::run_with_context).
    pub fn sync_scope<F, R>(ctx: AuthenticatedContext, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        REQUEST_CONTEXT.sync_scope(RefCell::new(Some(Arc::new(ctx))), f)
    }

    /// Bind `ctx` to the enclosing request scope.
    ///
    /// Fails with [`TenantError::NoRequestScope`] when called outside
    /// [`scope`](Self::scope) or [`run_with_context`](Self::run_with_context).
    pub fn set_context(ctx: AuthenticatedContext) -> Result<()> {
        REQUEST_CONTEXT
            .try_with(|slot| {
                *slot.borrow_mut() = Some(Arc::new(ctx));
            })
            .map_err(|_| TenantError::NoRequestScope)
    }

    /// Unbind the context of the enclosing request scope. No-op outside one.
    pub fn clear() {
        let _ = REQUEST_CONTEXT.try_with(|slot| slot.borrow_mut().take());
    }

    /// The bound context, or [`TenantError::ContextMissing`].
    pub fn get_context() -> Result<Arc<AuthenticatedContext>> {
        Self::try_get_context().ok_or(TenantError::ContextMissing)
    }

    /// The bound context, if any.
    pub fn try_get_context() -> Option<Arc<AuthenticatedContext>> {
        REQUEST_CONTEXT
            .try_with(|slot| slot.borrow().clone())
            .ok()
            .flatten()
    }

    /// Owned copy of the bound context, for handing to code that outlives
    /// the request.
    pub fn current() -> Option<AuthenticatedContext> {
        Self::try_get_context().map(|ctx| (*ctx).clone())
    }

    pub fn has_context() -> bool {
        Self::try_get_context().is_some()
    }

    pub fn require_tenant_id() -> Result<String> {
        Ok(Self::get_context()?.tenant_id.clone())
    }

    pub fn require_user_id() -> Result<String> {
        Ok(Self::get_context()?.user_id.clone())
    }

    pub fn require_roles() -> Result<BTreeSet<String>> {
        Ok(Self::get_context()?.roles.clone())
    }

    pub fn has_role(role: &str) -> Result<bool> {
        Ok(Self::get_context()?.has_role(role))
    }

    /// Fails with [`TenantError::MissingRole`] unless the user holds `role`.
    pub fn require_role(role: &str) -> Result<()> {
        if Self::has_role(role)? {
            Ok(())
        } else {
            Err(TenantError::MissingRole(role.to_string()))
        }
    }

    /// Wrap `fut` so it runs under the context bound right now (if any).
    pub fn propagate<F>(fut: F) -> impl Future<Output = F::Output>
    where
        F: Future,
    {
        let captured = Self::try_get_context();
        async move {
            match captured {
                Some(ctx) => REQUEST_CONTEXT.scope(RefCell::new(Some(ctx)), fut).await,
                None => fut.await,
            }
        }
    }

    /// `tokio::spawn` that carries the current context into the new task.
    pub fn spawn<F>(fut: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        tokio::spawn(Self::propagate(fut))
    }
}

//! Tenancy errors

use thiserror::Error;

/// Errors raised while reading or enforcing tenant identity.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TenantError {
    /// Tenant/user context requested outside an authenticated request.
    #[error("No authenticated context bound to the current request")]
    ContextMissing,

    /// `set_context` was called with no request scope to bind into.
    #[error("No request scope is active; wrap the request in TenantContextStore::scope")]
    NoRequestScope,

    /// An entity belongs to a different tenant than the active context.
    #[error("Tenant mismatch: active tenant is {expected}, entity belongs to {found}")]
    TenantMismatch { expected: String, found: String },

    /// The session could not be resolved to an identity.
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// The authenticated user lacks a required role.
    #[error("Forbidden: missing role {0}")]
    MissingRole(String),
}

impl TenantError {
    /// Mismatches signal a bug upstream and are never worth retrying.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::TenantMismatch { .. } | Self::NoRequestScope)
    }
}

impl From<TenantError> for praxis_core::Error {
    fn from(error: TenantError) -> Self {
        match error {
            TenantError::ContextMissing | TenantError::Unauthenticated(_) => {
                praxis_core::Error::Unauthorized(error.to_string())
            }
            TenantError::MissingRole(_) => praxis_core::Error::Forbidden(error.to_string()),
            TenantError::TenantMismatch { .. } | TenantError::NoRequestScope => {
                praxis_core::Error::Internal(error.to_string())
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, TenantError>;

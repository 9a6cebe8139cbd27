//! Authenticated identity for one inbound request.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Kind of account a tenant is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantType {
    /// A single independent practitioner
    #[default]
    Autonomous,
    /// A clinic with several professionals
    Clinic,
}

impl TenantType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Autonomous => "autonomous",
            Self::Clinic => "clinic",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "autonomous" => Some(Self::Autonomous),
            "clinic" => Some(Self::Clinic),
            _ => None,
        }
    }
}

/// Identity resolved by the authentication boundary.
///
/// Created once per authenticated request and never persisted. The email is
/// kept out of `Debug` output so contexts can appear in logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedContext {
    pub tenant_id: String,
    pub user_id: String,
    #[serde(default)]
    pub roles: BTreeSet<String>,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub tenant_type: TenantType,
}

impl AuthenticatedContext {
    /// # Examples
    ///
    /// ```
    /// use praxis_tenancy::{AuthenticatedContext, TenantType};
    ///
    /// let ctx = AuthenticatedContext::new("tenant-1", "user-9")
    ///     .with_roles(["admin", "professional"])
    ///     .with_tenant_type(TenantType::Clinic);
    ///
    /// assert!(ctx.has_role("admin"));
    /// ```
    pub fn new(tenant_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            user_id: user_id.into(),
            roles: BTreeSet::new(),
            email: String::new(),
            tenant_type: TenantType::default(),
        }
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    pub fn with_tenant_type(mut self, tenant_type: TenantType) -> Self {
        self.tenant_type = tenant_type;
        self
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

impl fmt::Debug for AuthenticatedContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticatedContext")
            .field("tenant_id", &self.tenant_id)
            .field("user_id", &self.user_id)
            .field("roles", &self.roles)
            .field("tenant_type", &self.tenant_type)
            .finish_non_exhaustive()
    }
}

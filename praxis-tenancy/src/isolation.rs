//! Tenant-scoped persistence helpers.
//!
//! Repositories never take a tenant id from their callers. They read it from
//! [`TenantContextStore`] on every operation, so a use case cannot reach
//! another tenant's rows by passing the wrong argument.

use crate::error::{Result, TenantError};
use crate::store::TenantContextStore;
use parking_lot::RwLock;
use std::collections::HashMap;

/// An entity owned by exactly one tenant.
pub trait TenantScoped {
    fn tenant_id(&self) -> &str;
}

/// Fail with [`TenantError::TenantMismatch`] unless `entity` belongs to the
/// tenant of the current request.
pub fn ensure_current_tenant<T: TenantScoped + ?Sized>(entity: &T) -> Result<()> {
    let expected = TenantContextStore::require_tenant_id()?;
    if entity.tenant_id() == expected {
        Ok(())
    } else {
        Err(TenantError::TenantMismatch {
            expected,
            found: entity.tenant_id().to_string(),
        })
    }
}

/// In-memory repository partitioned by tenant.
///
/// Every method resolves the partition from the active context.
pub struct TenantScopedRepository<T> {
    partitions: RwLock<HashMap<String, HashMap<String, T>>>,
}

impl<T> Default for TenantScopedRepository<T> {
    fn default() -> Self {
        Self {
            partitions: RwLock::new(HashMap::new()),
        }
    }
}

impl<T: TenantScoped + Clone> TenantScopedRepository<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `entity` under `id` in the current tenant's partition.
    ///
    /// Entities stamped with another tenant are refused.
    pub fn insert(&self, id: impl Into<String>, entity: T) -> Result<()> {
        ensure_current_tenant(&entity)?;
        let tenant = entity.tenant_id().to_string();
        self.partitions
            .write()
            .entry(tenant)
            .or_default()
            .insert(id.into(), entity);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Option<T>> {
        let tenant = TenantContextStore::require_tenant_id()?;
        Ok(self
            .partitions
            .read()
            .get(&tenant)
            .and_then(|p| p.get(id))
            .cloned())
    }

    pub fn list(&self) -> Result<Vec<T>> {
        let tenant = TenantContextStore::require_tenant_id()?;
        Ok(self
            .partitions
            .read()
            .get(&tenant)
            .map(|p| p.values().cloned().collect())
            .unwrap_or_default())
    }

    pub fn remove(&self, id: &str) -> Result<Option<T>> {
        let tenant = TenantContextStore::require_tenant_id()?;
        Ok(self
            .partitions
            .write()
            .get_mut(&tenant)
            .and_then(|p| p.remove(id)))
    }

    pub fn count(&self) -> Result<usize> {
        let tenant = TenantContextStore::require_tenant_id()?;
        Ok(self.partitions.read().get(&tenant).map_or(0, HashMap::len))
    }
}

//! Rejects client-supplied tenant identifiers in write payloads.
//!
//! Tenant identity comes only from [`TenantContextStore`](crate::TenantContextStore).
//! The guard runs at the HTTP boundary before any handler and refuses write
//! bodies that carry a tenant id field anywhere within the configured depth,
//! so a handler that forgets to ignore such a field never sees it.

use praxis_core::HttpMethod;
use serde_json::Value;
use std::collections::BTreeSet;

/// Error code returned to clients on rejection.
pub const TENANT_ID_NOT_ALLOWED: &str = "TENANT_ID_NOT_ALLOWED";

/// Default depth bound for body traversal.
pub const DEFAULT_MAX_DEPTH: usize = 5;

/// Outcome of a guard check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allowed,
    Rejected(GuardRejection),
}

impl GuardDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Why a body was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardRejection {
    /// Always [`TENANT_ID_NOT_ALLOWED`]
    pub code: &'static str,
    /// The offending key as sent by the client
    pub field: String,
    /// JSON path to the key, e.g. `items[0].tenant_id`
    pub path: String,
}

impl GuardRejection {
    pub fn message(&self) -> String {
        format!(
            "Field '{}' is not allowed in request bodies; tenant is taken from the session",
            self.path
        )
    }
}

/// Bounded-depth scanner for tenant identifier fields.
///
/// Keys are compared after lowercasing and removing `_` and `-`, so
/// `tenantId`, `tenant_id`, `TenantID`, `TENANT_ID` and `tenant-id` all
/// match the default field. Keys of the top-level object sit at depth 1;
/// arrays do not add depth of their own.
#[derive(Debug, Clone)]
pub struct TenantBodyGuard {
    max_depth: usize,
    fields: BTreeSet<String>,
}

impl TenantBodyGuard {
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> TenantBodyGuardBuilder {
        TenantBodyGuardBuilder::default()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Check a parsed body for the given method. Read-only methods always pass.
    pub fn check(&self, method: HttpMethod, body: &Value) -> GuardDecision {
        if !method.is_mutating() {
            return GuardDecision::Allowed;
        }

        match self.find(body, 1, String::new()) {
            Some(rejection) => GuardDecision::Rejected(rejection),
            None => GuardDecision::Allowed,
        }
    }

    /// Whether `key` names a tenant identifier.
    pub fn is_forbidden_key(&self, key: &str) -> bool {
        self.fields.contains(&normalize(key))
    }

    fn find(&self, value: &Value, depth: usize, path: String) -> Option<GuardRejection> {
        if depth > self.max_depth {
            return None;
        }

        match value {
            Value::Object(map) => {
                for (key, child) in map {
                    let child_path = if path.is_empty() {
                        key.clone()
                    } else {
                        format!("{}.{}", path, key)
                    };

                    if self.is_forbidden_key(key) {
                        return Some(GuardRejection {
                            code: TENANT_ID_NOT_ALLOWED,
                            field: key.clone(),
                            path: child_path,
                        });
                    }

                    if let Some(found) = self.find(child, depth + 1, child_path) {
                        return Some(found);
                    }
                }
                None
            }
            Value::Array(items) => items
                .iter()
                .enumerate()
                .find_map(|(i, item)| self.find(item, depth, format!("{}[{}]", path, i))),
            _ => None,
        }
    }
}

impl Default for TenantBodyGuard {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for [`TenantBodyGuard`].
#[derive(Debug, Clone)]
pub struct TenantBodyGuardBuilder {
    max_depth: usize,
    fields: BTreeSet<String>,
}

impl Default for TenantBodyGuardBuilder {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            fields: BTreeSet::from([normalize("tenant_id")]),
        }
    }
}

impl TenantBodyGuardBuilder {
    /// Deepest nesting level that is scanned (top-level keys are level 1).
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Also reject `field` and its case/underscore variants.
    pub fn forbid_field(mut self, field: &str) -> Self {
        self.fields.insert(normalize(field));
        self
    }

    pub fn build(self) -> TenantBodyGuard {
        TenantBodyGuard {
            max_depth: self.max_depth,
            fields: self.fields,
        }
    }
}

fn normalize(key: &str) -> String {
    key.chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rejected_path(decision: GuardDecision) -> String {
        match decision {
            GuardDecision::Rejected(r) => {
                assert_eq!(r.code, TENANT_ID_NOT_ALLOWED);
                r.path
            }
            GuardDecision::Allowed => panic!("expected rejection"),
        }
    }

    #[test]
    fn test_naming_variants_rejected() {
        let guard = TenantBodyGuard::new();
        for key in ["tenantId", "tenant_id", "TenantId", "TENANT_ID", "tenant-id", "tenantID"] {
            let body = json!({ "name": "Ana", key: "t2" });
            assert_eq!(rejected_path(guard.check(HttpMethod::Post, &body)), key);
        }
    }

    #[test]
    fn test_unrelated_keys_allowed() {
        let guard = TenantBodyGuard::new();
        let body = json!({ "tenant": "x", "tenantName": "y", "id": 1, "patient_id": "p1" });
        assert!(guard.check(HttpMethod::Post, &body).is_allowed());
    }

    #[test]
    fn test_all_mutating_methods_scanned() {
        let guard = TenantBodyGuard::new();
        let body = json!({ "tenantId": "t2" });
        for method in [HttpMethod::Post, HttpMethod::Put, HttpMethod::Patch, HttpMethod::Delete] {
            assert!(!guard.check(method, &body).is_allowed());
        }
    }

    #[test]
    fn test_read_only_methods_not_scanned() {
        let guard = TenantBodyGuard::new();
        let body = json!({ "tenantId": "t2" });
        for method in [HttpMethod::Get, HttpMethod::Head, HttpMethod::Options] {
            assert!(guard.check(method, &body).is_allowed());
        }
    }

    #[test]
    fn test_nested_up_to_depth_five() {
        let guard = TenantBodyGuard::new();
        let depth_five = json!({ "a": { "b": { "c": { "d": { "tenant_id": "t2" } } } } });
        assert_eq!(
            rejected_path(guard.check(HttpMethod::Put, &depth_five)),
            "a.b.c.d.tenant_id"
        );

        let depth_six = json!({ "a": { "b": { "c": { "d": { "e": { "tenant_id": "t2" } } } } } });
        assert!(guard.check(HttpMethod::Put, &depth_six).is_allowed());
    }

    #[test]
    fn test_arrays_are_traversed() {
        let guard = TenantBodyGuard::new();
        let body = json!({ "items": [ { "sku": 1 }, { "TenantId": "t2" } ] });
        assert_eq!(
            rejected_path(guard.check(HttpMethod::Post, &body)),
            "items[1].TenantId"
        );

        let top_level_array = json!([{ "tenantId": "t2" }]);
        assert_eq!(
            rejected_path(guard.check(HttpMethod::Post, &top_level_array)),
            "[0].tenantId"
        );
    }

    #[test]
    fn test_configurable_depth_and_fields() {
        let guard = TenantBodyGuard::builder()
            .max_depth(1)
            .forbid_field("clinicId")
            .build();

        assert!(!guard.check(HttpMethod::Post, &json!({ "clinic_id": "c" })).is_allowed());
        assert!(guard
            .check(HttpMethod::Post, &json!({ "nested": { "tenantId": "t" } }))
            .is_allowed());
    }

    #[test]
    fn test_scalar_bodies_allowed() {
        let guard = TenantBodyGuard::new();
        assert!(guard.check(HttpMethod::Post, &json!("tenantId")).is_allowed());
        assert!(guard.check(HttpMethod::Post, &Value::Null).is_allowed());
    }
}

//! Strict scope enforcement for `execute` (§4.4): the operation must be a
//! literal element of the capability's scope, and parameters are filtered
//! against a per-resource allow-list before anything leaves the process.

use std::collections::{HashMap, HashSet};

/// Per-resource allow-lists of parameter names callers may pass through
/// `execute`. Resources with no entry accept no parameters at all.
#[derive(Debug, Clone, Default)]
pub struct ParamAllowList {
    by_resource: HashMap<String, HashSet<String>>,
}

impl ParamAllowList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow(mut self, resource: impl Into<String>, params: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.by_resource
            .entry(resource.into())
            .or_default()
            .extend(params.into_iter().map(Into::into));
        self
    }

    fn is_allowed(&self, resource: &str, param: &str) -> bool {
        self.by_resource
            .get(resource)
            .map(|allowed| allowed.contains(param))
            .unwrap_or(false)
    }
}

/// Check that `operation` is literally in `scope` and every key of `params`
/// is on the resource's allow-list. Returns `Ok(())` or a scope violation
/// with no side effects — the caller must not perform any I/O before this
/// check passes.
pub fn enforce(
    resource: &str,
    scope: &[String],
    operation: &str,
    params: &serde_json::Map<String, serde_json::Value>,
    allow_list: &ParamAllowList,
) -> Result<(), crate::error::CapabilityError> {
    if !scope.iter().any(|s| s == operation) {
        return Err(crate::error::CapabilityError::ScopeViolation);
    }
    for key in params.keys() {
        if !allow_list.is_allowed(resource, key) {
            return Err(crate::error::CapabilityError::ScopeViolation);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn allow_list() -> ParamAllowList {
        ParamAllowList::new().allow("calendar", ["start", "end"])
    }

    fn params(obj: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        obj.as_object().unwrap().clone()
    }

    #[test]
    fn allows_operation_in_scope_with_allowed_params() {
        let scope = vec!["read".to_string()];
        let p = params(json!({"start": "2026-01-01"}));
        assert!(enforce("calendar", &scope, "read", &p, &allow_list()).is_ok());
    }

    #[test]
    fn rejects_operation_not_in_scope() {
        let scope = vec!["read".to_string()];
        let p = params(json!({}));
        assert!(matches!(
            enforce("calendar", &scope, "write", &p, &allow_list()),
            Err(crate::error::CapabilityError::ScopeViolation)
        ));
    }

    #[test]
    fn rejects_param_outside_allow_list() {
        let scope = vec!["read".to_string()];
        let p = params(json!({"admin": true}));
        assert!(matches!(
            enforce("calendar", &scope, "read", &p, &allow_list()),
            Err(crate::error::CapabilityError::ScopeViolation)
        ));
    }

    #[test]
    fn resource_with_no_entry_accepts_no_params() {
        let scope = vec!["read".to_string()];
        let p = params(json!({"start": "x"}));
        assert!(matches!(
            enforce("contacts", &scope, "read", &p, &ParamAllowList::new()),
            Err(crate::error::CapabilityError::ScopeViolation)
        ));
    }
}

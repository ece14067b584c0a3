//! Method-scoped route table.

use std::collections::HashMap;

use flint_core::{Handler, Method};

use crate::trie::Tree;

/// What to do when a registration lands on an already-bound verb+pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    /// The later registration silently wins (a warning is logged).
    #[default]
    Overwrite,
    /// The registration fails with [`RouteConflict`].
    Reject,
}

/// A duplicate registration refused under [`ConflictPolicy::Reject`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("duplicate route: {method} {pattern}")]
pub struct RouteConflict {
    pub method: Method,
    pub pattern: String,
}

/// A matched route with its captured parameters.
#[derive(Clone)]
pub struct RouteMatch<'r> {
    /// The bound handling function.
    pub handler: &'r Handler,
    /// Captured path parameters, in capture order. Values are raw,
    /// undecoded path segments.
    pub params: Vec<(String, String)>,
}

impl RouteMatch<'_> {
    /// Get a captured parameter value by name.
    #[must_use]
    pub fn get_param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// One radix tree per HTTP method.
///
/// Mutated only during the single-threaded registration phase; lookups
/// during serving are read-only and need no synchronization.
#[derive(Default)]
pub struct Router {
    trees: HashMap<Method, Tree>,
    policy: ConflictPolicy,
}

impl Router {
    /// Create a router with the default [`ConflictPolicy::Overwrite`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a router with an explicit conflict policy.
    #[must_use]
    pub fn with_policy(policy: ConflictPolicy) -> Self {
        Self {
            trees: HashMap::new(),
            policy,
        }
    }

    /// The active conflict policy.
    #[must_use]
    pub fn policy(&self) -> ConflictPolicy {
        self.policy
    }

    /// Register `handler` for `method` + `pattern`.
    pub fn add(
        &mut self,
        method: Method,
        pattern: &str,
        handler: Handler,
    ) -> Result<(), RouteConflict> {
        let tree = self.trees.entry(method).or_default();
        match tree.insert(pattern, handler, self.policy) {
            Ok(displaced) => {
                if displaced {
                    tracing::warn!(%method, pattern, "route overwritten by a later registration");
                } else {
                    tracing::debug!(%method, pattern, "route registered");
                }
                Ok(())
            }
            Err(_) => Err(RouteConflict {
                method,
                pattern: pattern.to_owned(),
            }),
        }
    }

    /// Resolve a request to a handler.
    ///
    /// Returns `None` when no route matches — the normal "no route"
    /// outcome, translated by the server façade, never a fault.
    #[must_use]
    pub fn find(&self, method: Method, path: &str) -> Option<RouteMatch<'_>> {
        let tree = self.trees.get(&method)?;
        let (handler, params) = tree.search(path)?;
        Some(RouteMatch { handler, params })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flint_core::handler_fn;
    use std::sync::Arc;

    fn noop() -> Handler {
        handler_fn(|_ctx| Ok(()))
    }

    #[test]
    fn methods_have_independent_trees() {
        let mut router = Router::new();
        let get = noop();
        let post = noop();
        router.add(Method::Get, "/x", get.clone()).unwrap();
        router.add(Method::Post, "/x", post.clone()).unwrap();

        let found = router.find(Method::Get, "/x").unwrap();
        assert!(Arc::ptr_eq(found.handler, &get));
        let found = router.find(Method::Post, "/x").unwrap();
        assert!(Arc::ptr_eq(found.handler, &post));
        assert!(router.find(Method::Delete, "/x").is_none());
    }

    #[test]
    fn not_found_is_a_value() {
        let router = Router::new();
        assert!(router.find(Method::Get, "/anything").is_none());
    }

    #[test]
    fn get_param_by_name() {
        let mut router = Router::new();
        router.add(Method::Get, "/users/:id", noop()).unwrap();
        let found = router.find(Method::Get, "/users/42").unwrap();
        assert_eq!(found.get_param("id"), Some("42"));
        assert_eq!(found.get_param("missing"), None);
    }

    #[test]
    fn overwrite_policy_replaces_silently() {
        let mut router = Router::new();
        let first = noop();
        let second = noop();
        router.add(Method::Get, "/dup", first).unwrap();
        router.add(Method::Get, "/dup", second.clone()).unwrap();

        let found = router.find(Method::Get, "/dup").unwrap();
        assert!(Arc::ptr_eq(found.handler, &second));
    }

    #[test]
    fn reject_policy_surfaces_conflicts() {
        let mut router = Router::with_policy(ConflictPolicy::Reject);
        router.add(Method::Get, "/dup", noop()).unwrap();
        let err = router.add(Method::Get, "/dup", noop()).unwrap_err();
        assert_eq!(err.method, Method::Get);
        assert_eq!(err.pattern, "/dup");
        assert_eq!(err.to_string(), "duplicate route: GET /dup");

        // Same pattern on another method is not a conflict.
        assert!(router.add(Method::Post, "/dup", noop()).is_ok());
    }
}

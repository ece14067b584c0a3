//! Controller registry and route installation.
//!
//! The registry is an explicit value owned by the `Application`, so
//! independent applications (and test suites) coexist in one process.
//! Registration records a base path per controller type; installation
//! walks the registrations in order and computes one route per exposed
//! operation from the convention table.

use std::sync::Arc;

use flint_core::{Context, Handler, MiddlewareStack};
use flint_router::{RouteConflict, Router};

use crate::controller::{Controller, OperationFn, Operations, default_verbs, route_path};

type Installer = Box<dyn Fn(&mut Router) -> Result<(), RouteConflict> + Send + Sync>;

struct Registration {
    base: String,
    install: Installer,
}

/// Registered controllers keyed by `prefix/lowercased-name`.
#[derive(Default)]
pub struct ControllerRegistry {
    entries: Vec<Registration>,
}

impl ControllerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a controller under its lowercased name, optionally nested
    /// below a path prefix.
    ///
    /// Re-registering the same key replaces the earlier registration.
    pub fn register<C: Controller>(&mut self, prefix: Option<&str>) {
        let name = C::name().to_ascii_lowercase();
        let base = match prefix.map(|p| p.trim_matches('/')) {
            Some(prefix) if !prefix.is_empty() => format!("{prefix}/{name}"),
            _ => name,
        };
        self.entries.retain(|entry| entry.base != base);

        let install_base = base.clone();
        let install: Installer =
            Box::new(move |router| install_controller::<C>(&install_base, router));
        self.entries.push(Registration { base, install });
    }

    /// Number of registered controllers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Install every registration's routes, in registration order.
    pub(crate) fn install_routes(&self, router: &mut Router) -> Result<(), RouteConflict> {
        for entry in &self.entries {
            (entry.install)(router)?;
        }
        Ok(())
    }
}

fn install_controller<C: Controller>(
    base: &str,
    router: &mut Router,
) -> Result<(), RouteConflict> {
    let mut ops = Operations::new();
    C::expose(&mut ops);

    // One probe instance answers the install-time questions; per-request
    // instances are built inside the handler.
    let probe = C::default();
    for &(name, operation) in ops.entries() {
        let path = route_path(base, name);
        let verbs = probe
            .verbs_for(name)
            .unwrap_or_else(|| default_verbs(name));
        let handler =
            operation_handler::<C>(operation, probe.middleware(), probe.middleware_for(name));
        for method in verbs {
            router.add(method, &path, handler.clone())?;
        }
        tracing::debug!(controller = base, operation = name, path = %path, "operation route installed");
    }
    Ok(())
}

/// Build the installed handler for one operation: a fresh unit per call,
/// wrapped operation-level inside unit-level. The global stack is applied
/// by the server façade at dispatch, outermost.
fn operation_handler<C: Controller>(
    operation: OperationFn<C>,
    unit_stack: MiddlewareStack,
    operation_stack: MiddlewareStack,
) -> Handler {
    let inner: Handler = Arc::new(move |ctx: &mut Context| {
        let mut unit = C::default();
        operation(&mut unit, ctx)
    });
    unit_stack.apply(operation_stack.apply(inner))
}

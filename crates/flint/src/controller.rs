//! Controllers: convention-routed groups of operations.
//!
//! A controller declares its operations through [`Controller::expose`] as
//! plain function pointers, discovered once at route-installation time.
//! Operation names drive the REST convention table: `Index`, `Show`,
//! `Create`, `Store`, `Edit`, `Update` and `Delete` map to fixed
//! verb/path pairs relative to the controller's base path; any other
//! name maps to `GET`+`POST` on `/base/lowercased-name`.

use flint_core::{Context, Error, Method, MiddlewareStack};

/// An operation body: a fresh controller instance plus the request
/// context, nothing else. All request data is read through the context.
pub type OperationFn<C> = fn(&mut C, &mut Context) -> Result<(), Error>;

/// The operation table a controller fills in [`Controller::expose`].
pub struct Operations<C> {
    entries: Vec<(&'static str, OperationFn<C>)>,
}

impl<C> Operations<C> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Register an operation under a convention name.
    ///
    /// Exposing the same name twice replaces the earlier function.
    pub fn expose(&mut self, name: &'static str, operation: OperationFn<C>) {
        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            entry.1 = operation;
        } else {
            self.entries.push((name, operation));
        }
    }

    pub(crate) fn entries(&self) -> &[(&'static str, OperationFn<C>)] {
        &self.entries
    }

    /// Number of exposed operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing was exposed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A convention-dispatched handling unit.
///
/// Implementations are stateless: a fresh instance is `Default`-built
/// for every matched request, so operation bodies never need locking of
/// their own.
pub trait Controller: Default + Sized + 'static {
    /// Declare the operations this controller exposes.
    fn expose(ops: &mut Operations<Self>);

    /// The name the registry lowercases into the base path.
    ///
    /// Defaults to the type's base name. Override when the type name and
    /// the routed name should differ (or when a generic type makes the
    /// derived name unusable).
    #[must_use]
    fn name() -> &'static str {
        base_type_name::<Self>()
    }

    /// Unit-level interceptors, wrapped around every operation.
    #[must_use]
    fn middleware(&self) -> MiddlewareStack {
        MiddlewareStack::new()
    }

    /// Operation-level interceptors, wrapped inside the unit-level ones.
    #[must_use]
    fn middleware_for(&self, operation: &str) -> MiddlewareStack {
        let _ = operation;
        MiddlewareStack::new()
    }

    /// Per-operation verb override, consulted before the convention
    /// table.
    #[must_use]
    fn verbs_for(&self, operation: &str) -> Option<Vec<Method>> {
        let _ = operation;
        None
    }
}

fn base_type_name<C>() -> &'static str {
    let full = std::any::type_name::<C>();
    full.rsplit("::").next().unwrap_or(full)
}

/// Route path for an operation, relative to the base path.
pub(crate) fn route_path(base: &str, operation: &str) -> String {
    match operation {
        "Index" | "Store" => format!("/{base}"),
        "Show" | "Update" | "Delete" => format!("/{base}/:id"),
        "Create" => format!("/{base}/create"),
        "Edit" => format!("/{base}/:id/edit"),
        other => format!("/{base}/{}", other.to_lowercase()),
    }
}

/// Default verb set for an operation name.
pub(crate) fn default_verbs(operation: &str) -> Vec<Method> {
    match operation {
        "Index" | "Show" | "Create" | "Edit" => vec![Method::Get],
        "Store" => vec![Method::Post],
        "Update" => vec![Method::Put, Method::Post],
        "Delete" => vec![Method::Delete, Method::Post],
        _ => vec![Method::Get, Method::Post],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flint_core::StatusCode;

    #[derive(Default)]
    struct Widget;

    impl Controller for Widget {
        fn expose(ops: &mut Operations<Self>) {
            ops.expose("Index", |_, ctx| ctx.text(StatusCode::OK, "index"));
        }
    }

    #[test]
    fn name_defaults_to_type_base_name() {
        assert_eq!(Widget::name(), "Widget");
    }

    #[test]
    fn convention_paths() {
        let cases = [
            ("Index", "/product"),
            ("Show", "/product/:id"),
            ("Create", "/product/create"),
            ("Store", "/product"),
            ("Edit", "/product/:id/edit"),
            ("Update", "/product/:id"),
            ("Delete", "/product/:id"),
            ("Search", "/product/search"),
        ];
        for (operation, expected) in cases {
            assert_eq!(route_path("product", operation), expected, "{operation}");
        }
        // Names are case-sensitive: an unrecognized casing falls through
        // to the catch-all mapping.
        assert_eq!(route_path("product", "index"), "/product/index");
    }

    #[test]
    fn convention_verbs() {
        assert_eq!(default_verbs("Index"), vec![Method::Get]);
        assert_eq!(default_verbs("Show"), vec![Method::Get]);
        assert_eq!(default_verbs("Create"), vec![Method::Get]);
        assert_eq!(default_verbs("Edit"), vec![Method::Get]);
        assert_eq!(default_verbs("Store"), vec![Method::Post]);
        assert_eq!(default_verbs("Update"), vec![Method::Put, Method::Post]);
        assert_eq!(default_verbs("Delete"), vec![Method::Delete, Method::Post]);
        assert_eq!(default_verbs("Search"), vec![Method::Get, Method::Post]);
    }

    #[test]
    fn expose_replaces_duplicate_names() {
        let mut ops = Operations::<Widget>::new();
        ops.expose("Index", |_, ctx| ctx.text(StatusCode::OK, "first"));
        ops.expose("Index", |_, ctx| ctx.text(StatusCode::OK, "second"));
        ops.expose("Show", |_, ctx| ctx.text(StatusCode::OK, "show"));
        assert_eq!(ops.len(), 2);
    }
}

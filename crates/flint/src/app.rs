//! Application façade.
//!
//! `Application` composes the router, the global interceptor stack, the
//! controller registry and the context pool. Registration happens
//! single-threaded through `&mut self` before serving starts; `handle`
//! takes `&self` and is safe to call from any number of threads once
//! registration is done.

use std::path::{Component, Path, PathBuf};

use flint_core::{
    Context, ContextPool, Error, Handler, Method, Middleware, MiddlewareStack, Request, Response,
    ResponseBody, StatusCode, handler_fn,
};
use flint_router::{ConflictPolicy, Router};

use crate::controller::Controller;
use crate::registry::ControllerRegistry;

/// The server façade: registration surface plus the inbound entry point.
#[derive(Default)]
pub struct Application {
    router: Router,
    middleware: MiddlewareStack,
    registry: ControllerRegistry,
    pool: ContextPool,
}

impl Application {
    /// Create an application with the default conflict policy
    /// (last registration wins).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an application with an explicit route-conflict policy.
    ///
    /// Under [`ConflictPolicy::Reject`] any duplicate registration
    /// panics with the conflict message — a boot-time configuration
    /// error surfaced during the registration phase.
    #[must_use]
    pub fn with_policy(policy: ConflictPolicy) -> Self {
        Self {
            router: Router::with_policy(policy),
            middleware: MiddlewareStack::new(),
            registry: ControllerRegistry::new(),
            pool: ContextPool::new(),
        }
    }

    /// Append a global interceptor. Layers added first run outermost.
    pub fn middleware(&mut self, layer: Middleware) {
        self.middleware.push(layer);
    }

    fn route(&mut self, method: Method, pattern: &str, handler: Handler) {
        if let Err(conflict) = self.router.add(method, pattern, handler) {
            panic!("{conflict}");
        }
    }

    /// Register a GET route.
    pub fn get<H>(&mut self, pattern: &str, handler: H)
    where
        H: Fn(&mut Context) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.route(Method::Get, pattern, handler_fn(handler));
    }

    /// Register a POST route.
    pub fn post<H>(&mut self, pattern: &str, handler: H)
    where
        H: Fn(&mut Context) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.route(Method::Post, pattern, handler_fn(handler));
    }

    /// Register a PUT route.
    pub fn put<H>(&mut self, pattern: &str, handler: H)
    where
        H: Fn(&mut Context) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.route(Method::Put, pattern, handler_fn(handler));
    }

    /// Register a DELETE route.
    pub fn delete<H>(&mut self, pattern: &str, handler: H)
    where
        H: Fn(&mut Context) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.route(Method::Delete, pattern, handler_fn(handler));
    }

    /// Register a PATCH route.
    pub fn patch<H>(&mut self, pattern: &str, handler: H)
    where
        H: Fn(&mut Context) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.route(Method::Patch, pattern, handler_fn(handler));
    }

    /// Register a HEAD route.
    pub fn head<H>(&mut self, pattern: &str, handler: H)
    where
        H: Fn(&mut Context) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.route(Method::Head, pattern, handler_fn(handler));
    }

    /// Register an OPTIONS route.
    pub fn options<H>(&mut self, pattern: &str, handler: H)
    where
        H: Fn(&mut Context) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.route(Method::Options, pattern, handler_fn(handler));
    }

    /// Open a route group that prefixes patterns and wraps its own
    /// interceptors around every route registered through it.
    pub fn group(&mut self, prefix: &str) -> Group<'_> {
        Group {
            prefix: prefix.trim_end_matches('/').to_owned(),
            middleware: MiddlewareStack::new(),
            app: self,
        }
    }

    /// Serve files below `root` under `prefix/*filepath`.
    ///
    /// Missing files, directories and paths escaping the root answer
    /// with the canonical 404 body.
    pub fn static_dir(&mut self, prefix: &str, root: impl Into<PathBuf>) {
        let root = root.into();
        let pattern = format!("{}/*filepath", prefix.trim_end_matches('/'));
        self.get(&pattern, move |ctx| serve_static(&root, ctx));
    }

    /// Record a controller under its lowercased name.
    pub fn register<C: Controller>(&mut self) {
        self.registry.register::<C>(None);
    }

    /// Record a controller below a path prefix (e.g. `"admin"`).
    pub fn register_with_prefix<C: Controller>(&mut self, prefix: &str) {
        self.registry.register::<C>(Some(prefix));
    }

    /// Install routes for every registered controller.
    ///
    /// Under [`ConflictPolicy::Reject`] a duplicate installation panics,
    /// like the direct registration methods.
    pub fn auto_route(&mut self) {
        let Self {
            router, registry, ..
        } = self;
        if let Err(conflict) = registry.install_routes(router) {
            panic!("{conflict}");
        }
    }

    /// The single inbound entry point.
    ///
    /// Acquires a pooled context, resolves the route, binds parameters,
    /// applies the global interceptor stack and translates errors. A
    /// missing route answers 404; an uncommitted handler error becomes
    /// its status (500 for non-status errors); a handler that commits
    /// nothing answers an empty 200.
    pub fn handle(&self, request: Request) -> Response {
        let mut ctx = self.pool.acquire(request);

        let Some(found) = self.router.find(ctx.method(), ctx.path()) else {
            return Response::not_found();
        };
        let handler = found.handler.clone();
        ctx.set_params(found.params);

        let composed = self.middleware.apply(handler);
        let result = composed(&mut ctx);
        let response = ctx.take_response();

        match result {
            Ok(()) => response.unwrap_or_else(|| Response::new(StatusCode::OK)),
            Err(err) => match response {
                Some(response) => {
                    tracing::warn!(error = %err, "handler error after response commit");
                    response
                }
                None => error_response(&err),
            },
        }
    }
}

/// A set of routes sharing a path prefix and an interceptor stack.
pub struct Group<'a> {
    prefix: String,
    middleware: MiddlewareStack,
    app: &'a mut Application,
}

impl Group<'_> {
    /// Append an interceptor wrapped around every route registered
    /// through this group from here on.
    #[must_use]
    pub fn middleware(mut self, layer: Middleware) -> Self {
        self.middleware.push(layer);
        self
    }

    fn route(&mut self, method: Method, pattern: &str, handler: Handler) {
        let pattern = join_paths(&self.prefix, pattern);
        let wrapped = self.middleware.apply(handler);
        self.app.route(method, &pattern, wrapped);
    }

    /// Register a GET route inside the group.
    pub fn get<H>(&mut self, pattern: &str, handler: H)
    where
        H: Fn(&mut Context) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.route(Method::Get, pattern, handler_fn(handler));
    }

    /// Register a POST route inside the group.
    pub fn post<H>(&mut self, pattern: &str, handler: H)
    where
        H: Fn(&mut Context) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.route(Method::Post, pattern, handler_fn(handler));
    }

    /// Register a PUT route inside the group.
    pub fn put<H>(&mut self, pattern: &str, handler: H)
    where
        H: Fn(&mut Context) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.route(Method::Put, pattern, handler_fn(handler));
    }

    /// Register a DELETE route inside the group.
    pub fn delete<H>(&mut self, pattern: &str, handler: H)
    where
        H: Fn(&mut Context) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.route(Method::Delete, pattern, handler_fn(handler));
    }

    /// Open a nested group; the child inherits this group's prefix and
    /// interceptors.
    pub fn group(&mut self, prefix: &str) -> Group<'_> {
        Group {
            prefix: join_paths(&self.prefix, prefix),
            middleware: self.middleware.clone(),
            app: &mut *self.app,
        }
    }
}

fn join_paths(prefix: &str, pattern: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let pattern = pattern.trim_start_matches('/');
    if pattern.is_empty() {
        if prefix.is_empty() {
            "/".to_owned()
        } else {
            prefix.to_owned()
        }
    } else {
        format!("{prefix}/{pattern}")
    }
}

fn serve_static(root: &Path, ctx: &mut Context) -> Result<(), Error> {
    let rel = ctx.param("filepath").unwrap_or("").to_owned();
    let rel = Path::new(&rel);
    // Only plain path components may reach the filesystem; `..`, a
    // root or a prefix component would escape `root`.
    if rel.components().any(|c| !matches!(c, Component::Normal(_))) {
        return ctx.text(StatusCode::NOT_FOUND, "404 page not found");
    }
    let full = root.join(rel);
    if !full.is_file() {
        return ctx.text(StatusCode::NOT_FOUND, "404 page not found");
    }
    ctx.file(full)
}

fn error_response(err: &Error) -> Response {
    Response::new(err.response_status())
        .header("content-type", "text/plain; charset=utf-8")
        .body(ResponseBody::Bytes(err.to_string().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flint_core::middleware_fn;

    #[test]
    fn dispatches_and_binds_params() {
        let mut app = Application::new();
        app.get("/hello/:name", |ctx| {
            let name = ctx.param("name").unwrap_or("world").to_owned();
            ctx.text(StatusCode::OK, format!("hello {name}"))
        });

        let resp = app.handle(Request::get("/hello/flint"));
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.text(), "hello flint");
    }

    #[test]
    fn unknown_route_answers_404() {
        let app = Application::new();
        let resp = app.handle(Request::get("/nope"));
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(resp.text(), "404 page not found");
    }

    #[test]
    fn handler_without_commit_answers_empty_200() {
        let mut app = Application::new();
        app.get("/noop", |_ctx| Ok(()));
        let resp = app.handle(Request::get("/noop"));
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.body_ref().as_bytes().is_empty());
    }

    #[test]
    fn uncommitted_error_is_translated() {
        let mut app = Application::new();
        app.get("/teapot", |_ctx| {
            Err(Error::status(StatusCode::from_u16(418), "short and stout"))
        });
        app.get("/broken", |_ctx| {
            Err(Error::from(std::io::Error::other("disk on fire")))
        });

        let resp = app.handle(Request::get("/teapot"));
        assert_eq!(resp.status().as_u16(), 418);
        assert_eq!(resp.text(), "short and stout");

        let resp = app.handle(Request::get("/broken"));
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn committed_response_wins_over_late_error() {
        let mut app = Application::new();
        app.get("/half", |ctx| {
            ctx.text(StatusCode::OK, "already out")?;
            Err(Error::status(StatusCode::BAD_REQUEST, "too late"))
        });
        let resp = app.handle(Request::get("/half"));
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.text(), "already out");
    }

    #[test]
    fn group_prefixes_and_wraps() {
        let mut app = Application::new();
        let mut api = app.group("/api").middleware(middleware_fn(|next| {
            handler_fn(move |ctx| {
                ctx.set_header("x-api", "v1");
                next(ctx)
            })
        }));
        api.get("/ping", |ctx| ctx.text(StatusCode::OK, "pong"));

        let mut nested = api.group("/admin");
        nested.get("/ping", |ctx| ctx.text(StatusCode::OK, "admin pong"));

        let resp = app.handle(Request::get("/api/ping"));
        assert_eq!(resp.text(), "pong");
        assert_eq!(resp.header_value("x-api"), Some("v1"));

        let resp = app.handle(Request::get("/api/admin/ping"));
        assert_eq!(resp.text(), "admin pong");
        assert_eq!(resp.header_value("x-api"), Some("v1"));

        // Routes outside the group stay unwrapped.
        app.get("/bare", |ctx| ctx.text(StatusCode::OK, "bare"));
        let resp = app.handle(Request::get("/bare"));
        assert_eq!(resp.header_value("x-api"), None);
    }

    #[test]
    #[should_panic(expected = "duplicate route: GET /dup")]
    fn reject_policy_panics_on_duplicate_registration() {
        let mut app = Application::with_policy(ConflictPolicy::Reject);
        app.get("/dup", |ctx| ctx.text(StatusCode::OK, "one"));
        app.get("/dup", |ctx| ctx.text(StatusCode::OK, "two"));
    }

    #[test]
    fn overwrite_policy_lets_the_later_route_win() {
        let mut app = Application::new();
        app.get("/dup", |ctx| ctx.text(StatusCode::OK, "one"));
        app.get("/dup", |ctx| ctx.text(StatusCode::OK, "two"));
        let resp = app.handle(Request::get("/dup"));
        assert_eq!(resp.text(), "two");
    }

    #[test]
    fn join_paths_normalizes_slashes() {
        assert_eq!(join_paths("/api", "/ping"), "/api/ping");
        assert_eq!(join_paths("/api/", "ping"), "/api/ping");
        assert_eq!(join_paths("/api", ""), "/api");
        assert_eq!(join_paths("", "/ping"), "/ping");
        assert_eq!(join_paths("", ""), "/");
    }
}

//! A lightweight MVC-style web framework core.
//!
//! flint provides the request-routing and dispatch pipeline of an
//! embedded HTTP serving layer:
//!
//! - **Trie routing** — per-method radix trees with `:param` and
//!   trailing `*wildcard` segments, static-over-param precedence and
//!   backtracking
//! - **Pooled request contexts** — per-request state recycled through a
//!   free-list, released on every exit path
//! - **Composable interceptors** — global, controller-level and
//!   operation-level middleware stacks with deterministic ordering
//! - **Convention dispatch** — controllers expose named operations that
//!   map onto REST routes without hand-written registration
//!
//! # Quick Start
//!
//! ```
//! use flint::prelude::*;
//!
//! let mut app = Application::new();
//! app.get("/hello/:name", |ctx| {
//!     let name = ctx.param("name").unwrap_or("world").to_owned();
//!     ctx.text(StatusCode::OK, format!("hello {name}"))
//! });
//!
//! let resp = app.handle(Request::get("/hello/flint"));
//! assert_eq!(resp.text(), "hello flint");
//! ```
//!
//! Transport wiring (listeners, TLS, graceful shutdown) and storage are
//! collaborator concerns; the façade consumes an already-parsed
//! [`Request`] and returns a [`Response`].
//!
//! # Crate Structure
//!
//! - [`flint_core`] — context, interceptors, HTTP vocabulary
//! - [`flint_router`] — the radix-trie matcher

#![forbid(unsafe_code)]

// Re-export crates
pub use flint_core as core;
pub use flint_router as router;

mod app;
mod controller;
mod registry;

pub use app::{Application, Group};
pub use controller::{Controller, OperationFn, Operations};
pub use registry::ControllerRegistry;

// Re-export commonly used types
pub use flint_core::{
    Body, Context, ContextPool, CorsConfig, Error, Handler, Headers, Method, Middleware,
    MiddlewareStack, PooledContext, QueryString, Request, Response, ResponseBody, StatusCode,
    cors, cors_with, handler_fn, logger, middleware_fn, recovery,
};
pub use flint_router::{ConflictPolicy, RouteConflict, RouteMatch, Router};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{
        Application, ConflictPolicy, Context, Controller, Error, Method, MiddlewareStack,
        Operations, Request, Response, StatusCode, cors, handler_fn, logger, middleware_fn,
        recovery,
    };
    pub use serde::{Deserialize, Serialize};
}

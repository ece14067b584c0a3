//! Interceptor chain.
//!
//! A [`Middleware`] transforms one [`Handler`] into another of the same
//! shape. [`MiddlewareStack`] keeps an explicit ordered list and folds it
//! so the first layer pushed runs outermost: its pre-invocation logic
//! first, its post-invocation logic last. Built-in interceptors for
//! request logging, panic recovery and CORS live here as well.

use std::sync::Arc;
use std::time::Instant;

use crate::context::Context;
use crate::error::Error;
use crate::request::Method;
use crate::response::StatusCode;

/// The handling-function type every route resolves to.
pub type Handler = Arc<dyn Fn(&mut Context) -> Result<(), Error> + Send + Sync>;

/// A composable wrapper around a [`Handler`].
///
/// Interceptors may short-circuit by not invoking the wrapped handler;
/// they must not retain the [`Context`] beyond the call.
pub type Middleware = Arc<dyn Fn(Handler) -> Handler + Send + Sync>;

/// Wrap a closure as a [`Handler`].
pub fn handler_fn<F>(f: F) -> Handler
where
    F: Fn(&mut Context) -> Result<(), Error> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wrap a closure as a [`Middleware`].
pub fn middleware_fn<F>(f: F) -> Middleware
where
    F: Fn(Handler) -> Handler + Send + Sync + 'static,
{
    Arc::new(f)
}

/// An ordered list of interceptors.
#[derive(Clone, Default)]
pub struct MiddlewareStack {
    layers: Vec<Middleware>,
}

impl MiddlewareStack {
    /// Create an empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a layer. The first layer pushed ends up outermost.
    pub fn push(&mut self, layer: Middleware) {
        self.layers.push(layer);
    }

    /// Builder-style [`MiddlewareStack::push`].
    #[must_use]
    pub fn with(mut self, layer: Middleware) -> Self {
        self.layers.push(layer);
        self
    }

    /// Append all layers of another stack, preserving their order.
    pub fn extend(&mut self, other: &MiddlewareStack) {
        self.layers.extend(other.layers.iter().cloned());
    }

    /// The layers in application order (outermost first).
    #[must_use]
    pub fn layers(&self) -> &[Middleware] {
        &self.layers
    }

    /// Number of layers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// True when no layers are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Compose the stack around `handler`.
    ///
    /// Layers are folded right-to-left, so for layers `[a, b]` the
    /// result is `a(b(handler))`: `a` runs first on the way in and last
    /// on the way out, however many stacks are nested.
    #[must_use]
    pub fn apply(&self, handler: Handler) -> Handler {
        self.layers
            .iter()
            .rev()
            .fold(handler, |inner, layer| layer(inner))
    }
}

impl FromIterator<Middleware> for MiddlewareStack {
    fn from_iter<I: IntoIterator<Item = Middleware>>(iter: I) -> Self {
        Self {
            layers: iter.into_iter().collect(),
        }
    }
}

impl std::fmt::Debug for MiddlewareStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewareStack")
            .field("layers", &self.layers.len())
            .finish()
    }
}

/// Request-logging interceptor: method, path, latency and outcome.
#[must_use]
pub fn logger() -> Middleware {
    Arc::new(|next: Handler| -> Handler {
        Arc::new(move |ctx: &mut Context| {
            let start = Instant::now();
            let method = ctx.method();
            let path = ctx.path().to_owned();
            let result = next(&mut *ctx);
            match &result {
                Ok(()) => {
                    tracing::info!(%method, %path, elapsed = ?start.elapsed(), "request handled");
                }
                Err(err) => {
                    tracing::warn!(%method, %path, elapsed = ?start.elapsed(), error = %err, "request failed");
                }
            }
            result
        })
    })
}

/// Panic-recovery interceptor.
///
/// Catches an unwinding handler, logs the panic payload, and commits a
/// plain 500 when nothing was written yet. Install outermost; the core
/// itself never suppresses handler faults.
#[must_use]
pub fn recovery() -> Middleware {
    Arc::new(|next: Handler| -> Handler {
        Arc::new(move |ctx: &mut Context| {
            let outcome =
                std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| next(&mut *ctx)));
            match outcome {
                Ok(result) => result,
                Err(payload) => {
                    tracing::error!(reason = panic_message(&*payload), "handler panicked");
                    if !ctx.response_written() {
                        ctx.text(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")?;
                    }
                    Ok(())
                }
            }
        })
    })
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// Configuration for the CORS interceptor.
#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub allow_origins: Vec<String>,
    pub allow_methods: Vec<Method>,
    pub allow_headers: Vec<String>,
    pub expose_headers: Vec<String>,
    pub allow_credentials: bool,
    pub max_age: u32,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origins: vec!["*".to_owned()],
            allow_methods: vec![
                Method::Get,
                Method::Post,
                Method::Put,
                Method::Patch,
                Method::Delete,
                Method::Options,
            ],
            allow_headers: vec![
                "Origin".to_owned(),
                "Content-Type".to_owned(),
                "Accept".to_owned(),
                "Authorization".to_owned(),
            ],
            expose_headers: Vec::new(),
            allow_credentials: false,
            max_age: 86_400,
        }
    }
}

/// CORS interceptor with the default configuration.
#[must_use]
pub fn cors() -> Middleware {
    cors_with(CorsConfig::default())
}

/// CORS interceptor with an explicit configuration.
///
/// Non-matching origins pass through untouched; preflight `OPTIONS`
/// requests short-circuit with `204 No Content`.
#[must_use]
pub fn cors_with(config: CorsConfig) -> Middleware {
    let allow_methods = config
        .allow_methods
        .iter()
        .map(|m| m.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let allow_headers = config.allow_headers.join(", ");
    let expose_headers = config.expose_headers.join(", ");
    let max_age = config.max_age.to_string();
    let origins = config.allow_origins;
    let credentials = config.allow_credentials;

    Arc::new(move |next: Handler| -> Handler {
        let origins = origins.clone();
        let allow_methods = allow_methods.clone();
        let allow_headers = allow_headers.clone();
        let expose_headers = expose_headers.clone();
        let max_age = max_age.clone();
        Arc::new(move |ctx: &mut Context| {
            let origin = ctx.header("origin").unwrap_or("").to_owned();
            let allow_origin = origins.iter().find(|o| *o == "*" || **o == origin).cloned();

            let Some(allow_origin) = allow_origin else {
                return next(&mut *ctx);
            };

            ctx.set_header("Access-Control-Allow-Origin", allow_origin);
            if credentials {
                ctx.set_header("Access-Control-Allow-Credentials", "true");
            }
            if !expose_headers.is_empty() {
                ctx.set_header("Access-Control-Expose-Headers", expose_headers.clone());
            }

            if ctx.method() == Method::Options {
                ctx.set_header("Access-Control-Allow-Methods", allow_methods.clone());
                ctx.set_header("Access-Control-Allow-Headers", allow_headers.clone());
                ctx.set_header("Access-Control-Max-Age", max_age.clone());
                return ctx.no_content(StatusCode::NO_CONTENT);
            }

            next(&mut *ctx)
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextPool;
    use crate::request::Request;
    use parking_lot::Mutex;

    fn tag(label: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Middleware {
        let log = Arc::clone(log);
        Arc::new(move |next: Handler| -> Handler {
            let log = Arc::clone(&log);
            Arc::new(move |ctx: &mut Context| {
                log.lock().push(format!("{label}:pre"));
                let result = next(&mut *ctx);
                log.lock().push(format!("{label}:post"));
                result
            })
        })
    }

    #[test]
    fn first_layer_runs_outermost() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let stack: MiddlewareStack = [tag("a", &log), tag("b", &log)].into_iter().collect();
        assert_eq!(stack.len(), 2);

        let inner_log = Arc::clone(&log);
        let handler = handler_fn(move |_ctx| {
            inner_log.lock().push("handler".to_owned());
            Ok(())
        });

        let pool = ContextPool::new();
        let mut ctx = pool.acquire(Request::get("/"));
        stack.apply(handler)(&mut ctx).unwrap();

        assert_eq!(
            *log.lock(),
            vec!["a:pre", "b:pre", "handler", "b:post", "a:post"]
        );
    }

    #[test]
    fn nested_stacks_keep_outer_first() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let outer = MiddlewareStack::new().with(tag("global", &log));
        let unit = MiddlewareStack::new().with(tag("unit", &log));
        let operation = MiddlewareStack::new().with(tag("op", &log));

        let inner_log = Arc::clone(&log);
        let handler = handler_fn(move |_ctx| {
            inner_log.lock().push("handler".to_owned());
            Ok(())
        });

        let composed = outer.apply(unit.apply(operation.apply(handler)));
        let pool = ContextPool::new();
        let mut ctx = pool.acquire(Request::get("/"));
        composed(&mut ctx).unwrap();

        assert_eq!(
            *log.lock(),
            vec![
                "global:pre",
                "unit:pre",
                "op:pre",
                "handler",
                "op:post",
                "unit:post",
                "global:post",
            ]
        );
    }

    #[test]
    fn interceptor_can_short_circuit() {
        let reject = middleware_fn(|_next: Handler| {
            handler_fn(|ctx| ctx.text(StatusCode::UNAUTHORIZED, "denied"))
        });

        let handler = handler_fn(|_ctx| panic!("must not reach the handler"));
        let stack = MiddlewareStack::new().with(reject);

        let pool = ContextPool::new();
        let mut ctx = pool.acquire(Request::get("/secret"));
        stack.apply(handler)(&mut ctx).unwrap();

        let resp = ctx.take_response().unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(resp.text(), "denied");
    }

    #[test]
    fn recovery_turns_panic_into_500() {
        let handler = handler_fn(|_ctx| panic!("boom"));
        let composed = MiddlewareStack::new().with(recovery()).apply(handler);

        let pool = ContextPool::new();
        let mut ctx = pool.acquire(Request::get("/"));
        composed(&mut ctx).unwrap();

        assert!(ctx.response_written());
        let resp = ctx.take_response().unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(resp.text(), "Internal Server Error");
    }

    #[test]
    fn recovery_keeps_committed_response() {
        let handler = handler_fn(|ctx| {
            ctx.text(StatusCode::OK, "partial")?;
            panic!("after write");
        });
        let composed = MiddlewareStack::new().with(recovery()).apply(handler);

        let pool = ContextPool::new();
        let mut ctx = pool.acquire(Request::get("/"));
        composed(&mut ctx).unwrap();

        let resp = ctx.take_response().unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.text(), "partial");
    }

    #[test]
    fn cors_preflight_short_circuits() {
        let handler = handler_fn(|_ctx| panic!("preflight must not dispatch"));
        let composed = MiddlewareStack::new().with(cors()).apply(handler);

        let pool = ContextPool::new();
        let mut ctx = pool.acquire(
            Request::new(Method::Options, "/items").header("origin", "https://example.com"),
        );
        composed(&mut ctx).unwrap();

        let resp = ctx.take_response().unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert_eq!(resp.header_value("Access-Control-Allow-Origin"), Some("*"));
        assert!(resp.header_value("Access-Control-Allow-Methods").is_some());
    }

    #[test]
    fn cors_skips_unlisted_origins() {
        let config = CorsConfig {
            allow_origins: vec!["https://trusted.example".to_owned()],
            ..CorsConfig::default()
        };
        let handler = handler_fn(|ctx| ctx.text(StatusCode::OK, "ok"));
        let composed = MiddlewareStack::new().with(cors_with(config)).apply(handler);

        let pool = ContextPool::new();
        let mut ctx =
            pool.acquire(Request::get("/items").header("origin", "https://evil.example"));
        composed(&mut ctx).unwrap();

        let resp = ctx.take_response().unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.header_value("Access-Control-Allow-Origin"), None);
    }
}

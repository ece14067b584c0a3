//! Per-request context with pooled lifecycle.
//!
//! A [`Context`] is the shared vocabulary of a request: path parameters
//! bound by the router, lazily-parsed query values, a request-scoped typed
//! store, and the response under construction. Contexts are recycled
//! through a [`ContextPool`]; [`ContextPool::acquire`] hands out a
//! [`PooledContext`] guard that returns the slot on drop, on every exit
//! path including unwinds.

use std::any::Any;
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::path::Path;

use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::Error;
use crate::query::QueryString;
use crate::request::{Method, Request};
use crate::response::{Response, ResponseBody, StatusCode, mime_type_for_extension};

/// Mutable per-request state.
///
/// One instance is alive per in-flight request. All request data flows
/// through accessors here; handlers never see the transport directly.
#[derive(Default)]
pub struct Context {
    request: Option<Request>,
    params: Vec<(String, String)>,
    query: Option<Vec<(String, String)>>,
    form: Option<Vec<(String, String)>>,
    store: HashMap<String, Box<dyn Any + Send + Sync>>,
    response_headers: Vec<(String, String)>,
    response: Option<Response>,
    written: bool,
}

impl Context {
    /// Reset all request-scoped state, dropping any foreign references.
    ///
    /// Collections keep their capacity so a recycled slot does not
    /// reallocate on the next request.
    fn clear(&mut self) {
        self.request = None;
        self.params.clear();
        self.query = None;
        self.form = None;
        self.store.clear();
        self.response_headers.clear();
        self.response = None;
        self.written = false;
    }

    fn begin(&mut self, request: Request) {
        self.clear();
        self.request = Some(request);
    }

    fn request(&self) -> &Request {
        match &self.request {
            Some(request) => request,
            None => panic!("context used outside an active request"),
        }
    }

    // --- Input ---

    /// The request method.
    #[must_use]
    pub fn method(&self) -> Method {
        self.request().method()
    }

    /// The request path.
    #[must_use]
    pub fn path(&self) -> &str {
        self.request().path()
    }

    /// A request header value, matched case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.request().headers().get(name)
    }

    /// The raw request body.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        self.request().body_ref().as_bytes()
    }

    /// Decode the request body as JSON into `T`.
    pub fn bind<T: DeserializeOwned>(&self) -> Result<T, Error> {
        Ok(serde_json::from_slice(self.body())?)
    }

    /// A path parameter captured by the router, raw and undecoded.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// All captured path parameters in capture order.
    #[must_use]
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// Replace the captured parameter set. Called by the server façade
    /// after route resolution.
    pub fn set_params(&mut self, params: Vec<(String, String)>) {
        self.params = params;
    }

    /// The raw query string (empty if the request had none).
    #[must_use]
    pub fn query_string(&self) -> &str {
        self.request().query().unwrap_or("")
    }

    /// First decoded value for a query key.
    ///
    /// The query string is parsed on first access and cached for the
    /// rest of the request.
    pub fn query(&mut self, name: &str) -> Option<&str> {
        if self.query.is_none() {
            let pairs = {
                let raw = self.request().query().unwrap_or("");
                QueryString::parse(raw).decoded_pairs()
            };
            self.query = Some(pairs);
        }
        lookup(self.query.as_deref(), name)
    }

    /// Decoded query value, or `default` when absent or empty.
    pub fn query_default<'a>(&'a mut self, name: &str, default: &'a str) -> &'a str {
        match self.query(name) {
            Some(v) if !v.is_empty() => v,
            _ => default,
        }
    }

    /// First decoded value for a field of an urlencoded form body.
    ///
    /// Returns `None` unless the request carries an
    /// `application/x-www-form-urlencoded` content type.
    pub fn form(&mut self, name: &str) -> Option<&str> {
        if self.form.is_none() {
            let pairs = match self.header("content-type") {
                Some(ct) if ct.starts_with("application/x-www-form-urlencoded") => {
                    let body = String::from_utf8_lossy(self.request().body_ref().as_bytes());
                    QueryString::parse(&body).decoded_pairs()
                }
                _ => Vec::new(),
            };
            self.form = Some(pairs);
        }
        lookup(self.form.as_deref(), name)
    }

    // --- Request-scoped store ---

    /// Store a typed value under a string key for the rest of the request.
    pub fn set<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.store.insert(key.into(), Box::new(value));
    }

    /// Fetch a stored value, `None` if the key is absent or the type
    /// does not match.
    #[must_use]
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<&T> {
        self.store.get(key).and_then(|v| v.downcast_ref::<T>())
    }

    /// Mutable variant of [`Context::get`].
    pub fn get_mut<T: Any + Send + Sync>(&mut self, key: &str) -> Option<&mut T> {
        self.store.get_mut(key).and_then(|v| v.downcast_mut::<T>())
    }

    // --- Response ---

    /// Stage a response header, merged into the committed response.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.response_headers.push((name.into(), value.into()));
    }

    /// Whether a terminal response operation has run.
    #[must_use]
    pub fn response_written(&self) -> bool {
        self.written
    }

    fn commit(&mut self, mut response: Response) {
        for (name, value) in self.response_headers.drain(..) {
            response.insert_header(name, value);
        }
        self.response = Some(response);
        self.written = true;
    }

    /// Serialize `data` as JSON and commit it with the given status.
    pub fn json<T: Serialize>(&mut self, status: StatusCode, data: &T) -> Result<(), Error> {
        let body = serde_json::to_vec(data)?;
        self.commit(
            Response::new(status)
                .header("content-type", "application/json; charset=utf-8")
                .body(ResponseBody::Bytes(body)),
        );
        Ok(())
    }

    /// Commit a plain-text response.
    pub fn text(&mut self, status: StatusCode, body: impl Into<String>) -> Result<(), Error> {
        self.commit(
            Response::new(status)
                .header("content-type", "text/plain; charset=utf-8")
                .body(ResponseBody::Bytes(body.into().into_bytes())),
        );
        Ok(())
    }

    /// Commit an HTML response.
    pub fn html(&mut self, status: StatusCode, body: impl Into<String>) -> Result<(), Error> {
        self.commit(
            Response::new(status)
                .header("content-type", "text/html; charset=utf-8")
                .body(ResponseBody::Bytes(body.into().into_bytes())),
        );
        Ok(())
    }

    /// Commit a raw byte response with an explicit content type.
    pub fn bytes(
        &mut self,
        status: StatusCode,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<(), Error> {
        self.commit(
            Response::new(status)
                .header("content-type", content_type)
                .body(ResponseBody::Bytes(data)),
        );
        Ok(())
    }

    /// Commit a redirect to `location`.
    ///
    /// Codes outside the 300..=308 range are coerced to `302 Found`.
    pub fn redirect(&mut self, status: StatusCode, location: &str) -> Result<(), Error> {
        let status = if status.is_redirect() {
            status
        } else {
            StatusCode::FOUND
        };
        self.commit(Response::new(status).header("location", location));
        Ok(())
    }

    /// Commit a bodyless response with the given status.
    pub fn no_content(&mut self, status: StatusCode) -> Result<(), Error> {
        self.commit(Response::new(status));
        Ok(())
    }

    /// Read a file from disk and commit it, with the content type derived
    /// from the file extension.
    pub fn file(&mut self, path: impl AsRef<Path>) -> Result<(), Error> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        let mime = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or("application/octet-stream", mime_type_for_extension);
        self.commit(
            Response::new(StatusCode::OK)
                .header("content-type", mime)
                .body(ResponseBody::Bytes(data)),
        );
        Ok(())
    }

    /// Take the committed response out of the context, if any.
    pub fn take_response(&mut self) -> Option<Response> {
        self.response.take()
    }
}

fn lookup<'a>(pairs: Option<&'a [(String, String)]>, name: &str) -> Option<&'a str> {
    pairs?
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v.as_str())
}

/// A free-list of recycled [`Context`] slots.
///
/// Acquire/release are safe under concurrent use; no two in-flight
/// requests ever observe the same slot.
#[derive(Default)]
pub struct ContextPool {
    slots: Mutex<Vec<Context>>,
}

impl ContextPool {
    /// Create an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw a context for `request`, recycling a parked slot when one is
    /// available. Every mutable field is reset before the guard is
    /// returned.
    pub fn acquire(&self, request: Request) -> PooledContext<'_> {
        let mut ctx = self.slots.lock().pop().unwrap_or_default();
        ctx.begin(request);
        PooledContext {
            ctx: Some(ctx),
            pool: self,
        }
    }

    fn release(&self, mut ctx: Context) {
        ctx.clear();
        self.slots.lock().push(ctx);
    }

    #[cfg(test)]
    fn parked(&self) -> usize {
        self.slots.lock().len()
    }
}

/// Scoped handle to a pooled [`Context`].
///
/// Dropping the guard clears the context and parks it back in the pool,
/// so release happens exactly once per acquire even when a handler
/// panics.
pub struct PooledContext<'a> {
    ctx: Option<Context>,
    pool: &'a ContextPool,
}

impl Deref for PooledContext<'_> {
    type Target = Context;

    fn deref(&self) -> &Context {
        match &self.ctx {
            Some(ctx) => ctx,
            None => unreachable!("context present until drop"),
        }
    }
}

impl DerefMut for PooledContext<'_> {
    fn deref_mut(&mut self) -> &mut Context {
        match &mut self.ctx {
            Some(ctx) => ctx,
            None => unreachable!("context present until drop"),
        }
    }
}

impl Drop for PooledContext<'_> {
    fn drop(&mut self) {
        if let Some(ctx) = self.ctx.take() {
            self.pool.release(ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recycled_slot_starts_clean() {
        let pool = ContextPool::new();
        {
            let mut ctx = pool.acquire(Request::get("/items?page=3"));
            ctx.set_params(vec![("id".to_owned(), "42".to_owned())]);
            ctx.set("user", "alice".to_owned());
            ctx.text(StatusCode::OK, "done").unwrap();
            assert!(ctx.response_written());
        }
        assert_eq!(pool.parked(), 1);

        let mut ctx = pool.acquire(Request::get("/other"));
        assert!(ctx.params().is_empty());
        assert_eq!(ctx.param("id"), None);
        assert_eq!(ctx.get::<String>("user"), None);
        assert_eq!(ctx.query("page"), None);
        assert!(!ctx.response_written());
        assert!(ctx.take_response().is_none());
    }

    #[test]
    fn released_on_panic() {
        let pool = ContextPool::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ctx = pool.acquire(Request::get("/"));
            panic!("handler exploded");
        }));
        assert!(result.is_err());
        assert_eq!(pool.parked(), 1);
    }

    #[test]
    fn query_is_parsed_lazily_and_cached() {
        let pool = ContextPool::new();
        let mut ctx = pool.acquire(Request::get("/search?q=hello%20world&page="));
        assert_eq!(ctx.query("q"), Some("hello world"));
        assert_eq!(ctx.query("missing"), None);
        assert_eq!(ctx.query_default("page", "1"), "1");
        assert_eq!(ctx.query_default("q", "1"), "hello world");
        assert_eq!(ctx.query_string(), "q=hello%20world&page=");
    }

    #[test]
    fn form_requires_urlencoded_content_type() {
        let pool = ContextPool::new();
        let mut ctx = pool.acquire(
            Request::post("/login")
                .header("content-type", "application/x-www-form-urlencoded")
                .body(b"user=alice&pass=s3cret".to_vec()),
        );
        assert_eq!(ctx.form("user"), Some("alice"));
        assert_eq!(ctx.form("pass"), Some("s3cret"));

        let mut plain = pool.acquire(Request::post("/login").body(b"user=alice".to_vec()));
        assert_eq!(plain.form("user"), None);
    }

    #[test]
    fn typed_store_round_trip() {
        let pool = ContextPool::new();
        let mut ctx = pool.acquire(Request::get("/"));
        ctx.set("count", 3_u32);
        assert_eq!(ctx.get::<u32>("count"), Some(&3));
        assert_eq!(ctx.get::<String>("count"), None);
        if let Some(count) = ctx.get_mut::<u32>("count") {
            *count += 1;
        }
        assert_eq!(ctx.get::<u32>("count"), Some(&4));
    }

    #[test]
    fn bind_decodes_json_body() {
        #[derive(serde::Deserialize)]
        struct Input {
            name: String,
        }

        let pool = ContextPool::new();
        let ctx = pool.acquire(Request::post("/items").body(br#"{"name":"widget"}"#.to_vec()));
        let input: Input = ctx.bind().unwrap();
        assert_eq!(input.name, "widget");
        assert!(ctx.bind::<Input>().is_ok());

        let bad = pool.acquire(Request::post("/items").body(b"not json".to_vec()));
        assert!(bad.bind::<Input>().is_err());
    }

    #[test]
    fn json_response_sets_content_type() {
        let pool = ContextPool::new();
        let mut ctx = pool.acquire(Request::get("/"));
        ctx.json(StatusCode::CREATED, &serde_json::json!({"ok": true}))
            .unwrap();
        let resp = ctx.take_response().unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        assert_eq!(
            resp.header_value("content-type"),
            Some("application/json; charset=utf-8")
        );
        assert_eq!(resp.text(), r#"{"ok":true}"#);
    }

    #[test]
    fn staged_headers_merge_into_response() {
        let pool = ContextPool::new();
        let mut ctx = pool.acquire(Request::get("/"));
        ctx.set_header("x-request-id", "abc123");
        ctx.text(StatusCode::OK, "hi").unwrap();
        let resp = ctx.take_response().unwrap();
        assert_eq!(resp.header_value("x-request-id"), Some("abc123"));
    }

    #[test]
    fn redirect_clamps_invalid_codes() {
        let pool = ContextPool::new();
        let mut ctx = pool.acquire(Request::get("/old"));
        ctx.redirect(StatusCode::OK, "/new").unwrap();
        let resp = ctx.take_response().unwrap();
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(resp.header_value("location"), Some("/new"));

        ctx.redirect(StatusCode::MOVED_PERMANENTLY, "/next").unwrap();
        let resp = ctx.take_response().unwrap();
        assert_eq!(resp.status(), StatusCode::MOVED_PERMANENTLY);
    }

    #[test]
    fn no_content_has_empty_body() {
        let pool = ContextPool::new();
        let mut ctx = pool.acquire(Request::get("/"));
        ctx.no_content(StatusCode::NO_CONTENT).unwrap();
        let resp = ctx.take_response().unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert!(resp.body_ref().as_bytes().is_empty());
    }
}

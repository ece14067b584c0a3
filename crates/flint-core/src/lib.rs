//! Core types for the flint web framework.
//!
//! This crate provides the fundamental building blocks:
//! - [`Request`] and [`Response`] vocabulary types
//! - the pooled per-request [`Context`] and its [`ContextPool`]
//! - the [`Handler`]/[`Middleware`] interceptor chain
//! - query-string parsing and the shared [`Error`] type
//!
//! # Design Principles
//!
//! - Two phases: single-threaded registration, concurrent read-only serving
//! - Minimal per-request allocation (contexts recycle through a pool)
//! - No blocking I/O inside the core; collaborators block, the core does not
//! - All shared types are `Send + Sync`

#![forbid(unsafe_code)]

mod context;
mod error;
mod middleware;
mod query;
mod request;
mod response;

pub use context::{Context, ContextPool, PooledContext};
pub use error::Error;
pub use middleware::{
    CorsConfig, Handler, Middleware, MiddlewareStack, cors, cors_with, handler_fn, logger,
    middleware_fn, recovery,
};
pub use query::{Pairs, QueryString, percent_decode};
pub use request::{Body, Headers, InvalidMethod, Method, Request};
pub use response::{Response, ResponseBody, StatusCode, mime_type_for_extension};

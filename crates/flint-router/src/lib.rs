//! Trie-based HTTP router for the flint framework.
//!
//! One radix tree per HTTP method over `/`-delimited segments, with a
//! fixed precedence at every node: exact literal, then the single named
//! parameter child, then a trailing wildcard. Lookup cost is linear in
//! the number of path segments, independent of how many sibling routes
//! are registered.

#![forbid(unsafe_code)]

mod router;
mod trie;

pub use router::{ConflictPolicy, RouteConflict, RouteMatch, Router};

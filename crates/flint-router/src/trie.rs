//! Radix tree over path segments.
//!
//! One tree exists per HTTP method. Nodes are literal, parameter or
//! wildcard children; search precedence at every node is literal, then
//! parameter, then wildcard, with backtracking when a deeper branch has
//! no bound handler.

use flint_core::Handler;
use memchr::memchr;

use crate::router::ConflictPolicy;

/// Marker returned when a bind would displace an existing handler under
/// [`ConflictPolicy::Reject`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Occupied;

#[derive(Debug, Clone, PartialEq, Eq)]
enum NodeKind {
    /// Matches a segment by exact text.
    Literal(String),
    /// Matches any single segment, binding it under `name`.
    Param { name: String },
    /// Matches the entire remaining path, binding it under `name`.
    Wildcard { name: String },
}

struct Node {
    kind: NodeKind,
    children: Vec<Node>,
    handler: Option<Handler>,
}

impl Node {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            children: Vec::new(),
            handler: None,
        }
    }

    fn insert(
        &mut self,
        pattern: &str,
        handler: Handler,
        policy: ConflictPolicy,
    ) -> Result<bool, Occupied> {
        let (segment, rest) = split_segment(pattern);

        if let Some(name) = segment.strip_prefix(':') {
            // At most one parameter child per node. A second insert with a
            // different name reuses the child and keeps the first name.
            let idx = match self
                .children
                .iter()
                .position(|c| matches!(c.kind, NodeKind::Param { .. }))
            {
                Some(idx) => idx,
                None => {
                    self.children.push(Node::new(NodeKind::Param {
                        name: name.to_owned(),
                    }));
                    self.children.len() - 1
                }
            };
            let child = &mut self.children[idx];
            return if rest.is_empty() {
                bind(&mut child.handler, handler, policy)
            } else {
                child.insert(rest, handler, policy)
            };
        }

        if let Some(name) = segment.strip_prefix('*') {
            // Wildcards terminate the pattern; anything after the segment
            // is never descended into.
            let idx = match self
                .children
                .iter()
                .position(|c| matches!(c.kind, NodeKind::Wildcard { .. }))
            {
                Some(idx) => idx,
                None => {
                    self.children.push(Node::new(NodeKind::Wildcard {
                        name: name.to_owned(),
                    }));
                    self.children.len() - 1
                }
            };
            return bind(&mut self.children[idx].handler, handler, policy);
        }

        let idx = match self
            .children
            .iter()
            .position(|c| matches!(&c.kind, NodeKind::Literal(text) if text == segment))
        {
            Some(idx) => idx,
            None => {
                self.children
                    .push(Node::new(NodeKind::Literal(segment.to_owned())));
                self.children.len() - 1
            }
        };
        let child = &mut self.children[idx];
        if rest.is_empty() {
            bind(&mut child.handler, handler, policy)
        } else {
            child.insert(rest, handler, policy)
        }
    }

    fn search<'t>(&'t self, path: &str, params: &mut Vec<(String, String)>) -> Option<&'t Handler> {
        let (segment, rest) = split_segment(path);

        for child in &self.children {
            if matches!(&child.kind, NodeKind::Literal(text) if text == segment) {
                if rest.is_empty() {
                    if let Some(handler) = &child.handler {
                        return Some(handler);
                    }
                } else if let Some(handler) = child.search(rest, params) {
                    return Some(handler);
                }
            }
        }

        for child in &self.children {
            if let NodeKind::Param { name } = &child.kind {
                let mark = params.len();
                params.push((name.clone(), segment.to_owned()));
                if rest.is_empty() {
                    if let Some(handler) = &child.handler {
                        return Some(handler);
                    }
                } else if let Some(handler) = child.search(rest, params) {
                    return Some(handler);
                }
                // Backtrack: drop the tentative binding before trying the
                // next-priority branch.
                params.truncate(mark);
            }
        }

        for child in &self.children {
            if let NodeKind::Wildcard { name } = &child.kind {
                params.push((name.clone(), path.to_owned()));
                return child.handler.as_ref();
            }
        }

        None
    }
}

/// A per-method route tree.
pub struct Tree {
    root: Node,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    /// Create an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: Node::new(NodeKind::Literal(String::new())),
        }
    }

    /// Register `handler` under `pattern`.
    ///
    /// An empty pattern or `/` binds the root. Returns `Ok(true)` when an
    /// earlier registration was displaced, `Err` when the policy rejects
    /// the displacement.
    pub(crate) fn insert(
        &mut self,
        pattern: &str,
        handler: Handler,
        policy: ConflictPolicy,
    ) -> Result<bool, Occupied> {
        let pattern = pattern.strip_prefix('/').unwrap_or(pattern);
        if pattern.is_empty() {
            return bind(&mut self.root.handler, handler, policy);
        }
        self.root.insert(pattern, handler, policy)
    }

    /// Resolve `path` to a handler and its captured parameters.
    ///
    /// Parameter values are raw path segments; a wildcard captures the
    /// entire remaining path including embedded slashes.
    #[must_use]
    pub fn search(&self, path: &str) -> Option<(&Handler, Vec<(String, String)>)> {
        let path = path.strip_prefix('/').unwrap_or(path);
        let mut params = Vec::new();
        if path.is_empty() {
            return self.root.handler.as_ref().map(|h| (h, params));
        }
        let handler = self.root.search(path, &mut params)?;
        Some((handler, params))
    }
}

fn bind(slot: &mut Option<Handler>, handler: Handler, policy: ConflictPolicy) -> Result<bool, Occupied> {
    let occupied = slot.is_some();
    if occupied && policy == ConflictPolicy::Reject {
        return Err(Occupied);
    }
    *slot = Some(handler);
    Ok(occupied)
}

fn split_segment(path: &str) -> (&str, &str) {
    match memchr(b'/', path.as_bytes()) {
        Some(i) => (&path[..i], &path[i + 1..]),
        None => (path, ""),
    }
}

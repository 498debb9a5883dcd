//! Declarative route trees.
//!
//! A tree is made of three kinds of node: endpoints, middleware insertions
//! and groups. Groups nest; a group's prefix is prepended to everything
//! beneath it. Sibling order matters: middleware covers only the siblings
//! that come *after* it, and for identical method + path the first
//! registration wins.
//!
//! ```rust
//! use apibase::{health, resp, Context, Dispatch, Endpoint, Group, Next, Request, Router};
//!
//! async fn list(_: Context) -> Result<apibase::Success, apibase::Error> {
//!     resp(200, "ok", serde_json::json!({ "projects": [] }))
//! }
//!
//! async fn audit(req: Request, next: Next) -> Dispatch {
//!     next.run(req).await
//! }
//!
//! let root = Group::new("/api")
//!     .get("/health", health::endpoint())          // no audit
//!     .layer(audit)
//!     .nest(Group::new("/projects").get("/", Endpoint::new(list)));  // audited
//!
//! let router = Router::compile(root).unwrap();
//! # let _ = router;
//! ```

use std::fmt;

use crate::method::Method;
use crate::middleware::{BoxedMiddleware, Middleware};
use crate::pipeline::Endpoint;

/// One node of a route tree.
pub enum RouteNode {
    Endpoint { method: Method, path: String, endpoint: Endpoint },
    /// Applies, in order, to every later sibling (and their descendants).
    Middleware(Vec<BoxedMiddleware>),
    Group(Group),
}

impl fmt::Debug for RouteNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Endpoint { method, path, .. } => write!(f, "Endpoint({method} {path})"),
            Self::Middleware(list) => write!(f, "Middleware(x{})", list.len()),
            Self::Group(group) => fmt::Debug::fmt(group, f),
        }
    }
}

impl From<Group> for RouteNode {
    fn from(group: Group) -> Self {
        Self::Group(group)
    }
}

/// A path prefix over an ordered list of children.
#[derive(Debug)]
pub struct Group {
    pub(crate) prefix: String,
    pub(crate) children: Vec<RouteNode>,
}

impl Group {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into(), children: Vec::new() }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn children(&self) -> &[RouteNode] {
        &self.children
    }

    pub fn child(mut self, node: impl Into<RouteNode>) -> Self {
        self.children.push(node.into());
        self
    }

    /// Registers an endpoint. Path params use `{name}` or `:name`.
    pub fn route(self, method: Method, path: impl Into<String>, endpoint: Endpoint) -> Self {
        self.child(RouteNode::Endpoint { method, path: path.into(), endpoint })
    }

    pub fn get(self, path: impl Into<String>, endpoint: Endpoint) -> Self {
        self.route(Method::Get, path, endpoint)
    }

    pub fn post(self, path: impl Into<String>, endpoint: Endpoint) -> Self {
        self.route(Method::Post, path, endpoint)
    }

    pub fn put(self, path: impl Into<String>, endpoint: Endpoint) -> Self {
        self.route(Method::Put, path, endpoint)
    }

    pub fn patch(self, path: impl Into<String>, endpoint: Endpoint) -> Self {
        self.route(Method::Patch, path, endpoint)
    }

    pub fn delete(self, path: impl Into<String>, endpoint: Endpoint) -> Self {
        self.route(Method::Delete, path, endpoint)
    }

    /// Inserts one middleware at this point in the sibling order.
    pub fn layer(self, middleware: impl Middleware) -> Self {
        self.child(RouteNode::Middleware(vec![middleware.into_boxed_middleware()]))
    }

    pub fn nest(self, group: Group) -> Self {
        self.child(group)
    }
}

// ── Free-function constructors ───────────────────────────────────────────────

pub fn endpoint(method: Method, path: impl Into<String>, endpoint: Endpoint) -> RouteNode {
    RouteNode::Endpoint { method, path: path.into(), endpoint }
}

/// A middleware node for [`group`] children; see [`crate::from_fn`].
pub fn layers(list: impl IntoIterator<Item = BoxedMiddleware>) -> RouteNode {
    RouteNode::Middleware(list.into_iter().collect())
}

pub fn group(prefix: impl Into<String>, children: impl IntoIterator<Item = RouteNode>) -> Group {
    Group { prefix: prefix.into(), children: children.into_iter().collect() }
}

//! Route tree compiler and request dispatch.
//!
//! [`Router::compile`] walks a [`Group`] depth-first once, at startup, and
//! flattens it into an arena of routes plus one radix tree per HTTP method
//! (O(path-length) lookup via [`matchit`]). Each route carries a snapshot of
//! the middleware that was in scope when it was registered. Nothing about the
//! compiled router changes afterwards.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use bytes::{Buf, Bytes};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use matchit::Router as MatchitRouter;
use tracing::warn;

use crate::body::{self, BodyOptions};
use crate::config::Config;
use crate::envelope::{Dispatch, Failure, Fault};
use crate::error::Error;
use crate::method::Method;
use crate::middleware::{convention, trace, BoxedMiddleware, Next};
use crate::pipeline::Endpoint;
use crate::request::Request;
use crate::route::{Group, RouteNode};
use crate::validate::FieldError;

struct Route {
    method: Method,
    path: String,
    endpoint: Arc<Endpoint>,
    middleware: Arc<[BoxedMiddleware]>,
}

/// The compiled, immutable route set. Build it once; share it across
/// connections behind an `Arc` (see [`Server::serve`](crate::Server::serve)).
pub struct Router {
    routes: Vec<Route>,
    trees: HashMap<Method, MatchitRouter<usize>>,
    body: BodyOptions,
}

impl Router {
    /// Compiles a route tree.
    ///
    /// Fails with [`Error::InvalidRoute`] when two different paths cannot
    /// coexist (e.g. `/users/{id}` and `/users/{name}`). Registering the exact
    /// same method and path twice keeps the first.
    pub fn compile(root: Group) -> Result<Self, Error> {
        let mut compiler = Compiler::default();
        compiler.group(root, "")?;
        Ok(Self { routes: compiler.routes, trees: compiler.trees, body: BodyOptions::default() })
    }

    /// Spools uploaded files into `dir` instead of holding them in memory.
    pub fn with_upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.body.upload_dir = Some(dir.into());
        self
    }

    /// Requests with larger bodies are rejected with 413.
    pub fn with_max_body_bytes(mut self, max: usize) -> Self {
        self.body.max_bytes = max;
        self
    }

    /// Applies the upload directory and body limit from `config`.
    pub fn configure(mut self, config: &Config) -> Self {
        self.body.max_bytes = config.max_body_bytes;
        self.body.upload_dir.clone_from(&config.upload_dir);
        self
    }

    /// Registered routes in registration order.
    pub fn routes(&self) -> impl Iterator<Item = (Method, &str)> {
        self.routes.iter().map(|r| (r.method, r.path.as_str()))
    }

    /// Raw (still percent-encoded) params, in path order.
    fn lookup(&self, method: Method, path: &str) -> Option<(&Route, Vec<(String, String)>)> {
        let matched = self.trees.get(&method)?.at(path).ok()?;
        let route = &self.routes[*matched.value];
        let params = matched.params.iter().map(|(k, v)| (k.to_owned(), v.to_owned())).collect();
        Some((route, params))
    }

    /// [`lookup`](Self::lookup), ignoring one trailing slash. HEAD falls back
    /// to the GET route when no HEAD route is registered.
    fn resolve(&self, method: Method, path: &str) -> Option<(&Route, Vec<(String, String)>)> {
        let trimmed = path.strip_suffix('/').filter(|p| !p.is_empty());
        let find = move |method: Method| {
            self.lookup(method, path).or_else(|| trimmed.and_then(|p| self.lookup(method, p)))
        };
        find(method).or_else(|| if method == Method::Head { find(Method::Get) } else { None })
    }

    /// Handles one request end to end: match, decode, middleware, pipeline,
    /// then the convention layer. Never fails; every outcome is a response.
    pub async fn handle<B>(&self, req: http::Request<B>) -> http::Response<Full<Bytes>>
    where
        B: hyper::body::Body,
        B::Data: Buf,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let (parts, body) = req.into_parts();
        let method = parts.method.clone();
        let path = parts.uri.path().to_owned();
        trace::log_request(&method, &path, convention::apply(self.dispatch(parts, body)))
            .await
            .into_inner()
    }

    /// `None` when no route matches.
    async fn dispatch<B>(&self, parts: http::request::Parts, body: B) -> Option<Dispatch>
    where
        B: hyper::body::Body,
        B::Data: Buf,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let method = Method::from_http(&parts.method)?;
        let (route, params) = self.resolve(method, parts.uri.path())?;
        Some(self.run(route, method, params, parts, body).await)
    }

    async fn run<B>(
        &self,
        route: &Route,
        method: Method,
        params: Vec<(String, String)>,
        parts: http::request::Parts,
        body: B,
    ) -> Dispatch
    where
        B: hyper::body::Body,
        B::Data: Buf,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let bytes = match Limited::new(body, self.body.max_bytes).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) if e.is::<LengthLimitError>() => {
                let detail = format!("Request body exceeds {} bytes", self.body.max_bytes);
                let errors = vec![FieldError::new("too_big", &[], detail)];
                return Err(Failure::client(413, "Request body too large", errors).into());
            }
            Err(e) => {
                return Err(Fault::Unexpected(anyhow::anyhow!("failed to read request body: {e}")));
            }
        };

        let decoded = body::decode_body(&parts.headers, bytes, &self.body).await?;
        let query = body::decode_query(parts.uri.query())?;
        let params = body::decode_params(params)?;

        let mut req = Request::new(method, parts.uri.path().to_owned(), parts.headers);
        req.params = params;
        req.query = query;
        req.body = decoded.body;
        req.files = decoded.files;
        req.temp_files = decoded.temp_files;
        req.extensions = parts.extensions;

        Next::new(Arc::clone(&route.middleware), Arc::clone(&route.endpoint)).run(req).await
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.routes.iter().map(|r| format!("{} {}", r.method, r.path)))
            .finish()
    }
}

// ── Compilation ──────────────────────────────────────────────────────────────

#[derive(Default)]
struct Compiler {
    routes: Vec<Route>,
    trees: HashMap<Method, MatchitRouter<usize>>,
    /// Middleware in scope at the current point of the walk.
    active: Vec<BoxedMiddleware>,
}

impl Compiler {
    fn group(&mut self, group: Group, base: &str) -> Result<(), Error> {
        let prefix = join(base, &group.prefix);
        let depth = self.active.len();
        for child in group.children {
            match child {
                RouteNode::Endpoint { method, path, endpoint } => {
                    self.endpoint(method, join(&prefix, &path), endpoint)?;
                }
                RouteNode::Middleware(list) => self.active.extend(list),
                RouteNode::Group(nested) => self.group(nested, &prefix)?,
            }
        }
        // Middleware inserted inside this group goes out of scope with it.
        self.active.truncate(depth);
        Ok(())
    }

    fn endpoint(&mut self, method: Method, path: String, endpoint: Endpoint) -> Result<(), Error> {
        let path = matchit_syntax(&path);
        let index = self.routes.len();
        match self.trees.entry(method).or_default().insert(path.clone(), index) {
            Ok(()) => {
                self.routes.push(Route {
                    method,
                    path,
                    endpoint: Arc::new(endpoint),
                    middleware: self.active.clone().into(),
                });
                Ok(())
            }
            Err(matchit::InsertError::Conflict { with, .. }) if with == path => {
                warn!(%method, %path, "duplicate route ignored; the first registration wins");
                Ok(())
            }
            Err(source) => Err(Error::InvalidRoute { path, source }),
        }
    }
}

/// `join("/api", "/health") == "/api/health"`; always absolute, no doubled slashes.
fn join(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    let joined = match (prefix.is_empty(), path.is_empty()) {
        (true, true) => return "/".to_owned(),
        (_, true) => prefix.to_owned(),
        (true, false) => path.to_owned(),
        (false, false) => format!("{prefix}/{path}"),
    };
    if joined.starts_with('/') { joined } else { format!("/{joined}") }
}

/// `/users/:id` → `/users/{id}`.
fn matchit_syntax(path: &str) -> String {
    path.split('/')
        .map(|segment| match segment.strip_prefix(':') {
            Some(name) => format!("{{{name}}}"),
            None => segment.to_owned(),
        })
        .collect::<Vec<_>>()
        .join("/")
}

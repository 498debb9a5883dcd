//! Middleware layer.
//!
//! Middleware intercepts a matched request before its endpoint runs and is the
//! right place for cross-cutting concerns such as authentication gating or
//! request-scoped state. A middleware is any async function of this shape:
//!
//! ```rust
//! use apibase::{err, Dispatch, Fault, Next, Request};
//!
//! async fn require_token(req: Request, next: Next) -> Dispatch {
//!     if req.header("authorization").is_none() {
//!         return Err(Fault::Failure(err(401, "Unauthorized", ())?));
//!     }
//!     next.run(req).await
//! }
//! ```
//!
//! Middleware is inserted into a route tree with
//! [`Group::layer`](crate::Group::layer) and applies to every route registered
//! after it in the same group, nested groups included.
//!
//! Two built-in layers always wrap the whole dispatch, outside any
//! middleware: the convention layer renders every outcome into the wire
//! envelope, and a trace layer emits one `info` event per request.

pub(crate) mod convention;
pub(crate) mod trace;

use std::future::Future;
use std::sync::Arc;

use crate::envelope::Dispatch;
use crate::handler::BoxFuture;
use crate::pipeline::Endpoint;
use crate::request::Request;

/// Internal dispatch interface, see [`crate::handler::ErasedHandler`].
#[doc(hidden)]
pub trait ErasedMiddleware {
    fn call(&self, req: Request, next: Next) -> BoxFuture<Dispatch>;
}

/// A type-erased middleware, cheap to clone into every route it covers.
pub type BoxedMiddleware = Arc<dyn ErasedMiddleware + Send + Sync + 'static>;

/// Implemented for every valid middleware function:
///
/// ```text
/// async fn name(req: Request, next: Next) -> Dispatch
/// ```
///
/// Sealed, like [`Handler`](crate::Handler).
pub trait Middleware: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_middleware(self) -> BoxedMiddleware;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut> private::Sealed for F
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Dispatch> + Send + 'static,
{
}

impl<F, Fut> Middleware for F
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Dispatch> + Send + 'static,
{
    fn into_boxed_middleware(self) -> BoxedMiddleware {
        Arc::new(FnMiddleware(self))
    }
}

struct FnMiddleware<F>(F);

impl<F, Fut> ErasedMiddleware for FnMiddleware<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync,
    Fut: Future<Output = Dispatch> + Send + 'static,
{
    fn call(&self, req: Request, next: Next) -> BoxFuture<Dispatch> {
        Box::pin((self.0)(req, next))
    }
}

/// Boxes a middleware function for use in
/// [`RouteNode::Middleware`](crate::RouteNode::Middleware).
pub fn from_fn(middleware: impl Middleware) -> BoxedMiddleware {
    middleware.into_boxed_middleware()
}

/// The rest of the chain: remaining middleware, then the endpoint's pipeline.
pub struct Next {
    chain: Arc<[BoxedMiddleware]>,
    index: usize,
    endpoint: Arc<Endpoint>,
}

impl Next {
    pub(crate) fn new(chain: Arc<[BoxedMiddleware]>, endpoint: Arc<Endpoint>) -> Self {
        Self { chain, index: 0, endpoint }
    }

    /// Passes the request on and resolves to whatever the rest of the chain produced.
    pub async fn run(self, req: Request) -> Dispatch {
        match self.chain.get(self.index).cloned() {
            Some(middleware) => {
                let next = Self { index: self.index + 1, ..self };
                middleware.call(req, next).await
            }
            None => self.endpoint.call(req).await,
        }
    }
}

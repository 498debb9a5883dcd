//! Handler trait, type erasure, and the context handlers receive.
//!
//! # How async handlers are stored
//!
//! Every endpoint owns a handler of a *different* concrete type, yet the
//! compiled router stores them side by side. We hide the concrete type behind
//! a trait object (`dyn ErasedHandler`) so they can live in one collection.
//!
//! ```text
//! async fn create(ctx: Context) -> Result<Success, Error> { … }   ← user writes this
//!        ↓ Endpoint::new(create)
//! create.into_boxed_handler()                        ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(create))                        ← heap-allocated wrapper
//!        ↓  stored as BoxedHandler = Arc<dyn ErasedHandler>
//! handler.call(ctx)  at request time                 ← one vtable dispatch
//!        ↓
//! Box::pin(async { create(ctx).await.into_outcome() })
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use http::{Extensions, HeaderMap};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::envelope::{IntoOutcome, Outcome};
use crate::error::Error;
use crate::file::UploadedFile;

// ── Context ──────────────────────────────────────────────────────────────────

/// Everything a handler may read. `params`, `query` and `body` have already
/// passed their declared shapes; files are grouped by declared field name.
#[derive(Debug)]
pub struct Context {
    pub(crate) params: Value,
    pub(crate) query: Value,
    pub(crate) body: Value,
    pub(crate) files: HashMap<String, Vec<UploadedFile>>,
    pub(crate) headers: HeaderMap,
    pub(crate) extensions: Extensions,
}

fn extract<T: DeserializeOwned>(which: &'static str, value: &Value) -> Result<T, Error> {
    T::deserialize(value).map_err(|source| Error::Extract { which, source })
}

impl Context {
    /// Deserialises the validated path params.
    pub fn params<T: DeserializeOwned>(&self) -> Result<T, Error> {
        extract("params", &self.params)
    }

    /// Deserialises the validated query params.
    pub fn query<T: DeserializeOwned>(&self) -> Result<T, Error> {
        extract("query", &self.query)
    }

    /// Deserialises the validated body.
    pub fn body<T: DeserializeOwned>(&self) -> Result<T, Error> {
        extract("body", &self.body)
    }

    pub fn raw_params(&self) -> &Value { &self.params }
    pub fn raw_query(&self) -> &Value { &self.query }
    pub fn raw_body(&self) -> &Value { &self.body }

    /// Files uploaded under a declared field; empty for undeclared names.
    pub fn files(&self, field: &str) -> &[UploadedFile] {
        self.files.get(field).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn headers(&self) -> &HeaderMap { &self.headers }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// A value a middleware stored on the request, e.g. the authenticated user.
    pub fn extension<T: Clone + Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions.get::<T>()
    }
}

// ── Internal types ───────────────────────────────────────────────────────────

/// A heap-allocated, type-erased future.
///
/// `Pin<Box<…>>` because the runtime polls it in place; `Send + 'static` so
/// tokio may move it across worker threads.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// return type of the public `Handler` trait's `into_boxed_handler` method.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, ctx: Context) -> BoxFuture<Result<Outcome, anyhow::Error>>;
}

/// A type-erased handler shared across concurrent requests.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

// ── Public Handler trait ─────────────────────────────────────────────────────

/// Implemented for every valid endpoint handler.
///
/// You never implement this yourself. It is satisfied by any `async fn` (or
/// closure returning a future) with the signature:
///
/// ```text
/// async fn name(ctx: Context) -> impl IntoOutcome
/// ```
///
/// The trait is sealed: only the blanket impl below can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

/// Bridges a concrete handler `F` to the trait-object world.
struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Context) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + Send + 'static,
{
    fn call(&self, ctx: Context) -> BoxFuture<Result<Outcome, anyhow::Error>> {
        let fut = (self.0)(ctx);
        Box::pin(async move { fut.await.into_outcome() })
    }
}

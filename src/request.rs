//! Incoming request, after the transport has decoded it.

use std::collections::HashMap;

use http::{Extensions, HeaderMap};
use serde_json::Value;

use crate::file::{TempFiles, UploadedFile};
use crate::method::Method;

/// A matched request as middleware sees it: path params from the router,
/// query and body decoded but not yet validated, uploads extracted.
#[derive(Debug)]
pub struct Request {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) headers: HeaderMap,
    pub(crate) params: HashMap<String, String>,
    pub(crate) query: Value,
    pub(crate) body: Value,
    pub(crate) files: Vec<UploadedFile>,
    pub(crate) temp_files: TempFiles,
    pub(crate) extensions: Extensions,
}

impl Request {
    pub(crate) fn new(method: Method, path: String, headers: HeaderMap) -> Self {
        Self {
            method,
            path,
            headers,
            params: HashMap::new(),
            query: Value::Object(Default::default()),
            body: Value::Object(Default::default()),
            files: Vec::new(),
            temp_files: TempFiles::default(),
            extensions: Extensions::new(),
        }
    }

    pub fn method(&self) -> Method { self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn headers_mut(&mut self) -> &mut HeaderMap { &mut self.headers }
    pub fn query(&self) -> &Value { &self.query }
    pub fn body(&self) -> &Value { &self.body }
    pub fn files(&self) -> &[UploadedFile] { &self.files }

    /// Header lookup; `None` when absent or not visible ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Per-request values middleware hands down to the handler.
    pub fn extensions(&self) -> &Extensions { &self.extensions }
    pub fn extensions_mut(&mut self) -> &mut Extensions { &mut self.extensions }
}

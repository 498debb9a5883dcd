//! Endpoint declarations and the per-request validation pipeline.
//!
//! An [`Endpoint`] pairs a handler with the shapes of everything it reads and
//! writes. At request time it runs a fixed sequence, stopping at the first
//! step that fails:
//!
//! | # | Step | Failure |
//! |---|------|---------|
//! | 1 | body against the body shape (unknown keys stripped) | 400 `Invalid request body` |
//! | 2 | uploads against each declared file field | 400 `Invalid file fields` |
//! | 3 | path params against the params shape (unknown keys rejected) | 400 `Invalid URL params` |
//! | 4 | query against the query shape (unknown keys stripped) | 400 `Invalid query params` |
//! | 5 | invoke the handler | handler error → 500 |
//! | 6 | success data / failure data against their declared shapes | mismatch → 500 |
//! | 7 | delete disk-backed uploads | logged only |
//!
//! Validation failures are returned as [`Failure`] values. Everything past
//! step 5 that goes wrong is a bug in the endpoint, so it becomes
//! [`Fault::Unexpected`] and never reaches the client in detail.

use std::collections::HashMap;

use serde_json::{Map, Value};
use tracing::debug;

use crate::envelope::{Dispatch, Failure, Fault, Outcome};
use crate::error::Error;
use crate::file::{FileField, UploadedFile};
use crate::handler::{BoxedHandler, Context, Handler};
use crate::request::Request;
use crate::shape::{ObjectShape, Shape};
use crate::validate::{validate, Invalid};

/// An immutable endpoint declaration: input shapes, output shapes, handler.
///
/// Every shape defaults to an empty object, so an endpoint that declares no
/// params rejects any path parameter and sees an empty body.
///
/// ```rust
/// use apibase::{resp, shape, Context, Endpoint, Error, Success};
///
/// async fn rename(ctx: Context) -> Result<Success, Error> {
///     #[derive(serde::Deserialize)]
///     struct Body { name: String }
///     let body: Body = ctx.body()?;
///     resp(200, "ok", serde_json::json!({ "name": body.name }))
/// }
///
/// let endpoint = Endpoint::new(rename)
///     .params(shape::object().field("id", shape::string()))
///     .body(shape::object().field("name", shape::string().min(1)))
///     .success(shape::object().field("name", shape::string()));
/// # let _ = endpoint;
/// ```
pub struct Endpoint {
    params: Shape,
    query: Shape,
    body: Shape,
    files: Vec<(String, FileField)>,
    success: Shape,
    failure: Shape,
    handler: BoxedHandler,
}

impl Endpoint {
    pub fn new(handler: impl Handler) -> Self {
        Self {
            params: ObjectShape::default().strict().into(),
            query: ObjectShape::default().into(),
            body: ObjectShape::default().into(),
            files: Vec::new(),
            success: ObjectShape::default().into(),
            failure: ObjectShape::default().strict().into(),
            handler: handler.into_boxed_handler(),
        }
    }

    /// Path params. Always validated strictly: undeclared params are rejected.
    pub fn params(mut self, shape: ObjectShape) -> Self {
        self.params = shape.strict().into();
        self
    }

    /// Query params. Undeclared keys are dropped unless the shape says otherwise.
    pub fn query(mut self, shape: ObjectShape) -> Self {
        self.query = shape.into();
        self
    }

    /// Request body. Undeclared keys are dropped unless the shape says otherwise.
    pub fn body(mut self, shape: ObjectShape) -> Self {
        self.body = shape.into();
        self
    }

    /// Declares a file field accepting up to `max_count` uploads.
    pub fn file(self, name: impl Into<String>, max_count: usize) -> Self {
        self.file_field(name, FileField::up_to(max_count))
    }

    pub fn file_field(mut self, name: impl Into<String>, field: FileField) -> Self {
        let name = name.into();
        self.files.retain(|(n, _)| *n != name);
        self.files.push((name, field));
        self
    }

    /// Shape of the data in the handler's [`Success`](crate::Success).
    pub fn success(mut self, shape: ObjectShape) -> Self {
        self.success = shape.into();
        self
    }

    /// Shape of the data in the handler's [`Failure`]. Always strict.
    pub fn failure(mut self, shape: ObjectShape) -> Self {
        self.failure = shape.strict().into();
        self
    }

    /// Runs the full pipeline for one request.
    pub(crate) async fn call(&self, req: Request) -> Dispatch {
        let Request { params, query, body, files, temp_files, headers, extensions, .. } = req;

        let result = match self.check_inputs(params, query, body, files) {
            Ok((params, query, body, files)) => {
                let ctx = Context { params, query, body, files, headers, extensions };
                self.invoke(ctx).await
            }
            Err(failure) => {
                debug!(status = failure.status(), message = failure.message(), "request rejected");
                Err(Fault::Failure(failure))
            }
        };

        if !temp_files.is_empty() {
            temp_files.remove_all().await;
        }
        result
    }

    /// Steps 1-4. Order is fixed: body, files, params, query.
    fn check_inputs(
        &self,
        params: HashMap<String, String>,
        query: Value,
        body: Value,
        files: Vec<UploadedFile>,
    ) -> Result<(Value, Value, Value, HashMap<String, Vec<UploadedFile>>), Failure> {
        let body = validate(&self.body, &body).map_err(|e| rejected("Invalid request body", e))?;
        let files = self.check_files(files)?;
        let params: Map<String, Value> =
            params.into_iter().map(|(k, v)| (k, Value::String(v))).collect();
        let params = validate(&self.params, &Value::Object(params))
            .map_err(|e| rejected("Invalid URL params", e))?;
        let query = validate(&self.query, &query).map_err(|e| rejected("Invalid query params", e))?;
        Ok((params, query, body, files))
    }

    /// Groups uploads by field and checks each declared field's list.
    /// Uploads under undeclared fields are not passed to the handler.
    fn check_files(
        &self,
        files: Vec<UploadedFile>,
    ) -> Result<HashMap<String, Vec<UploadedFile>>, Failure> {
        let mut grouped: HashMap<String, Vec<UploadedFile>> =
            self.files.iter().map(|(name, _)| (name.clone(), Vec::new())).collect();
        for file in files {
            if let Some(list) = grouped.get_mut(&file.field) {
                list.push(file);
            }
        }

        let mut described = Map::new();
        let mut shape = ObjectShape::default();
        for (name, field) in &self.files {
            let uploads = grouped.get(name).map(Vec::as_slice).unwrap_or_default();
            let list = uploads.iter().map(UploadedFile::describe).collect();
            described.insert(name.clone(), Value::Array(list));
            shape = shape.field(name.clone(), field.shape());
        }
        validate(&shape.into(), &Value::Object(described))
            .map_err(|e| rejected("Invalid file fields", e))?;
        Ok(grouped)
    }

    /// Steps 5-6.
    async fn invoke(&self, ctx: Context) -> Dispatch {
        match self.handler.call(ctx).await? {
            Outcome::Success(success) => {
                let data = validate(&self.success, &Value::Object(success.data().clone()))
                    .map_err(|e| contract("success data", e))?;
                Ok(success.replace_data(into_map(data)))
            }
            Outcome::Failure(failure) => {
                let data = validate(&self.failure, &Value::Object(failure.data().clone()))
                    .map_err(|e| contract("failure data", e))?;
                Err(Fault::Failure(failure.replace_data(into_map(data))))
            }
        }
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("params", &self.params)
            .field("query", &self.query)
            .field("body", &self.body)
            .field("files", &self.files)
            .field("success", &self.success)
            .field("failure", &self.failure)
            .finish_non_exhaustive()
    }
}

fn rejected(message: &str, invalid: Invalid) -> Failure {
    Failure::client(400, message, invalid.into_errors())
}

fn contract(which: &'static str, invalid: Invalid) -> Fault {
    Error::Contract { which, details: invalid.to_string() }.into()
}

/// Object shapes always validate to objects.
fn into_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

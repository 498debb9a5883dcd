//! # apibase
//!
//! Declarative, schema-validated JSON endpoints for hyper services.
//!
//! You describe each endpoint once: the shape of its path params, query,
//! body, uploaded files, success data and failure data, plus an async
//! handler. apibase enforces the description on every request and every
//! response, then renders one uniform envelope:
//!
//! ```json
//! {"status": 201, "message": "Project created", "id": "42"}
//! ```
//!
//! ## The pieces
//!
//! - [`shape`] and [`validate()`]: declarative value shapes and the validator
//! - [`Success`] / [`Failure`]: typed result envelopes (2xx / 4xx–5xx)
//! - [`Endpoint`]: shapes plus handler; runs the validation pipeline
//! - [`Group`] / [`RouteNode`]: nestable route trees with order-sensitive middleware
//! - [`Router`]: compiles a tree once into radix trees (via [`matchit`]) and
//!   handles requests
//! - [`Server`]: hyper accept loop with graceful shutdown
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use apibase::{
//!     health, resp, shape, Config, Context, Endpoint, Error, Group, Router, Server, Success,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let config = Config::default().with_env_overrides();
//!     apibase::logging::init(&config.log_filter);
//!
//!     let api = Group::new("/api")
//!         .get("/health", health::endpoint())
//!         .post(
//!             "/projects",
//!             Endpoint::new(create_project)
//!                 .body(shape::object().field("name", shape::string().min(1)))
//!                 .success(shape::object().field("id", shape::string())),
//!         );
//!
//!     let router = Router::compile(api)?.configure(&config);
//!     Server::from_config(&config)?.serve(router).await
//! }
//!
//! async fn create_project(ctx: Context) -> Result<Success, Error> {
//!     let _name = ctx.raw_body()["name"].as_str();
//!     resp(201, "Project created", serde_json::json!({ "id": "42" }))
//! }
//! ```
//!
//! Anything that goes wrong past validation (a handler error, a panic, output
//! that breaks its declared shape) is logged and answered with a generic
//! `500 {"status":500,"message":"Unexpected error"}`; unmatched routes get
//! `404 {"status":404,"message":"Not found"}`.

mod body;
mod config;
mod envelope;
mod error;
mod file;
mod handler;
mod method;
mod pipeline;
mod request;
mod response;
mod route;
mod router;
mod server;
mod validate;

pub mod health;
pub mod logging;
pub mod middleware;
pub mod shape;

pub use config::{Config, DEFAULT_MAX_BODY_BYTES};
pub use envelope::{err, resp, Data, Dispatch, Failure, Fault, IntoOutcome, Outcome, Success};
pub use error::Error;
pub use file::{file_shape, FileContent, FileField, UploadedFile};
pub use handler::{BoxFuture, Context, Handler};
pub use method::Method;
pub use middleware::{from_fn, BoxedMiddleware, Middleware, Next};
pub use pipeline::Endpoint;
pub use request::Request;
pub use route::{endpoint, group, layers, Group, RouteNode};
pub use router::Router;
pub use server::Server;
pub use validate::{validate, FieldError, Invalid, PathSegment};

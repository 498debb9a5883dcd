//! Built-in health-check endpoint.
//!
//! Mount it wherever your load balancer or orchestrator checks liveness:
//!
//! ```rust
//! use apibase::{health, Group, Router};
//!
//! let router = Router::compile(Group::new("/api").get("/health", health::endpoint())).unwrap();
//! # let _ = router;
//! ```
//!
//! `GET /api/health` then answers `200 {"status":200,"message":"ok"}`.

use crate::envelope::{resp, Success};
use crate::error::Error;
use crate::handler::Context;
use crate::pipeline::Endpoint;

/// Liveness endpoint. No inputs, no dependencies; if the process can answer
/// HTTP at all it answers `ok`.
pub fn endpoint() -> Endpoint {
    Endpoint::new(liveness)
}

async fn liveness(_: Context) -> Result<Success, Error> {
    resp(200, "ok", ())
}

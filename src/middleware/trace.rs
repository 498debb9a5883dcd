//! Per-request log line.

use std::future::Future;
use std::time::Instant;

use tracing::info;

use crate::response::Response;

/// Awaits `respond` and logs method, path, status and latency.
pub(crate) async fn log_request<F>(method: &http::Method, path: &str, respond: F) -> Response
where
    F: Future<Output = Response>,
{
    let started = Instant::now();
    let response = respond.await;
    info!(
        method = %method,
        path,
        status = response.status(),
        latency_ms = started.elapsed().as_secs_f64() * 1000.0,
        "request"
    );
    response
}

//! The convention layer: the one place outcomes become wire responses.
//!
//! | Downstream result | Wire response |
//! |---|---|
//! | no route matched | 404 `{"status":404,"message":"Not found"}` |
//! | [`Success`] | its status, `{status, message, ...data}` |
//! | [`Fault::Failure`] | its status, `{status, message, ...data}` |
//! | [`Fault::Unexpected`] or a panic | logged; 500 `{"status":500,"message":"Unexpected error"}` |

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tracing::{error, warn};

use crate::envelope::{Data, Dispatch, Failure, Fault, Success};
use crate::response::Response;

/// Runs `dispatch` and renders whatever it produces. `None` means unmatched.
pub(crate) async fn apply<F>(dispatch: F) -> Response
where
    F: Future<Output = Option<Dispatch>>,
{
    match AssertUnwindSafe(dispatch).catch_unwind().await {
        Ok(Some(Ok(success))) => render_success(success),
        Ok(Some(Err(Fault::Failure(failure)))) => render_failure(failure),
        Ok(Some(Err(Fault::Unexpected(e)))) => {
            error!(error = ?e, "caught error in request dispatch");
            warn!(
                "error was converted to a generic 500 response; \
                 return a Failure to choose the response"
            );
            render_failure(unexpected())
        }
        Ok(None) => render_failure(not_found()),
        Err(panic) => {
            error!(panic = panic_message(&*panic), "request dispatch panicked");
            render_failure(unexpected())
        }
    }
}

fn not_found() -> Failure {
    Failure::fixed(404, "Not found", Data::new())
}

fn unexpected() -> Failure {
    Failure::fixed(500, "Unexpected error", Data::new())
}

fn render_success(success: Success) -> Response {
    let (status, body, headers) = success.into_parts();
    Response::json(status, &body).with_headers(headers)
}

fn render_failure(failure: Failure) -> Response {
    let (status, body) = failure.into_parts();
    Response::json(status, &body)
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

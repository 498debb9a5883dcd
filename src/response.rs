//! Outgoing wire response.
//!
//! Handlers never build one of these; they return envelopes and the
//! convention layer renders them here.

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderValue};
use http::{HeaderMap, StatusCode};
use http_body_util::Full;
use serde_json::Value;

/// Fallback when a body cannot be encoded. Never expected in practice:
/// envelopes are plain JSON maps.
const ENCODE_FAILURE: &[u8] = br#"{"status":500,"message":"Unexpected error"}"#;

/// A rendered response: status, headers, JSON body.
#[derive(Debug)]
pub(crate) struct Response {
    status: u16,
    headers: HeaderMap,
    body: Bytes,
}

impl Response {
    /// `application/json` response with `status`.
    pub(crate) fn json(status: u16, body: &Value) -> Self {
        let (status, body) = match serde_json::to_vec(body) {
            Ok(bytes) => (status, Bytes::from(bytes)),
            Err(e) => {
                tracing::error!("failed to encode response body: {e}");
                (500, Bytes::from_static(ENCODE_FAILURE))
            }
        };
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Self { status, headers, body }
    }

    pub(crate) fn with_headers(mut self, extra: HeaderMap) -> Self {
        self.headers.extend(extra);
        self
    }

    pub(crate) fn status(&self) -> u16 { self.status }
    #[cfg(test)]
    pub(crate) fn body(&self) -> &[u8] { &self.body }

    /// Converts into the transport's response type.
    pub(crate) fn into_inner(self) -> http::Response<Full<Bytes>> {
        let mut response = http::Response::new(Full::new(self.body));
        *response.status_mut() =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        *response.headers_mut() = self.headers;
        response
    }
}

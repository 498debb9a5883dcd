//! Shared helpers for the integration tests: requests are driven straight
//! through `Router::handle`, no sockets involved.

#![allow(dead_code)]

use std::path::Path;
use std::time::Duration;

use apibase::Router;
use bytes::Bytes;
use http::{HeaderMap, Request};
use http_body_util::{BodyExt, Full};
use serde_json::Value;

pub const BOUNDARY: &str = "----apibase-test";

/// A decoded response.
pub struct Reply {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Value,
    pub raw: Bytes,
}

pub async fn send(router: &Router, request: Request<Full<Bytes>>) -> Reply {
    let response = router.handle(request).await;
    let status = response.status().as_u16();
    let headers = response.headers().clone();
    let raw = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&raw).unwrap();
    Reply { status, headers, body, raw }
}

pub async fn get(router: &Router, uri: &str) -> Reply {
    send(router, Request::get(uri).body(Full::new(Bytes::new())).unwrap()).await
}

pub async fn json(router: &Router, method: &str, uri: &str, body: Value) -> Reply {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap();
    send(router, request).await
}

pub async fn raw(
    router: &Router,
    method: &str,
    uri: &str,
    content_type: &str,
    body: &'static str,
) -> Reply {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", content_type)
        .body(Full::new(Bytes::from_static(body.as_bytes())))
        .unwrap();
    send(router, request).await
}

/// A multipart part: `(field, Some((filename, mime)), data)`; `None` for text fields.
pub type Part<'a> = (&'a str, Option<(&'a str, &'a str)>, &'a str);

pub fn multipart(parts: &[Part<'_>]) -> Bytes {
    let mut out = String::new();
    for (name, file, data) in parts {
        out.push_str(&format!("--{BOUNDARY}\r\n"));
        match file {
            Some((filename, mime)) => out.push_str(&format!(
                "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                 Content-Type: {mime}\r\n\r\n"
            )),
            None => out.push_str(&format!(
                "Content-Disposition: form-data; name=\"{name}\"\r\n\r\n"
            )),
        }
        out.push_str(data);
        out.push_str("\r\n");
    }
    out.push_str(&format!("--{BOUNDARY}--\r\n"));
    Bytes::from(out)
}

pub async fn upload(router: &Router, uri: &str, parts: &[Part<'_>]) -> Reply {
    let request = Request::post(uri)
        .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Full::new(multipart(parts)))
        .unwrap();
    send(router, request).await
}

/// Waits for a spawned cleanup task to remove `path`.
pub async fn wait_until_removed(path: &Path) -> bool {
    for _ in 0..100 {
        if !path.exists() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

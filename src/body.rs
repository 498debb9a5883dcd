//! Request decoding: query strings, JSON bodies, and multipart uploads.
//!
//! This is the transport side of the framework. It turns raw bytes into the
//! loosely-typed values the pipeline validates; it never decides whether a
//! value is *acceptable*, only whether it can be read at all.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use http::HeaderMap;
use http::header::CONTENT_TYPE;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::envelope::{Failure, Fault};
use crate::file::{FileContent, TempFiles, UploadedFile};
use crate::validate::{FieldError, PathSegment};

/// Limits applied while decoding a request body.
#[derive(Clone, Debug)]
pub(crate) struct BodyOptions {
    pub(crate) max_bytes: usize,
    /// Spool uploads here instead of holding them in memory.
    pub(crate) upload_dir: Option<PathBuf>,
}

impl Default for BodyOptions {
    fn default() -> Self {
        Self { max_bytes: crate::config::DEFAULT_MAX_BODY_BYTES, upload_dir: None }
    }
}

/// What a body decodes into.
#[derive(Debug, Default)]
pub(crate) struct Decoded {
    pub(crate) body: Value,
    pub(crate) files: Vec<UploadedFile>,
    pub(crate) temp_files: TempFiles,
}

fn invalid_body(code: &'static str, message: impl Into<String>) -> Failure {
    Failure::client(400, "Invalid request body", vec![FieldError::new(code, &[], message)])
}

/// Inserts `value` under `key`; a repeated key turns the entry into an array.
fn append(map: &mut Map<String, Value>, key: String, value: Value) {
    match map.get_mut(&key) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            map.insert(key, value);
        }
    }
}

/// Decodes `a=1&b=2&b=3` into `{"a": "1", "b": ["2", "3"]}`.
pub(crate) fn decode_query(raw: Option<&str>) -> Result<Value, Failure> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(raw.unwrap_or("")).map_err(|e| {
        let errors = vec![FieldError::new("invalid_query", &[], e.to_string())];
        Failure::client(400, "Invalid query params", errors)
    })?;
    let mut map = Map::new();
    for (k, v) in pairs {
        append(&mut map, k, Value::String(v));
    }
    Ok(Value::Object(map))
}

/// Percent-decodes matched path params. `+` is kept as is.
pub(crate) fn decode_params(
    raw: Vec<(String, String)>,
) -> Result<HashMap<String, String>, Failure> {
    let mut params = HashMap::with_capacity(raw.len());
    let mut errors = Vec::new();
    for (key, value) in raw {
        match urlencoding::decode(&value) {
            Ok(decoded) => {
                params.insert(key, decoded.into_owned());
            }
            Err(_) => errors.push(FieldError::new(
                "invalid_string",
                &[PathSegment::Key(key)],
                "Percent-encoded value is not valid UTF-8",
            )),
        }
    }
    if errors.is_empty() {
        Ok(params)
    } else {
        Err(Failure::client(400, "Invalid URL params", errors))
    }
}

/// The MIME essence (`type/subtype`), lowercased, parameters dropped.
fn essence(content_type: &str) -> String {
    content_type.split(';').next().unwrap_or("").trim().to_ascii_lowercase()
}

/// Decodes a request body according to its `content-type`.
///
/// Empty bodies decode to `{}` regardless of content type.
pub(crate) async fn decode_body(
    headers: &HeaderMap,
    bytes: Bytes,
    opts: &BodyOptions,
) -> Result<Decoded, Fault> {
    if bytes.is_empty() {
        return Ok(Decoded { body: Value::Object(Map::new()), ..Decoded::default() });
    }

    let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()).unwrap_or("");
    let mime = essence(content_type);

    if mime == "application/json" || (mime.starts_with("application/") && mime.ends_with("+json")) {
        let body = match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Null) => Value::Object(Map::new()),
            Ok(v) => v,
            Err(e) => return Err(invalid_body("invalid_json", e.to_string()).into()),
        };
        return Ok(Decoded { body, ..Decoded::default() });
    }

    if mime == "multipart/form-data" {
        let Some(boundary) = boundary(content_type) else {
            return Err(invalid_body("invalid_multipart", "multipart boundary is missing").into());
        };
        return decode_multipart(&bytes, &boundary, opts.upload_dir.as_deref()).await;
    }

    let shown = if mime.is_empty() { "none" } else { mime.as_str() };
    Err(Failure::client(
        415,
        "Unsupported content type",
        vec![FieldError::new(
            "unsupported_content_type",
            &[],
            format!("Unsupported content type: {shown}"),
        )],
    )
    .into())
}

// ── multipart/form-data ──────────────────────────────────────────────────────

fn boundary(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (k, v) = param.split_once('=')?;
        k.trim().eq_ignore_ascii_case("boundary").then(|| v.trim().trim_matches('"').to_owned())
    }).filter(|b| !b.is_empty())
}

#[derive(Debug)]
struct Part<'a> {
    name: String,
    filename: Option<String>,
    content_type: Option<String>,
    data: &'a [u8],
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|i| i + from)
}

fn split_parts<'a>(body: &'a [u8], boundary: &str) -> Result<Vec<Part<'a>>, String> {
    let open = format!("--{boundary}").into_bytes();
    let close = format!("\r\n--{boundary}").into_bytes();

    let mut pos = find(body, &open, 0).ok_or("missing opening boundary")? + open.len();
    let mut parts = Vec::new();
    loop {
        let rest = &body[pos..];
        if rest.starts_with(b"--") {
            return Ok(parts);
        }
        if !rest.starts_with(b"\r\n") {
            return Err("malformed boundary line".to_owned());
        }
        pos += 2;

        // Searching from the boundary's own CRLF lets a part with no headers
        // end its (empty) header block immediately.
        let header_end = find(body, b"\r\n\r\n", pos - 2).ok_or("unterminated part headers")?;
        let header_bytes = body.get(pos..header_end).unwrap_or(&[]);
        let headers = std::str::from_utf8(header_bytes).map_err(|_| "part headers are not UTF-8")?;

        let data_start = header_end + 4;
        let data_end = find(body, &close, data_start).ok_or("missing closing boundary")?;
        parts.push(parse_part(headers, &body[data_start..data_end])?);
        pos = data_end + close.len();
    }
}

fn parse_part<'a>(headers: &str, data: &'a [u8]) -> Result<Part<'a>, String> {
    let mut disposition = None;
    let mut content_type = None;
    for line in headers.split("\r\n").filter(|l| !l.is_empty()) {
        let (name, value) =
            line.split_once(':').ok_or_else(|| format!("malformed part header `{line}`"))?;
        let value = value.trim();
        if name.trim().eq_ignore_ascii_case("content-disposition") {
            disposition = Some(disposition_params(value));
        } else if name.trim().eq_ignore_ascii_case("content-type") {
            content_type = Some(value.to_owned());
        }
    }

    let params = disposition.ok_or("part is missing content-disposition")?;
    let lookup = |key: &str| {
        params.iter().find(|(k, _)| k.eq_ignore_ascii_case(key)).map(|(_, v)| v.clone())
    };
    let name = lookup("name").ok_or("part is missing a field name")?;
    let filename = match lookup("filename*") {
        Some(extended) => Some(extended_value(&extended)?),
        None => lookup("filename"),
    };
    Ok(Part { name, filename, content_type, data })
}

/// Decodes an RFC 5987 `charset'language'value` parameter such as
/// `UTF-8''na%C3%AFve.txt`. Only UTF-8 and ISO-8859-1 are understood.
fn extended_value(raw: &str) -> Result<String, String> {
    let mut pieces = raw.splitn(3, '\'');
    let (Some(charset), Some(_language), Some(encoded)) =
        (pieces.next(), pieces.next(), pieces.next())
    else {
        return Err(format!("malformed extended filename `{raw}`"));
    };
    if charset.eq_ignore_ascii_case("utf-8") {
        urlencoding::decode(encoded)
            .map(|name| name.into_owned())
            .map_err(|_| format!("extended filename `{raw}` is not UTF-8"))
    } else if charset.eq_ignore_ascii_case("iso-8859-1") {
        Ok(urlencoding::decode_binary(encoded.as_bytes()).iter().map(|&b| char::from(b)).collect())
    } else {
        Err(format!("unsupported filename charset `{charset}`"))
    }
}

/// `form-data; name="a"; filename="b;c.txt"` → `[("name","a"), ("filename","b;c.txt")]`.
fn disposition_params(value: &str) -> Vec<(String, String)> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for c in value.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                current.push(c);
            }
            ';' if !quoted => segments.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    segments.push(current);

    segments
        .iter()
        .filter_map(|seg| {
            let (k, v) = seg.split_once('=')?;
            Some((k.trim().to_owned(), v.trim().trim_matches('"').to_owned()))
        })
        .collect()
}

async fn decode_multipart(
    bytes: &Bytes,
    boundary: &str,
    upload_dir: Option<&Path>,
) -> Result<Decoded, Fault> {
    let parts = split_parts(bytes, boundary).map_err(|m| invalid_body("invalid_multipart", m))?;

    let mut fields = Map::new();
    let mut decoded = Decoded::default();
    for part in parts {
        let Some(filename) = part.filename else {
            let text = String::from_utf8(part.data.to_vec()).map_err(|_| {
                invalid_body("invalid_multipart", format!("field `{}` is not UTF-8", part.name))
            })?;
            append(&mut fields, part.name, Value::String(text));
            continue;
        };

        // Browsers send an empty, nameless part for an untouched file input.
        if filename.is_empty() && part.data.is_empty() {
            continue;
        }

        let content = match upload_dir {
            Some(dir) => {
                let path = dir.join(format!("upload-{}", Uuid::new_v4()));
                decoded.temp_files.push(path.clone());
                tokio::fs::write(&path, part.data).await.map_err(anyhow::Error::from)?;
                FileContent::Disk(path)
            }
            None => FileContent::Memory(bytes.slice_ref(part.data)),
        };
        decoded.files.push(UploadedFile {
            field: part.name,
            filename,
            // A part without its own content type is text/plain.
            mime_type: part.content_type.unwrap_or_else(|| "text/plain".to_owned()),
            content,
            size: Some(part.data.len() as u64),
        });
    }
    decoded.body = Value::Object(fields);
    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use http::HeaderValue;
    use serde_json::json;

    use super::*;

    const BOUNDARY: &str = "XyZ";

    fn multipart_body() -> Bytes {
        Bytes::from(
            "--XyZ\r\n\
             Content-Disposition: form-data; name=\"title\"\r\n\r\n\
             holiday\r\n\
             --XyZ\r\n\
             Content-Disposition: form-data; name=\"tag\"\r\n\r\n\
             a\r\n\
             --XyZ\r\n\
             Content-Disposition: form-data; name=\"tag\"\r\n\r\n\
             b\r\n\
             --XyZ\r\n\
             Content-Disposition: form-data; name=\"photo\"; filename=\"beach;1.png\"\r\n\
             Content-Type: image/png\r\n\r\n\
             PNGDATA\r\n\
             --XyZ--\r\n",
        )
    }

    fn headers(content_type: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
        h
    }

    #[test]
    fn query_repeats_become_arrays() {
        assert_eq!(
            decode_query(Some("a=1&b=x%20y&b=z")).unwrap(),
            json!({"a": "1", "b": ["x y", "z"]})
        );
        assert_eq!(decode_query(None).unwrap(), json!({}));
    }

    #[tokio::test]
    async fn empty_body_is_an_empty_object() {
        let opts = BodyOptions::default();
        let d = decode_body(&HeaderMap::new(), Bytes::new(), &opts).await.unwrap();
        assert_eq!(d.body, json!({}));
    }

    #[tokio::test]
    async fn json_bodies() {
        let h = headers("application/json; charset=utf-8");
        let opts = BodyOptions::default();
        let d = decode_body(&h, Bytes::from_static(br#"{"a":1}"#), &opts).await.unwrap();
        assert_eq!(d.body, json!({"a": 1}));

        let malformed = decode_body(&h, Bytes::from_static(b"{oops"), &opts).await;
        let Err(Fault::Failure(f)) = malformed else {
            panic!("malformed json must be a client failure");
        };
        assert_eq!(f.status(), 400);
        assert_eq!(f.message(), "Invalid request body");
        assert_eq!(f.data()["errors"][0]["code"], "invalid_json");
    }

    #[tokio::test]
    async fn unsupported_content_type() {
        let h = headers("text/plain");
        let opts = BodyOptions::default();
        let Err(Fault::Failure(f)) = decode_body(&h, Bytes::from_static(b"hi"), &opts).await else {
            panic!("text/plain must be rejected");
        };
        assert_eq!(f.status(), 415);
        assert_eq!(f.data()["errors"][0]["message"], "Unsupported content type: text/plain");
    }

    #[tokio::test]
    async fn multipart_in_memory() {
        let h = headers(&format!("multipart/form-data; boundary={BOUNDARY}"));
        let d = decode_body(&h, multipart_body(), &BodyOptions::default()).await.unwrap();
        assert_eq!(d.body, json!({"title": "holiday", "tag": ["a", "b"]}));
        assert_eq!(d.files.len(), 1);
        let file = &d.files[0];
        assert_eq!(file.field, "photo");
        assert_eq!(file.filename, "beach;1.png");
        assert_eq!(file.mime_type, "image/png");
        assert_eq!(file.size, Some(7));
        assert_eq!(file.content, FileContent::Memory(Bytes::from_static(b"PNGDATA")));
        assert!(d.temp_files.is_empty());
    }

    #[tokio::test]
    async fn multipart_spools_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let opts =
            BodyOptions { upload_dir: Some(dir.path().to_owned()), ..BodyOptions::default() };
        let h = headers(&format!("multipart/form-data; boundary=\"{BOUNDARY}\""));
        let d = decode_body(&h, multipart_body(), &opts).await.unwrap();

        let path = d.files[0].path().unwrap().to_owned();
        assert_eq!(std::fs::read(&path).unwrap(), b"PNGDATA");
        d.temp_files.remove_all().await;
        assert!(!path.exists());
    }

    #[test]
    fn multipart_errors() {
        assert!(split_parts(b"no boundary here", BOUNDARY).is_err());
        let unterminated =
            b"--XyZ\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\nunterminated";
        assert!(split_parts(unterminated, BOUNDARY).is_err());
        let nameless = b"--XyZ\r\nContent-Type: text/plain\r\n\r\nx\r\n--XyZ--";
        assert!(split_parts(nameless, BOUNDARY).is_err());
        assert_eq!(boundary("multipart/form-data"), None);
    }

    #[test]
    fn extended_filenames_win_over_plain_ones() {
        let disposition =
            |params: &str| format!("Content-Disposition: form-data; name=\"doc\"; {params}");

        let plain_and_extended = disposition(
            "filename=\"naive.txt\"; filename*=UTF-8''na%C3%AFve%20r%C3%A9sum%C3%A9.txt",
        );
        let part = parse_part(&plain_and_extended, b"x").unwrap();
        assert_eq!(part.filename.as_deref(), Some("naïve résumé.txt"));

        let part = parse_part(&disposition("filename*=iso-8859-1'en'%E9t%E9.txt"), b"x").unwrap();
        assert_eq!(part.filename.as_deref(), Some("été.txt"));

        assert!(parse_part(&disposition("filename*=UTF-8''%FF.txt"), b"x").is_err());
        assert!(parse_part(&disposition("filename*=plain.txt"), b"x").is_err());
    }

    #[tokio::test]
    async fn parts_without_a_content_type_are_text_plain() {
        let body = Bytes::from_static(
            b"--XyZ\r\n\
              Content-Disposition: form-data; name=\"doc\"; filename=\"a.bin\"\r\n\r\n\
              xyz\r\n\
              --XyZ--\r\n",
        );
        let h = headers(&format!("multipart/form-data; boundary={BOUNDARY}"));
        let d = decode_body(&h, body, &BodyOptions::default()).await.unwrap();
        assert_eq!(d.files[0].mime_type, "text/plain");
    }

    #[test]
    fn params_are_percent_decoded() {
        let raw = vec![
            ("id".to_owned(), "a%20b+c".to_owned()),
            ("slug".to_owned(), "caf%C3%A9".to_owned()),
        ];
        let params = decode_params(raw).unwrap();
        assert_eq!(params["id"], "a b+c");
        assert_eq!(params["slug"], "café");

        let f = decode_params(vec![("id".to_owned(), "%FF".to_owned())]).unwrap_err();
        assert_eq!(f.status(), 400);
        assert_eq!(f.message(), "Invalid URL params");
        assert_eq!(f.data()["errors"][0]["path"], json!(["id"]));
    }
}

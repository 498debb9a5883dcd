//! Handler outcomes.
//!
//! Every handler produces exactly one envelope: a [`Success`] (2xx) or a
//! [`Failure`] (4xx/5xx). Both check their status class when built, so an
//! endpoint that tries to answer `resp(404, ..)` fails at the point of
//! construction with [`Error::StatusOutOfRange`], not as a bad request.
//!
//! On the wire both render as one flat JSON object:
//!
//! ```text
//! { "status": 201, "message": "created", "id": "42" }
//! ```

use std::ops::RangeInclusive;

use http::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::Error;
use crate::validate::FieldError;

/// Flattened envelope payload.
pub type Data = Map<String, Value>;

const SUCCESS_RANGE: RangeInclusive<u16> = 200..=299;
const FAILURE_RANGE: RangeInclusive<u16> = 400..=599;

fn check_status(
    kind: &'static str,
    status: u16,
    range: &RangeInclusive<u16>,
) -> Result<u16, Error> {
    if range.contains(&status) {
        Ok(status)
    } else {
        Err(Error::StatusOutOfRange { kind, status, min: *range.start(), max: *range.end() })
    }
}

/// Serialises `data` into an object map. `()` and `None` mean "no data".
fn to_data(data: impl Serialize) -> Result<Data, Error> {
    match serde_json::to_value(data)? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Data::new()),
        other => Err(Error::EnvelopeData(other.to_string())),
    }
}

/// A 2xx outcome.
#[derive(Clone, Debug, PartialEq)]
pub struct Success {
    status: u16,
    message: String,
    data: Data,
    headers: HeaderMap,
}

impl Success {
    pub fn new(status: u16, message: impl Into<String>) -> Result<Self, Error> {
        Ok(Self {
            status: check_status("success", status, &SUCCESS_RANGE)?,
            message: message.into(),
            data: Data::new(),
            headers: HeaderMap::new(),
        })
    }

    /// Replaces the payload. `data` must serialise to a JSON object.
    pub fn with_data(mut self, data: impl Serialize) -> Result<Self, Error> {
        self.data = to_data(data)?;
        Ok(self)
    }

    /// Adds a response header, e.g. `set-cookie` after a login.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn status(&self) -> u16 { self.status }
    pub fn message(&self) -> &str { &self.message }
    pub fn data(&self) -> &Data { &self.data }
    pub fn headers(&self) -> &HeaderMap { &self.headers }

    pub(crate) fn replace_data(mut self, data: Data) -> Self {
        self.data = data;
        self
    }

    pub(crate) fn into_parts(self) -> (u16, Value, HeaderMap) {
        (self.status, flatten(self.status, self.message, self.data), self.headers)
    }
}

/// A 4xx/5xx outcome.
#[derive(Clone, Debug, PartialEq)]
pub struct Failure {
    status: u16,
    message: String,
    data: Data,
}

impl Failure {
    pub fn new(status: u16, message: impl Into<String>) -> Result<Self, Error> {
        Ok(Self {
            status: check_status("failure", status, &FAILURE_RANGE)?,
            message: message.into(),
            data: Data::new(),
        })
    }

    /// Replaces the payload. `data` must serialise to a JSON object.
    pub fn with_data(mut self, data: impl Serialize) -> Result<Self, Error> {
        self.data = to_data(data)?;
        Ok(self)
    }

    /// Framework-owned failures. `status` is a literal in `FAILURE_RANGE`
    /// at every call site.
    pub(crate) fn fixed(status: u16, message: &str, data: Data) -> Self {
        debug_assert!(FAILURE_RANGE.contains(&status));
        Self { status, message: message.to_owned(), data }
    }

    /// A client input error carrying `{"errors": [..]}`.
    pub(crate) fn client(status: u16, message: &str, errors: Vec<FieldError>) -> Self {
        let mut data = Data::new();
        data.insert("errors".to_owned(), serde_json::to_value(errors).unwrap_or_default());
        Self::fixed(status, message, data)
    }

    pub fn status(&self) -> u16 { self.status }
    pub fn message(&self) -> &str { &self.message }
    pub fn data(&self) -> &Data { &self.data }

    pub(crate) fn replace_data(mut self, data: Data) -> Self {
        self.data = data;
        self
    }

    pub(crate) fn into_parts(self) -> (u16, Value) {
        (self.status, flatten(self.status, self.message, self.data))
    }
}

/// `{status, message, ...data}`. Data keys are spread last and win on collision.
fn flatten(status: u16, message: String, data: Data) -> Value {
    let mut body = Map::with_capacity(data.len() + 2);
    body.insert("status".to_owned(), Value::from(status));
    body.insert("message".to_owned(), Value::String(message));
    body.extend(data);
    Value::Object(body)
}

/// Shorthand for `Success::new(status, message)?.with_data(data)`.
pub fn resp(
    status: u16,
    message: impl Into<String>,
    data: impl Serialize,
) -> Result<Success, Error> {
    Success::new(status, message)?.with_data(data)
}

/// Shorthand for `Failure::new(status, message)?.with_data(data)`.
pub fn err(
    status: u16,
    message: impl Into<String>,
    data: impl Serialize,
) -> Result<Failure, Error> {
    Failure::new(status, message)?.with_data(data)
}

// ── Outcome ──────────────────────────────────────────────────────────────────

/// What a handler hands back to the pipeline.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Success(Success),
    Failure(Failure),
}

impl From<Success> for Outcome {
    fn from(s: Success) -> Self { Self::Success(s) }
}

impl From<Failure> for Outcome {
    fn from(f: Failure) -> Self { Self::Failure(f) }
}

/// Conversion of a handler's return value into an [`Outcome`].
///
/// Implemented for [`Success`], [`Failure`], [`Outcome`], and any
/// `Result<T, E>` whose `Ok` side converts and whose `Err` side is an error
/// (`anyhow::Error`, [`Error`], `std::io::Error`, ...). An `Err` is an
/// unexpected failure and surfaces as the generic 500 envelope.
pub trait IntoOutcome {
    fn into_outcome(self) -> Result<Outcome, anyhow::Error>;
}

impl IntoOutcome for Outcome {
    fn into_outcome(self) -> Result<Outcome, anyhow::Error> { Ok(self) }
}

impl IntoOutcome for Success {
    fn into_outcome(self) -> Result<Outcome, anyhow::Error> { Ok(Outcome::Success(self)) }
}

impl IntoOutcome for Failure {
    fn into_outcome(self) -> Result<Outcome, anyhow::Error> { Ok(Outcome::Failure(self)) }
}

impl<T, E> IntoOutcome for Result<T, E>
where
    T: IntoOutcome,
    E: Into<anyhow::Error>,
{
    fn into_outcome(self) -> Result<Outcome, anyhow::Error> {
        self.map_err(Into::<anyhow::Error>::into)?.into_outcome()
    }
}

// ── Fault ────────────────────────────────────────────────────────────────────

/// Anything that stops a request short of a [`Success`].
///
/// A declared [`Failure`] is rendered verbatim by the convention layer; an
/// `Unexpected` error is logged and replaced by the generic 500 envelope.
#[derive(Debug)]
pub enum Fault {
    Failure(Failure),
    Unexpected(anyhow::Error),
}

impl From<Failure> for Fault {
    fn from(f: Failure) -> Self { Self::Failure(f) }
}

impl From<anyhow::Error> for Fault {
    fn from(e: anyhow::Error) -> Self { Self::Unexpected(e) }
}

impl From<Error> for Fault {
    fn from(e: Error) -> Self { Self::Unexpected(e.into()) }
}

/// The value threaded through middleware and the pipeline.
pub type Dispatch = Result<Success, Fault>;

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn success_status_must_be_2xx() {
        assert!(Success::new(200, "ok").is_ok());
        assert!(Success::new(299, "ok").is_ok());
        for status in [150, 199, 300, 310, 404] {
            assert!(matches!(
                Success::new(status, "x"),
                Err(Error::StatusOutOfRange { kind: "success", min: 200, max: 299, .. })
            ));
        }
    }

    #[test]
    fn failure_status_must_be_4xx_or_5xx() {
        assert!(Failure::new(400, "bad").is_ok());
        assert!(Failure::new(599, "bad").is_ok());
        assert!(Failure::new(399, "bad").is_err());
        assert!(Failure::new(600, "bad").is_err());
        assert!(err(200, "nope", ()).is_err());
    }

    #[test]
    fn flattens_data_into_the_envelope() {
        let s = resp(201, "created", json!({"id": "42"})).unwrap();
        let (status, body, _) = s.into_parts();
        assert_eq!(status, 201);
        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            r#"{"status":201,"message":"created","id":"42"}"#
        );
    }

    #[test]
    fn data_keys_override_envelope_keys() {
        let s = resp(200, "ok", json!({"message": "Project deleted successfully"})).unwrap();
        let (_, body, _) = s.into_parts();
        assert_eq!(body, json!({"status": 200, "message": "Project deleted successfully"}));
    }

    #[test]
    fn data_must_be_an_object() {
        assert!(matches!(resp(200, "ok", json!([1, 2])), Err(Error::EnvelopeData(_))));
        assert!(matches!(err(400, "bad", "text"), Err(Error::EnvelopeData(_))));
        assert!(resp(200, "ok", ()).unwrap().data().is_empty());
    }

    #[test]
    fn results_convert_into_outcomes() {
        let ok: Result<Success, Error> = resp(200, "ok", ());
        assert!(matches!(ok.into_outcome(), Ok(Outcome::Success(_))));

        let failed: Result<Outcome, std::io::Error> = Err(std::io::Error::other("disk"));
        assert_eq!(failed.into_outcome().unwrap_err().to_string(), "disk");
    }
}

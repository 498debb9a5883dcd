//! Unified error type.

use std::path::PathBuf;

/// The error type returned by apibase's fallible operations.
///
/// Request-level problems (400, 404, 409, etc.) are expressed as
/// [`Failure`](crate::Failure) envelopes, not as `Error`s. This type surfaces
/// programming errors in endpoint definitions (bad status codes, conflicting
/// routes, handler output that breaks its own shape) and infrastructure
/// failures such as binding a port.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// An envelope was built with a status outside its class.
    #[error("{kind} status must be between {min} and {max}, got {status}")]
    StatusOutOfRange {
        kind: &'static str,
        status: u16,
        min: u16,
        max: u16,
    },

    /// Envelope data must serialise to a JSON object so it can be flattened.
    #[error("envelope data must be a JSON object, got {0}")]
    EnvelopeData(String),

    #[error("envelope data could not be serialised: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("unknown HTTP method `{0}`")]
    UnknownMethod(String),

    #[error("invalid route `{path}`: {source}")]
    InvalidRoute {
        path: String,
        #[source]
        source: matchit::InsertError,
    },

    /// A handler produced data that does not satisfy its declared shape.
    #[error("{which} does not match its declared shape: {details}")]
    Contract { which: &'static str, details: String },

    /// A validated value could not be deserialised into the handler's type.
    #[error("validated {which} does not fit the requested type: {source}")]
    Extract {
        which: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("config {}: {message}", path.display())]
    Config { path: PathBuf, message: String },

    #[error("invalid bind address `{addr}`: {source}")]
    InvalidAddress {
        addr: String,
        #[source]
        source: std::net::AddrParseError,
    },
}

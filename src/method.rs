//! HTTP method as a typed enum.
//!
//! Only the RFC 9110 methods an endpoint can be declared under. Parsing any
//! other name is an [`Error::UnknownMethod`], raised while the route tree is
//! being built, never at request time.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// A method an endpoint can be registered under.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Method {
    Delete,
    Get,
    Head,
    Options,
    Patch,
    Post,
    Put,
}

impl Method {
    /// Returns the uppercase wire representation (e.g. `"GET"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Delete  => "DELETE",
            Self::Get     => "GET",
            Self::Head    => "HEAD",
            Self::Options => "OPTIONS",
            Self::Patch   => "PATCH",
            Self::Post    => "POST",
            Self::Put     => "PUT",
        }
    }

    /// Maps a transport method onto a routable one. `None` for methods no
    /// endpoint can be declared under, which dispatch treats as unmatched.
    pub(crate) fn from_http(method: &http::Method) -> Option<Self> {
        method.as_str().parse().ok()
    }
}

/// Parses an uppercase method string (e.g. `"GET"`). Case-sensitive per RFC 9110 §9.1.
impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DELETE"  => Ok(Self::Delete),
            "GET"     => Ok(Self::Get),
            "HEAD"    => Ok(Self::Head),
            "OPTIONS" => Ok(Self::Options),
            "PATCH"   => Ok(Self::Patch),
            "POST"    => Ok(Self::Post),
            "PUT"     => Ok(Self::Put),
            other     => Err(Error::UnknownMethod(other.to_owned())),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_methods() {
        assert_eq!("GET".parse::<Method>().unwrap(), Method::Get);
        assert_eq!("PATCH".parse::<Method>().unwrap(), Method::Patch);
        assert_eq!(Method::Delete.to_string(), "DELETE");
    }

    #[test]
    fn unknown_or_lowercase_is_an_error() {
        assert!(matches!("get".parse::<Method>(), Err(Error::UnknownMethod(m)) if m == "get"));
        assert!(matches!("PURGE".parse::<Method>(), Err(Error::UnknownMethod(_))));
    }

    #[test]
    fn maps_transport_methods() {
        assert_eq!(Method::from_http(&http::Method::PUT), Some(Method::Put));
        assert_eq!(Method::from_http(&http::Method::TRACE), None);
    }
}

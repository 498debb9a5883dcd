//! Structural validation of JSON values against [`Shape`]s.
//!
//! [`validate`] is a pure function: it either returns the normalised value
//! (unknown keys stripped, coerced strings converted) or every field error it
//! found, in document order. Nothing short-circuits inside one shape.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::shape::{
    ArrayShape, BooleanShape, Bound, NumberShape, ObjectShape, Shape, StringShape, UnknownKeys,
};

/// One step in the path from the validated root to a failing field.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(k) => f.write_str(k),
            Self::Index(i) => write!(f, "{i}"),
        }
    }
}

/// A single validation failure, serialised onto the wire as
/// `{"code": .., "path": [..], "message": ..}`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FieldError {
    pub code: &'static str,
    pub path: Vec<PathSegment>,
    pub message: String,
}

impl FieldError {
    pub(crate) fn new(
        code: &'static str,
        path: &[PathSegment],
        message: impl Into<String>,
    ) -> Self {
        Self { code, path: path.to_vec(), message: message.into() }
    }
}

/// The `Invalid` branch of [`validate`]. Never empty.
#[derive(Clone, Debug, PartialEq)]
pub struct Invalid(Vec<FieldError>);

impl Invalid {
    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    pub fn into_errors(self) -> Vec<FieldError> {
        self.0
    }
}

impl fmt::Display for Invalid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            let path: Vec<String> = e.path.iter().map(ToString::to_string).collect();
            write!(f, "[{}] {}", path.join("."), e.message)?;
        }
        Ok(())
    }
}

/// Validates `value` against `shape`.
pub fn validate(shape: &Shape, value: &Value) -> Result<Value, Invalid> {
    let mut errors = Vec::new();
    let out = check(shape, Some(value), &mut Vec::new(), &mut errors);
    if errors.is_empty() {
        Ok(out.unwrap_or(Value::Null))
    } else {
        Err(Invalid(errors))
    }
}

/// `None` on input means the key is absent; `None` on output means it stays absent.
fn check(
    shape: &Shape,
    value: Option<&Value>,
    path: &mut Vec<PathSegment>,
    errors: &mut Vec<FieldError>,
) -> Option<Value> {
    let Some(value) = value else {
        if !matches!(shape, Shape::Any | Shape::Optional(_)) {
            errors.push(FieldError::new("invalid_type", path, "Required"));
        }
        return None;
    };

    match shape {
        Shape::Any => Some(value.clone()),
        Shape::Optional(inner) => check(inner, Some(value), path, errors),
        Shape::Nullable(_) if value.is_null() => Some(Value::Null),
        Shape::Nullable(inner) => check(inner, Some(value), path, errors),
        Shape::Boolean(s) => check_boolean(s, value, path, errors),
        Shape::String(s) => check_string(s, value, path, errors),
        Shape::Number(s) => check_number(s, value, path, errors),
        Shape::Enum(options) => check_enum(options, value, path, errors),
        Shape::Array(s) => check_array(s, value, path, errors),
        Shape::Object(s) => check_object(s, value, path, errors),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn type_error(expected: &str, value: &Value, path: &[PathSegment], errors: &mut Vec<FieldError>) {
    errors.push(FieldError::new(
        "invalid_type",
        path,
        format!("Expected {expected}, received {}", type_name(value)),
    ));
}

fn check_boolean(
    s: &BooleanShape,
    value: &Value,
    path: &[PathSegment],
    errors: &mut Vec<FieldError>,
) -> Option<Value> {
    match value {
        Value::Bool(_) => Some(value.clone()),
        Value::String(raw) if s.coerce => match raw.as_str() {
            "true" | "1" => Some(Value::Bool(true)),
            "false" | "0" => Some(Value::Bool(false)),
            _ => {
                type_error("boolean", value, path, errors);
                None
            }
        },
        _ => {
            type_error("boolean", value, path, errors);
            None
        }
    }
}

fn check_string(
    s: &StringShape,
    value: &Value,
    path: &[PathSegment],
    errors: &mut Vec<FieldError>,
) -> Option<Value> {
    let Value::String(text) = value else {
        type_error("string", value, path, errors);
        return None;
    };
    let len = text.chars().count();
    if let Some(min) = s.min.filter(|&min| len < min) {
        errors.push(FieldError::new(
            "too_small",
            path,
            format!("String must contain at least {min} character(s)"),
        ));
    }
    if let Some(max) = s.max.filter(|&max| len > max) {
        errors.push(FieldError::new(
            "too_big",
            path,
            format!("String must contain at most {max} character(s)"),
        ));
    }
    if s.email && !looks_like_email(text) {
        errors.push(FieldError::new("invalid_string", path, "Invalid email"));
    }
    Some(value.clone())
}

/// The address pattern minus its lookaheads, which [`looks_like_email`]
/// checks by hand: no leading dot and no `..` anywhere.
static EMAIL: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)^[A-Z0-9_'+\-.]*[A-Z0-9_+-]@([A-Z0-9][A-Z0-9\-]*\.)+[A-Z]{2,}$").ok()
});

fn looks_like_email(text: &str) -> bool {
    if text.starts_with('.') || text.contains("..") {
        return false;
    }
    EMAIL.as_ref().is_some_and(|re| re.is_match(text))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::shape::{self, ShapeExt};

    fn messages(result: Result<Value, Invalid>) -> Vec<String> {
        result.unwrap_err().into_errors().into_iter().map(|e| e.message).collect()
    }

    #[test]
    fn strips_unknown_keys_by_default() {
        let s: Shape = shape::object().field("name", shape::string()).into();
        let out = validate(&s, &json!({"name": "a", "extra": 1})).unwrap();
        assert_eq!(out, json!({"name": "a"}));
    }

    #[test]
    fn strict_rejects_unknown_keys() {
        let s: Shape = shape::object().field("id", shape::string()).strict().into();
        let err = validate(&s, &json!({"id": "1", "x": 2, "y": 3})).unwrap_err();
        assert_eq!(err.errors().len(), 1);
        assert_eq!(err.errors()[0].code, "unrecognized_keys");
        assert_eq!(err.errors()[0].message, "Unrecognized key(s) in object: 'x', 'y'");
        assert!(err.errors()[0].path.is_empty());
    }

    #[test]
    fn passthrough_keeps_unknown_keys() {
        let s: Shape = shape::object().passthrough().into();
        assert_eq!(validate(&s, &json!({"a": 1})).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn aggregates_all_field_errors_in_order() {
        let s: Shape = shape::object()
            .field("name", shape::string())
            .field("email", shape::string().email())
            .field("password", shape::string().min(6))
            .into();
        let err = validate(&s, &json!({"email": "nope", "password": "abc"})).unwrap_err();
        let paths: Vec<_> = err.errors().iter().map(|e| e.path.clone()).collect();
        assert_eq!(
            paths,
            vec![
                vec![PathSegment::Key("name".into())],
                vec![PathSegment::Key("email".into())],
                vec![PathSegment::Key("password".into())],
            ]
        );
        assert_eq!(
            messages(Err(err)),
            ["Required", "Invalid email", "String must contain at least 6 character(s)"]
        );
    }

    #[test]
    fn optional_and_nullable() {
        let s: Shape = shape::object()
            .field("nick", shape::string().optional())
            .field("bio", shape::string().nullable())
            .into();
        assert_eq!(validate(&s, &json!({"bio": null})).unwrap(), json!({"bio": null}));
        assert_eq!(
            messages(validate(&s, &json!({"nick": null, "bio": "x"}))),
            ["Expected string, received null"]
        );
    }

    #[test]
    fn numbers_and_coercion() {
        let s: Shape = shape::number().int().positive().into();
        assert_eq!(validate(&s, &json!(3)).unwrap(), json!(3));
        assert_eq!(
            messages(validate(&s, &json!(0.5))),
            ["Expected integer, received float"]
        );
        assert_eq!(messages(validate(&s, &json!(0))), ["Number must be greater than 0"]);
        assert_eq!(messages(validate(&s, &json!("3"))), ["Expected number, received string"]);

        let coerced: Shape = shape::number().coerce().max(10.0).into();
        assert_eq!(validate(&coerced, &json!("7")).unwrap(), json!(7));
        assert_eq!(validate(&coerced, &json!("2.5")).unwrap(), json!(2.5));
        assert_eq!(
            messages(validate(&coerced, &json!("11"))),
            ["Number must be less than or equal to 10"]
        );
        assert_eq!(messages(validate(&coerced, &json!(""))), ["Expected number, received string"]);
    }

    #[test]
    fn booleans_coerce_from_strings() {
        let s: Shape = shape::boolean().coerce().into();
        assert_eq!(validate(&s, &json!("true")).unwrap(), json!(true));
        assert_eq!(validate(&s, &json!("0")).unwrap(), json!(false));
        assert!(validate(&s, &json!("yes")).is_err());
        assert!(validate(&shape::boolean().into(), &json!("true")).is_err());
    }

    #[test]
    fn arrays_report_bounds_and_item_paths() {
        let s: Shape = shape::array(shape::string()).max(2).into();
        let err = validate(&s, &json!(["a", 1, "c"])).unwrap_err();
        assert_eq!(err.errors()[0].message, "Array must contain at most 2 element(s)");
        assert_eq!(err.errors()[1].path, vec![PathSegment::Index(1)]);
    }

    #[test]
    fn nested_paths() {
        let s: Shape = shape::object()
            .field(
                "projects",
                shape::array(shape::object().field("id", shape::string())),
            )
            .into();
        let err = validate(&s, &json!({"projects": [{"id": "1"}, {"id": 2}]})).unwrap_err();
        assert_eq!(
            serde_json::to_value(&err.errors()[0]).unwrap(),
            json!({
                "code": "invalid_type",
                "path": ["projects", 1, "id"],
                "message": "Expected string, received number"
            })
        );
    }

    #[test]
    fn enums() {
        let s = shape::enumeration(["development", "production"]);
        assert!(validate(&s, &json!("production")).is_ok());
        assert_eq!(
            messages(validate(&s, &json!("staging"))),
            ["Invalid enum value. Expected 'development' | 'production', received 'staging'"]
        );
    }

    #[test]
    fn email_heuristics() {
        assert!(looks_like_email("a@b.co"));
        assert!(!looks_like_email("a@b"));
        assert!(!looks_like_email("@b.co"));
        assert!(!looks_like_email("a b@c.de"));
        assert!(!looks_like_email("a@b..c"));
        assert!(!looks_like_email("a@b.c"));
        assert!(!looks_like_email("a..b@x.com"));
        assert!(!looks_like_email(".a@x.com"));
        assert!(!looks_like_email("a.@x.com"));
        assert!(!looks_like_email("a@x.c0m"));
        assert!(!looks_like_email("a@-x.com"));
        assert!(looks_like_email("first.o'neil+tag@Mail.Example.ORG"));
    }
}

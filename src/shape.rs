//! Declarative field shapes.
//!
//! A [`Shape`] describes what an acceptable value looks like. Endpoints
//! declare one per input (params, query, body, files) and per output
//! (success data, failure data); the same description drives validation of
//! every request and every handler result.
//!
//! Shapes are built with the free functions in this module and refined with
//! builder methods, then frozen into the endpoint:
//!
//! ```rust
//! use apibase::shape::{self, ShapeExt};
//!
//! let body = shape::object()
//!     .field("name", shape::string().min(1))
//!     .field("email", shape::string().email())
//!     .field("age", shape::number().int().positive().optional())
//!     .field("tags", shape::array(shape::string()).max(5));
//! # let _ = body;
//! ```

/// A tagged description of an acceptable value.
#[derive(Clone, Debug, PartialEq)]
pub enum Shape {
    /// Anything, including absence.
    Any,
    Boolean(BooleanShape),
    String(StringShape),
    Number(NumberShape),
    /// One of a fixed set of strings.
    Enum(Vec<String>),
    /// The value may be missing.
    Optional(Box<Shape>),
    /// The value may be `null`.
    Nullable(Box<Shape>),
    Array(ArrayShape),
    Object(ObjectShape),
}

// ── Builders ─────────────────────────────────────────────────────────────────

pub fn any() -> Shape {
    Shape::Any
}

pub fn boolean() -> BooleanShape {
    BooleanShape::default()
}

pub fn string() -> StringShape {
    StringShape::default()
}

pub fn number() -> NumberShape {
    NumberShape::default()
}

pub fn enumeration<I, S>(values: I) -> Shape
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Shape::Enum(values.into_iter().map(Into::into).collect())
}

pub fn array(item: impl Into<Shape>) -> ArrayShape {
    ArrayShape { item: Box::new(item.into()), min: None, max: None }
}

pub fn object() -> ObjectShape {
    ObjectShape::default()
}

/// Wrappers available on every shape builder.
pub trait ShapeExt: Into<Shape> {
    fn optional(self) -> Shape {
        Shape::Optional(Box::new(self.into()))
    }

    fn nullable(self) -> Shape {
        Shape::Nullable(Box::new(self.into()))
    }
}

impl<T: Into<Shape>> ShapeExt for T {}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct BooleanShape {
    pub(crate) coerce: bool,
}

impl BooleanShape {
    /// Accept `"true"`, `"false"`, `"1"` and `"0"` as well as JSON booleans.
    pub fn coerce(mut self) -> Self {
        self.coerce = true;
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct StringShape {
    pub(crate) min: Option<usize>,
    pub(crate) max: Option<usize>,
    pub(crate) email: bool,
}

impl StringShape {
    /// Minimum length in characters.
    pub fn min(mut self, len: usize) -> Self {
        self.min = Some(len);
        self
    }

    /// Maximum length in characters.
    pub fn max(mut self, len: usize) -> Self {
        self.max = Some(len);
        self
    }

    pub fn email(mut self) -> Self {
        self.email = true;
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct NumberShape {
    pub(crate) int: bool,
    pub(crate) min: Option<Bound>,
    pub(crate) max: Option<Bound>,
    pub(crate) coerce: bool,
}

/// A numeric limit; `inclusive == false` is a strict comparison.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Bound {
    pub(crate) value: f64,
    pub(crate) inclusive: bool,
}

impl NumberShape {
    pub fn int(mut self) -> Self {
        self.int = true;
        self
    }

    pub fn min(mut self, value: f64) -> Self {
        self.min = Some(Bound { value, inclusive: true });
        self
    }

    pub fn max(mut self, value: f64) -> Self {
        self.max = Some(Bound { value, inclusive: true });
        self
    }

    /// Strictly greater than zero.
    pub fn positive(mut self) -> Self {
        self.min = Some(Bound { value: 0.0, inclusive: false });
        self
    }

    /// Accept decimal strings. Path and query values always arrive as
    /// strings, so numeric params need this.
    pub fn coerce(mut self) -> Self {
        self.coerce = true;
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ArrayShape {
    pub(crate) item: Box<Shape>,
    pub(crate) min: Option<usize>,
    pub(crate) max: Option<usize>,
}

impl ArrayShape {
    pub fn min(mut self, len: usize) -> Self {
        self.min = Some(len);
        self
    }

    pub fn max(mut self, len: usize) -> Self {
        self.max = Some(len);
        self
    }
}

/// What an object does with keys it does not declare.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum UnknownKeys {
    /// Drop them from the validated output.
    #[default]
    Strip,
    /// Reject the value.
    Strict,
    /// Keep them untouched.
    Passthrough,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObjectShape {
    pub(crate) fields: Vec<(String, Shape)>,
    pub(crate) unknown: UnknownKeys,
}

impl ObjectShape {
    /// Declares a field. Declaring the same name twice replaces the earlier shape.
    pub fn field(mut self, name: impl Into<String>, shape: impl Into<Shape>) -> Self {
        let name = name.into();
        let shape = shape.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = shape,
            None => self.fields.push((name, shape)),
        }
        self
    }

    pub fn strict(mut self) -> Self {
        self.unknown = UnknownKeys::Strict;
        self
    }

    pub fn passthrough(mut self) -> Self {
        self.unknown = UnknownKeys::Passthrough;
        self
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Shape)> {
        self.fields.iter().map(|(n, s)| (n.as_str(), s))
    }

    pub fn unknown_keys(&self) -> UnknownKeys {
        self.unknown
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl From<BooleanShape> for Shape {
    fn from(s: BooleanShape) -> Self {
        Shape::Boolean(s)
    }
}

impl From<StringShape> for Shape {
    fn from(s: StringShape) -> Self {
        Shape::String(s)
    }
}

impl From<NumberShape> for Shape {
    fn from(s: NumberShape) -> Self {
        Shape::Number(s)
    }
}

impl From<ArrayShape> for Shape {
    fn from(s: ArrayShape) -> Self {
        Shape::Array(s)
    }
}

impl From<ObjectShape> for Shape {
    fn from(s: ObjectShape) -> Self {
        Shape::Object(s)
    }
}

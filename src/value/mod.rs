//! Dynamically-kinded actual values.
//!
//! Every matcher receives a [`Value`]. Keeping the set of kinds closed lets
//! matchers report "wrong kind of value" as an error instead of failing to
//! compile or silently returning `false`:
//!
//! - [`Value`] - the tagged actual value
//! - [`Kind`] - the kind of a value, used in error messages
//! - [`Shape`] - borrowed view consumed by container and channel matchers
//! - [`ErrorValue`] - structural error with a cause chain
//! - [`format`] - rendering values for failure messages
//!
//! # Example
//!
//! ```rust
//! use testkit_poll::value::{Kind, Value};
//!
//! let v = Value::from(vec![1, 2, 3]);
//! assert_eq!(v.kind(), Kind::List);
//! assert_eq!(v, Value::from([1, 2, 3]));
//!
//! // Typed nils are distinct from untyped absence
//! assert!(Value::nil_list().is_nil());
//! assert_ne!(Value::nil_list(), Value::Nil);
//! ```

mod error_value;
pub mod format;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::chan::ChanHandle;
use crate::error::{Error, Result};

pub use error_value::{Chain, ErrorValue};

/// An actual value handed to a matcher.
#[derive(Clone, Debug)]
pub enum Value {
    /// Untyped absence.
    Nil,
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// An unsigned integer.
    Uint(u64),
    /// A floating point number.
    Float(f64),
    /// A string.
    Str(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// A sequence; `None` is a typed nil sequence.
    List(Option<Vec<Value>>),
    /// A string-keyed mapping; `None` is a typed nil mapping.
    Map(Option<BTreeMap<String, Value>>),
    /// A channel handle.
    Chan(ChanHandle),
    /// An error value.
    Err(ErrorValue),
    /// One level of indirection; `None` is a nil pointer.
    Ptr(Option<Arc<Value>>),
}

/// The kind of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// Untyped absence.
    Nil,
    /// Boolean.
    Bool,
    /// Signed integer.
    Int,
    /// Unsigned integer.
    Uint,
    /// Floating point.
    Float,
    /// String.
    Str,
    /// Raw bytes.
    Bytes,
    /// Sequence.
    List,
    /// Mapping.
    Map,
    /// Channel.
    Chan,
    /// Error.
    Error,
    /// Pointer.
    Ptr,
}

impl Kind {
    /// Short name used when rendering values.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Uint => "uint",
            Self::Float => "float",
            Self::Str => "string",
            Self::Bytes => "bytes",
            Self::List => "list",
            Self::Map => "map",
            Self::Chan => "chan",
            Self::Error => "error",
            Self::Ptr => "pointer",
        }
    }

    /// Whether a [`Value::Nil`] can stand in for a value of this kind.
    #[must_use]
    pub fn is_nillable(self) -> bool {
        matches!(
            self,
            Self::Nil | Self::List | Self::Map | Self::Chan | Self::Error | Self::Ptr
        )
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Borrowed classification of a value, resolved once per evaluation.
#[derive(Debug, Clone, Copy)]
pub enum Shape<'a> {
    /// Untyped absence.
    Absent,
    /// A scalar with no container semantics.
    Scalar(Kind),
    /// Text.
    Text(&'a str),
    /// Raw bytes.
    Bytes(&'a [u8]),
    /// A sequence, `None` if typed nil.
    Seq(Option<&'a [Value]>),
    /// A mapping, `None` if typed nil.
    Mapping(Option<&'a BTreeMap<String, Value>>),
    /// A channel.
    Channel(&'a ChanHandle),
    /// An error.
    Error(&'a ErrorValue),
    /// A pointer, `None` if nil.
    Pointer(Option<&'a Value>),
}

impl Value {
    /// A typed nil sequence.
    #[must_use]
    pub fn nil_list() -> Self {
        Self::List(None)
    }

    /// A typed nil mapping.
    #[must_use]
    pub fn nil_map() -> Self {
        Self::Map(None)
    }

    /// A nil pointer.
    #[must_use]
    pub fn nil_ptr() -> Self {
        Self::Ptr(None)
    }

    /// A pointer to `value`.
    #[must_use]
    pub fn ptr(value: impl Into<Value>) -> Self {
        Self::Ptr(Some(Arc::new(value.into())))
    }

    /// Raw bytes.
    #[must_use]
    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Bytes(bytes.into())
    }

    /// The kind of this value.
    #[must_use]
    pub fn kind(&self) -> Kind {
        match self {
            Self::Nil => Kind::Nil,
            Self::Bool(_) => Kind::Bool,
            Self::Int(_) => Kind::Int,
            Self::Uint(_) => Kind::Uint,
            Self::Float(_) => Kind::Float,
            Self::Str(_) => Kind::Str,
            Self::Bytes(_) => Kind::Bytes,
            Self::List(_) => Kind::List,
            Self::Map(_) => Kind::Map,
            Self::Chan(_) => Kind::Chan,
            Self::Err(_) => Kind::Error,
            Self::Ptr(_) => Kind::Ptr,
        }
    }

    /// Classify this value for container and channel matchers.
    #[must_use]
    pub fn shape(&self) -> Shape<'_> {
        match self {
            Self::Nil => Shape::Absent,
            Self::Str(s) => Shape::Text(s),
            Self::Bytes(b) => Shape::Bytes(b),
            Self::List(items) => Shape::Seq(items.as_deref()),
            Self::Map(entries) => Shape::Mapping(entries.as_ref()),
            Self::Chan(handle) => Shape::Channel(handle),
            Self::Err(err) => Shape::Error(err),
            Self::Ptr(target) => Shape::Pointer(target.as_deref()),
            Self::Bool(_) | Self::Int(_) | Self::Uint(_) | Self::Float(_) => {
                Shape::Scalar(self.kind())
            }
        }
    }

    /// Whether this is untyped absence or a typed nil.
    #[must_use]
    pub fn is_nil(&self) -> bool {
        match self {
            Self::Nil | Self::List(None) | Self::Map(None) | Self::Ptr(None) => true,
            Self::Chan(handle) => handle.is_nil(),
            _ => false,
        }
    }

    /// The error carried by this value, looking through one pointer.
    #[must_use]
    pub fn as_error(&self) -> Option<&ErrorValue> {
        match self {
            Self::Err(err) => Some(err),
            Self::Ptr(Some(target)) => match target.as_ref() {
                Self::Err(err) => Some(err),
                _ => None,
            },
            _ => None,
        }
    }

    /// The string carried by this value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The channel carried by this value.
    #[must_use]
    pub fn as_chan(&self) -> Option<&ChanHandle> {
        match self {
            Self::Chan(handle) => Some(handle),
            _ => None,
        }
    }

    /// Numeric view used by ordering matchers.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Uint(u) => Some(*u as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Descriptive type name, e.g. `string` or `<-chan string`.
    #[must_use]
    pub fn type_name(&self) -> String {
        match self {
            Self::Chan(handle) => handle.type_name(),
            Self::Err(err) => err.kind().to_string(),
            Self::Ptr(Some(target)) => format!("*{}", target.type_name()),
            Self::Ptr(None) => "*nil".to_string(),
            _ => self.kind().name().to_string(),
        }
    }
}

/// Number of elements in a container-like value.
///
/// Strings and bytes count bytes, typed nil containers are empty, channels
/// report how many values are buffered. Absence and scalars are errors.
pub(crate) fn length_of(value: &Value, matcher: &'static str) -> Result<usize> {
    match value.shape() {
        Shape::Text(s) => Ok(s.len()),
        Shape::Bytes(b) => Ok(b.len()),
        Shape::Seq(items) => Ok(items.map_or(0, <[Value]>::len)),
        Shape::Mapping(entries) => Ok(entries.map_or(0, BTreeMap::len)),
        Shape::Channel(handle) => Ok(handle.len()),
        Shape::Absent => Err(Error::type_mismatch(
            matcher,
            "a string, bytes, list, map, or channel",
            format::object(value, 1),
        )),
        Shape::Scalar(_) | Shape::Error(_) | Shape::Pointer(_) => {
            Err(Error::unsupported(matcher, format::object(value, 1)))
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Nil, Self::Nil) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Uint(a), Self::Uint(b)) => a == b,
            #[allow(clippy::float_cmp)]
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            (Self::Chan(a), Self::Chan(b)) => a.same_channel(b) && a.direction() == b.direction(),
            (Self::Err(a), Self::Err(b)) => a == b,
            (Self::Ptr(a), Self::Ptr(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format::repr(self))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

macro_rules! from_signed {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Self::Int(i64::from(v))
            }
        })*
    };
}

macro_rules! from_unsigned {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Self::Uint(u64::from(v))
            }
        })*
    };
}

from_signed!(i8, i16, i32, i64);
from_unsigned!(u8, u16, u32, u64);

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Self::Uint(v as u64)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Self::Str(v.clone())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Self::List(Some(v.into_iter().map(Into::into).collect()))
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(v: [T; N]) -> Self {
        Self::List(Some(v.into_iter().map(Into::into).collect()))
    }
}

impl<V: Into<Value>> From<BTreeMap<String, V>> for Value {
    fn from(v: BTreeMap<String, V>) -> Self {
        Self::Map(Some(v.into_iter().map(|(k, v)| (k, v.into())).collect()))
    }
}

impl<V: Into<Value>, S: std::hash::BuildHasher> From<HashMap<String, V, S>> for Value {
    fn from(v: HashMap<String, V, S>) -> Self {
        Self::Map(Some(v.into_iter().map(|(k, v)| (k, v.into())).collect()))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Nil, Into::into)
    }
}

impl From<ChanHandle> for Value {
    fn from(v: ChanHandle) -> Self {
        Self::Chan(v)
    }
}

impl From<&ChanHandle> for Value {
    fn from(v: &ChanHandle) -> Self {
        Self::Chan(v.clone())
    }
}

impl From<ErrorValue> for Value {
    fn from(v: ErrorValue) -> Self {
        Self::Err(v)
    }
}

impl From<&Value> for Value {
    fn from(v: &Value) -> Self {
        v.clone()
    }
}

//! Semantic value types and text coercion.
//!
//! Every argument and convar value belongs to a small closed set of kinds.
//! [`coerce`] is the single conversion rule used by both the binder and the
//! convar store.

use std::fmt;

use serde::Serialize;

use super::error::ConversionError;

/// Named enumeration: a value must be one of `variants` (matched case-insensitively).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumType {
    name: String,
    variants: Vec<String>,
}

impl EnumType {
    pub fn new<I, S>(name: impl Into<String>, variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            variants: variants.into_iter().map(Into::into).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn variants(&self) -> &[String] {
        &self.variants
    }

    /// Canonical spelling of `token` if it names a variant.
    pub fn lookup(&self, token: &str) -> Option<&str> {
        self.variants
            .iter()
            .find(|v| v.eq_ignore_ascii_case(token))
            .map(String::as_str)
    }
}

/// Target type of a parameter or convar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueKind {
    Integer,
    Float,
    Boolean,
    Enum(EnumType),
    Text,
    /// Sequence of raw strings; only produced for variadic parameters.
    List,
}

impl ValueKind {
    /// The type's empty/zero value, used when a convar assignment fails.
    pub fn zero(&self) -> Value {
        match self {
            ValueKind::Integer => Value::Integer(0),
            ValueKind::Float => Value::Float(0.0),
            ValueKind::Boolean => Value::Boolean(false),
            ValueKind::Enum(e) => Value::Enum(e.variants().first().cloned().unwrap_or_default()),
            ValueKind::Text => Value::Text(String::new()),
            ValueKind::List => Value::List(Vec::new()),
        }
    }

    /// Whether `value` is a legal inhabitant of this kind.
    pub fn admits(&self, value: &Value) -> bool {
        match (self, value) {
            (ValueKind::Integer, Value::Integer(_))
            | (ValueKind::Float, Value::Float(_))
            | (ValueKind::Boolean, Value::Boolean(_))
            | (ValueKind::Text, Value::Text(_))
            | (ValueKind::List, Value::List(_)) => true,
            (ValueKind::Enum(e), Value::Enum(v)) => e.variants().iter().any(|x| x == v),
            _ => false,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Integer => f.write_str("int"),
            ValueKind::Float => f.write_str("float"),
            ValueKind::Boolean => f.write_str("bool"),
            ValueKind::Enum(e) => f.write_str(e.name()),
            ValueKind::Text => f.write_str("string"),
            ValueKind::List => f.write_str("string..."),
        }
    }
}

/// A converted argument or convar value. Serializes as the bare JSON/YAML scalar.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    /// Canonical variant name.
    Enum(String),
    Text(String),
    List(Vec<String>),
}

impl Value {
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Integers widen to floats here; everything else is `None`.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(x) => Some(*x),
            Value::Integer(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Text or enum variant name.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) | Value::Enum(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Enum(s) | Value::Text(s) => f.write_str(s),
            Value::List(items) => f.write_str(&items.join(" ")),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

/// Convert a raw token into a value of `kind`.
///
/// - integer / float: standard numeric parse (surrounding whitespace ignored)
/// - boolean: `true|1|yes|y|on` and `false|0|no|n|off`, case-insensitive
/// - enum: variant name, case-insensitive, canonicalised
/// - text: pass-through
/// - list: whitespace-split
pub fn coerce(token: &str, kind: &ValueKind) -> Result<Value, ConversionError> {
    let fail = || ConversionError {
        token: token.to_string(),
        expected: kind.to_string(),
    };
    let trimmed = token.trim();
    match kind {
        ValueKind::Integer => trimmed.parse::<i64>().map(Value::Integer).map_err(|_| fail()),
        ValueKind::Float => trimmed.parse::<f64>().map(Value::Float).map_err(|_| fail()),
        ValueKind::Boolean => match trimmed.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "y" | "on" => Ok(Value::Boolean(true)),
            "false" | "0" | "no" | "n" | "off" => Ok(Value::Boolean(false)),
            _ => Err(fail()),
        },
        ValueKind::Enum(e) => e
            .lookup(trimmed)
            .map(|v| Value::Enum(v.to_string()))
            .ok_or_else(fail),
        ValueKind::Text => Ok(Value::Text(token.to_string())),
        ValueKind::List => Ok(Value::List(
            token.split_whitespace().map(str::to_string).collect(),
        )),
    }
}

/// Fit an already-typed value into `kind` without the lossy zero fallback.
/// Integers widen to floats; text matching a variant becomes that variant.
pub(crate) fn normalise(kind: &ValueKind, value: Value) -> Option<Value> {
    if kind.admits(&value) {
        return Some(value);
    }
    match (kind, &value) {
        (ValueKind::Float, Value::Integer(n)) => Some(Value::Float(*n as f64)),
        (ValueKind::Enum(_), Value::Text(s) | Value::Enum(s)) => coerce(s, kind).ok(),
        _ => None,
    }
}

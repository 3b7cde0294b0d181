use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A value flowing through ports, variables and contracts.
///
/// Records are opaque nested structures keyed by field name; enum literals
/// carry the name of the enumeration they belong to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Real(f64),
    Str(String),
    Enum {
        #[serde(rename = "enum")]
        type_name: String,
        literal: String,
    },
    Record(BTreeMap<String, Value>),
    /// Sentinel for "no value observed yet"
    Unknown,
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    pub fn enum_literal(type_name: impl Into<String>, literal: impl Into<String>) -> Self {
        Value::Enum {
            type_name: type_name.into(),
            literal: literal.into(),
        }
    }

    /// Build a record from `(field, value)` pairs
    pub fn record<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Value::Record(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Real(_))
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Value::Str(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Real(r) => Some(*r),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Read one field of a record
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Record(fields) => fields.get(name),
            _ => None,
        }
    }

    /// Human-readable label of the value's kind, used in error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "Boolean",
            Value::Int(_) => "Integer",
            Value::Real(_) => "Real",
            Value::Str(_) => "String",
            Value::Enum { .. } => "enum literal",
            Value::Record(_) => "record",
            Value::Unknown => "unknown",
        }
    }

    /// Equality used by `==` and `!=`: numbers compare by magnitude across
    /// integer and real, enum literals without a resolved type compare by
    /// literal only, everything else is structural.
    pub fn loosely_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_numeric() && b.is_numeric() => a.as_f64() == b.as_f64(),
            (
                Value::Enum { type_name: ta, literal: la },
                Value::Enum { type_name: tb, literal: lb },
            ) => la == lb && (ta.is_empty() || tb.is_empty() || ta == tb),
            (Value::Record(a), Value::Record(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).map_or(false, |w| v.loosely_equals(w)))
            }
            (a, b) => a == b,
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            // Whole reals keep one decimal so 25.0 never prints as the integer 25
            Value::Real(r) if r.is_finite() && r.fract() == 0.0 => write!(f, "{:.1}", r),
            Value::Real(r) => write!(f, "{}", r),
            Value::Str(s) => write!(f, "\"{}\"", s),
            Value::Enum { type_name, literal } if type_name.is_empty() => write!(f, "{}", literal),
            Value::Enum { type_name, literal } => write!(f, "{}::{}", type_name, literal),
            Value::Record(fields) => {
                write!(f, "{{")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} = {}", name, value)?;
                }
                write!(f, "}}")
            }
            Value::Unknown => write!(f, "unknown"),
        }
    }
}

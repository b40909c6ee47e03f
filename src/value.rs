use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Supported value types for runtime condition evaluation and annotation
/// property comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// A 64-bit signed integer.
    Int(i64),
    /// A 64-bit floating-point number.
    Float(f64),
    /// A boolean value.
    Bool(bool),
    /// A UTF-8 string.
    String(String),
    /// An ordered list of values, as produced by `(a, b, c)` literals.
    List(Vec<Value>),
}

impl Value {
    /// Loose equality: int/float cross-type comparison is permitted, lists
    /// compare element-wise.
    #[must_use]
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
            }
            _ => self.partial_cmp_value(other) == Some(Ordering::Equal),
        }
    }

    /// Strict equality: both operands must be the same variant and equal.
    #[must_use]
    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.strict_eq(y))
            }
            _ => false,
        }
    }

    /// Returns the list elements if this value is a list.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Ordering between two values. `None` for incompatible types or
    /// unsupported operations (e.g. ordering lists).
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn partial_cmp_value(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Bool(a), Value::Bool(b)) => {
                // Only equality comparisons are meaningful for bools
                Some(a.cmp(b))
            }
            (Value::String(a), Value::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "\"{v}\""),
            Value::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_conversions() {
        assert_eq!(Value::from(42_i64), Value::Int(42));
        assert_eq!(Value::from(3.5_f64), Value::Float(3.5));
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from("hello"), Value::String("hello".to_owned()));
    }

    #[test]
    fn display() {
        assert_eq!(Value::Int(42).to_string(), "42");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::String("hello".into()).to_string(), "\"hello\"");
        assert_eq!(
            Value::List(vec![Value::Int(1), Value::Int(2)]).to_string(),
            "(1, 2)"
        );
    }

    #[test]
    fn loose_eq_cross_type_int_float() {
        assert!(Value::Int(10).loose_eq(&Value::Float(10.0)));
        assert!(Value::Float(10.0).loose_eq(&Value::Int(10)));
        assert!(!Value::Int(10).loose_eq(&Value::Float(10.5)));
    }

    #[test]
    fn strict_eq_rejects_cross_type() {
        assert!(!Value::Int(10).strict_eq(&Value::Float(10.0)));
        assert!(Value::Int(10).strict_eq(&Value::Int(10)));
        assert!(!Value::Bool(true).strict_eq(&Value::Int(1)));
    }

    #[test]
    fn ordering() {
        assert_eq!(
            Value::Int(10).partial_cmp_value(&Value::Int(20)),
            Some(Ordering::Less)
        );
        assert_eq!(
            Value::String("apple".into()).partial_cmp_value(&Value::String("banana".into())),
            Some(Ordering::Less)
        );
        assert_eq!(
            Value::Int(1).partial_cmp_value(&Value::String("hello".into())),
            None
        );
    }

    #[test]
    fn list_equality() {
        let a = Value::List(vec![Value::Int(1), Value::Float(2.0)]);
        let b = Value::List(vec![Value::Float(1.0), Value::Int(2)]);
        assert!(a.loose_eq(&b));
        assert!(!a.strict_eq(&b));
    }

    #[test]
    fn as_list() {
        assert!(Value::Int(1).as_list().is_none());
        let list = Value::List(vec![Value::Int(1)]);
        assert_eq!(list.as_list(), Some(&[Value::Int(1)][..]));
    }
}

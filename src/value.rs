use serde::{Deserialize, Serialize};
use std::fmt;

/// Runtime values flowing through data ports and token-local stores.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<Value>),
}

impl Value {
    /// The narrowest declared type that describes this value.
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Null => ValueType::Any,
            Value::Bool(_) => ValueType::Bool,
            Value::Int(_) => ValueType::Int,
            Value::Float(_) => ValueType::Float,
            Value::Text(_) => ValueType::Text,
            Value::List(_) => ValueType::List(Box::new(ValueType::Any)),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view of the value, accepting both integer and float representations.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Converts the value so it fits a port declared as `target`.
    ///
    /// Only the conversions accepted by [`ValueType::is_assignable_to`] are performed;
    /// anything else returns `None`. `Null` fits every type.
    pub fn coerce(self, target: &ValueType) -> Option<Value> {
        match (self, target) {
            (Value::Null, _) => Some(Value::Null),
            (v, ValueType::Any) => Some(v),
            (Value::Bool(b), ValueType::Bool) => Some(Value::Bool(b)),
            (Value::Bool(b), ValueType::Int) => Some(Value::Int(b as i64)),
            (Value::Bool(b), ValueType::Float) => Some(Value::Float(if b { 1.0 } else { 0.0 })),
            (Value::Int(i), ValueType::Int) => Some(Value::Int(i)),
            (Value::Int(i), ValueType::Float) => Some(Value::Float(i as f64)),
            (Value::Float(f), ValueType::Float) => Some(Value::Float(f)),
            (Value::Float(f), ValueType::Int) if f.is_finite() => Some(Value::Int(f.trunc() as i64)),
            (Value::Text(s), ValueType::Text) => Some(Value::Text(s)),
            (Value::List(items), ValueType::List(inner)) => items
                .into_iter()
                .map(|item| item.coerce(inner))
                .collect::<Option<Vec<_>>>()
                .map(Value::List),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
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

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<&serde_json::Value> for Value {
    fn from(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Text(s.clone()),
            serde_json::Value::Array(items) => Value::List(items.iter().map(Value::from).collect()),
            // Objects have no runtime representation; keep their JSON text.
            serde_json::Value::Object(_) => Value::Text(json.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(n) => {
                if n.fract() == 0.0 && n.is_finite() {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::Text(s) => write!(f, "{}", s),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// The declared type of a data port.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    #[default]
    Any,
    Bool,
    Int,
    Float,
    Text,
    List(Box<ValueType>),
}

impl ValueType {
    fn is_numeric(&self) -> bool {
        matches!(self, ValueType::Bool | ValueType::Int | ValueType::Float)
    }

    /// Whether a value declared as `self` may flow into a port declared as `target`.
    ///
    /// Accepted: exact match, anything into `Any`, a list into a list whose element
    /// type accepts the source element type, and conversions between the numeric
    /// types (`Bool` only widens, it is never a conversion target).
    pub fn is_assignable_to(&self, target: &ValueType) -> bool {
        match (self, target) {
            (a, b) if a == b => true,
            (_, ValueType::Any) => true,
            (ValueType::List(from), ValueType::List(to)) => from.is_assignable_to(to),
            (from, ValueType::Int | ValueType::Float) => from.is_numeric(),
            _ => false,
        }
    }

    /// Parses the type names used in flow definitions (`"float"`, `"list<int>"`, ...).
    pub fn parse(name: &str) -> Option<ValueType> {
        let name = name.trim();
        let lower = name.to_ascii_lowercase();
        if let Some(inner) = lower
            .strip_prefix("list<")
            .and_then(|rest| rest.strip_suffix('>'))
        {
            return ValueType::parse(inner).map(|t| ValueType::List(Box::new(t)));
        }
        match lower.as_str() {
            "any" | "object" => Some(ValueType::Any),
            "bool" | "boolean" => Some(ValueType::Bool),
            "int" | "integer" => Some(ValueType::Int),
            "float" | "number" => Some(ValueType::Float),
            "text" | "string" => Some(ValueType::Text),
            "list" => Some(ValueType::List(Box::new(ValueType::Any))),
            _ => None,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Any => write!(f, "any"),
            ValueType::Bool => write!(f, "bool"),
            ValueType::Int => write!(f, "int"),
            ValueType::Float => write!(f, "float"),
            ValueType::Text => write!(f, "text"),
            ValueType::List(inner) => write!(f, "list<{}>", inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assignability_rules() {
        assert!(ValueType::Int.is_assignable_to(&ValueType::Int));
        assert!(ValueType::Text.is_assignable_to(&ValueType::Any));
        assert!(ValueType::Int.is_assignable_to(&ValueType::Float));
        assert!(ValueType::Float.is_assignable_to(&ValueType::Int));
        assert!(ValueType::Bool.is_assignable_to(&ValueType::Float));
        assert!(!ValueType::Float.is_assignable_to(&ValueType::Bool));
        assert!(!ValueType::Text.is_assignable_to(&ValueType::Int));
        assert!(!ValueType::Any.is_assignable_to(&ValueType::Int));

        let ints = ValueType::List(Box::new(ValueType::Int));
        let anys = ValueType::List(Box::new(ValueType::Any));
        assert!(ints.is_assignable_to(&anys));
        assert!(!anys.is_assignable_to(&ints));
    }

    #[test]
    fn test_coerce_numeric() {
        assert_eq!(Value::Int(3).coerce(&ValueType::Float), Some(Value::Float(3.0)));
        assert_eq!(Value::Float(2.9).coerce(&ValueType::Int), Some(Value::Int(2)));
        assert_eq!(Value::Bool(true).coerce(&ValueType::Int), Some(Value::Int(1)));
        assert_eq!(Value::Text("x".into()).coerce(&ValueType::Int), None);
        assert_eq!(Value::Null.coerce(&ValueType::Text), Some(Value::Null));
    }

    #[test]
    fn test_parse_type_names() {
        assert_eq!(ValueType::parse("number"), Some(ValueType::Float));
        assert_eq!(
            ValueType::parse("list<int>"),
            Some(ValueType::List(Box::new(ValueType::Int)))
        );
        assert_eq!(ValueType::parse("object"), Some(ValueType::Any));
        assert_eq!(ValueType::parse("vector3"), None);
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Float(42.0).to_string(), "42");
        assert_eq!(Value::Float(1.5).to_string(), "1.5");
        assert_eq!(
            Value::List(vec![Value::Int(1), Value::Text("a".into())]).to_string(),
            "[1, a]"
        );
    }
}

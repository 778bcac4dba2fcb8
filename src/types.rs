/// Shared types used across the codebase

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One row of a procedure result set, keyed by column name
pub type Row = Map<String, Value>;

/// An ordered sequence of rows produced by one SELECT inside a procedure
pub type ResultSet = Vec<Row>;

/// Positional argument passed to a stored procedure.
/// Procedures only ever receive scalars; structured values are sent as JSON text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CallArg {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
}

impl CallArg {
    pub fn is_null(&self) -> bool {
        matches!(self, CallArg::Null)
    }
}

impl From<&Value> for CallArg {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => CallArg::Null,
            Value::Bool(b) => CallArg::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    CallArg::Int(i)
                } else if let Some(u) = n.as_u64() {
                    CallArg::UInt(u)
                } else {
                    CallArg::Float(n.as_f64().unwrap_or_default())
                }
            }
            Value::String(s) => CallArg::Text(s.clone()),
            // Arrays and objects travel as their JSON encoding
            Value::Array(_) | Value::Object(_) => CallArg::Text(value.to_string()),
        }
    }
}

/// Loose truthiness used by the result protocol: MySQL reports TRUE as 1,
/// so numbers and strings need to count as well as booleans.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

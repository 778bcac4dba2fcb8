use jsonschema::error::ValidationErrorKind;
use jsonschema::Validator;
use serde::Serialize;
use serde_json::{Map, Number, Value};
use std::fmt;
use std::sync::Arc;

use super::node::{ObjectSchema, SchemaNode};

/// One failed check, addressed by a dotted path into the validated value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
}

/// JSON Schema validator compiled from one section's object schema
#[derive(Clone)]
pub struct SectionValidator {
    validator: Arc<Validator>,
}

impl fmt::Debug for SectionValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SectionValidator").finish_non_exhaustive()
    }
}

impl SectionValidator {
    /// Formats (`email`, `uuid`, `date`, ...) are asserted, not just annotated
    pub fn compile(object: &ObjectSchema) -> Result<Self, String> {
        let validator = jsonschema::options()
            .should_validate_formats(true)
            .build(&object.to_json_schema())
            .map_err(|e| e.to_string())?;

        Ok(Self {
            validator: Arc::new(validator),
        })
    }

    /// Every failure in `value`, with paths prefixed by `root`
    pub fn issues(&self, root: &str, value: &Value) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        for error in self.validator.iter_errors(value) {
            let path = dotted(root, &error.instance_path().to_string(), value);
            match error.kind() {
                ValidationErrorKind::Required { property } => issues.push(ValidationIssue {
                    path: child(&path, property.as_str().unwrap_or_default()),
                    message: "is required".to_string(),
                }),
                ValidationErrorKind::AdditionalProperties { unexpected } => {
                    issues.extend(unexpected.iter().map(|key| ValidationIssue {
                        path: child(&path, key),
                        message: "is not an allowed property".to_string(),
                    }))
                }
                _ => issues.push(ValidationIssue {
                    path,
                    message: error.to_string(),
                }),
            }
        }
        issues
    }
}

fn child(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}

/// Render a JSON pointer as `root.user.tags[1]`, using the value to tell
/// array indices from object keys
fn dotted(root: &str, pointer: &str, value: &Value) -> String {
    let mut path = root.to_string();
    let mut current = Some(value);

    for token in pointer.split('/').skip(1) {
        let token = token.replace("~1", "/").replace("~0", "~");
        current = match current {
            Some(Value::Array(items)) => {
                path.push_str(&format!("[{}]", token));
                token.parse::<usize>().ok().and_then(|i| items.get(i))
            }
            Some(Value::Object(map)) => {
                path = child(&path, &token);
                map.get(&token)
            }
            _ => {
                path = child(&path, &token);
                None
            }
        };
    }
    path
}

impl ObjectSchema {
    pub fn coerce(&self, value: Value) -> Value {
        match value {
            Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| {
                        let v = match self.get(&k) {
                            Some(schema) => schema.coerce(v),
                            None => v,
                        };
                        (k, v)
                    })
                    .collect::<Map<_, _>>(),
            ),
            other => other,
        }
    }
}

impl SchemaNode {
    /// Convert text inputs (query, path, header values) to the scalar types
    /// the schema declares. Values that do not convert are left untouched so
    /// validation reports them.
    pub fn coerce(&self, value: Value) -> Value {
        match (self, value) {
            (SchemaNode::Number(_), Value::String(s)) => parse_number(&s).unwrap_or(Value::String(s)),
            (SchemaNode::Integer(_), Value::String(s)) => match s.trim().parse::<i64>() {
                Ok(i) => Value::from(i),
                Err(_) => Value::String(s),
            },
            (SchemaNode::Boolean, Value::String(s)) => match s.as_str() {
                "true" | "1" => Value::Bool(true),
                "false" | "0" => Value::Bool(false),
                _ => Value::String(s),
            },
            (SchemaNode::Null, Value::String(s)) if s.is_empty() => Value::Null,
            (SchemaNode::Literal(expected), Value::String(s)) => {
                if !expected.is_string() && expected.to_string() == s {
                    expected.clone()
                } else {
                    Value::String(s)
                }
            }
            (SchemaNode::Array(array), Value::Array(items)) => {
                Value::Array(items.into_iter().map(|v| array.items.coerce(v)).collect())
            }
            // A single query value where a list is expected
            (SchemaNode::Array(array), v @ (Value::String(_) | Value::Number(_) | Value::Bool(_))) => {
                Value::Array(vec![array.items.coerce(v)])
            }
            (SchemaNode::Object(object), v) => object.coerce(v),
            // First member that converts the value wins
            (SchemaNode::Union(branches), v) => {
                let converted = branches
                    .iter()
                    .map(|branch| branch.coerce(v.clone()))
                    .find(|coerced| *coerced != v);
                converted.unwrap_or(v)
            }
            (SchemaNode::Nullable(_), Value::Null) => Value::Null,
            (SchemaNode::Optional(inner) | SchemaNode::Nullable(inner), v) => inner.coerce(v),
            (SchemaNode::Custom { schema, .. }, v) => schema.coerce(v),
            (_, v) => v,
        }
    }
}

fn parse_number(s: &str) -> Option<Value> {
    let s = s.trim();
    if let Ok(i) = s.parse::<i64>() {
        return Some(Value::from(i));
    }
    s.parse::<f64>().ok().and_then(Number::from_f64).map(Value::Number)
}

//! Reshapes the result sets of one procedure call into a reply
//!
//! A procedure may lead with a sentinel result set whose first row carries a
//! truthy `#RESULT#` column. That row is the envelope: `status`, `error`,
//! `success`, `message` and `schema`. `schema` is a comma separated list of
//! shape tags matched positionally against the result sets that follow:
//! `object` unwraps a set to its first row, any other tag keeps the rows.

use serde_json::{Map, Value};

use crate::types::{is_truthy, ResultSet, Row};

pub const RESULT_MARKER: &str = "#RESULT#";

#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: u16,
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultEnvelope {
    pub status: Option<u16>,
    pub error: bool,
    pub success: bool,
    pub message: Option<Value>,
    pub schema: Option<Vec<String>>,
}

impl ResultEnvelope {
    fn from_row(row: &Row) -> Self {
        let error = row.get("error").map(is_truthy).unwrap_or(false);
        let success = row.get("success").map(is_truthy).unwrap_or(!error);
        let message = row.get("message").filter(|m| !m.is_null()).cloned();

        let schema = row
            .get("schema")
            .and_then(Value::as_str)
            .map(|s| {
                s.split(',')
                    .map(|tag| tag.trim().to_string())
                    .collect::<Vec<_>>()
            })
            .filter(|tags| tags.iter().any(|tag| !tag.is_empty()));

        Self {
            status: row.get("status").and_then(status_code),
            error,
            success,
            message,
            schema,
        }
    }

    pub fn status(&self) -> u16 {
        match self.status {
            Some(status) => status,
            None if self.error => 400,
            None => 200,
        }
    }
}

/// MySQL hands numbers back as numbers or numeric strings depending on the
/// column type; anything outside the HTTP range is ignored
fn status_code(value: &Value) -> Option<u16> {
    let code = match value {
        Value::Number(n) => n.as_u64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    u16::try_from(code).ok().filter(|c| (100..=999).contains(c))
}

/// Remove and decode the sentinel set, if the first set is one
pub fn take_envelope(result_sets: &mut Vec<ResultSet>) -> Option<ResultEnvelope> {
    let first = result_sets.first()?.first()?;
    if !first.get(RESULT_MARKER).map(is_truthy).unwrap_or(false) {
        return None;
    }
    let envelope = ResultEnvelope::from_row(first);
    result_sets.remove(0);
    Some(envelope)
}

pub fn demultiplex(mut result_sets: Vec<ResultSet>) -> Reply {
    let Some(envelope) = take_envelope(&mut result_sets) else {
        return Reply {
            status: 200,
            payload: verbatim(result_sets),
        };
    };

    let status = envelope.status();

    let payload = match &envelope.schema {
        Some(tags) => shaped(tags, result_sets),
        None if envelope.error => {
            let mut body = Map::new();
            body.insert("error".into(), Value::Bool(true));
            body.insert("success".into(), Value::Bool(envelope.success));
            if let Some(message) = envelope.message {
                body.insert("message".into(), message);
            }
            Value::Object(body)
        }
        None => verbatim(result_sets),
    };

    Reply { status, payload }
}

/// One set comes back as its rows; zero or several as a list of sets
fn verbatim(mut result_sets: Vec<ResultSet>) -> Value {
    if result_sets.len() == 1 {
        rows(result_sets.remove(0))
    } else {
        Value::Array(result_sets.into_iter().map(rows).collect())
    }
}

fn shaped(tags: &[String], result_sets: Vec<ResultSet>) -> Value {
    let mut sets = result_sets.into_iter();
    let mut values: Vec<Value> = tags
        .iter()
        .map(|tag| match sets.next() {
            Some(set) if tag == "object" => set.into_iter().next().map(Value::Object).unwrap_or(Value::Null),
            Some(set) => rows(set),
            None => Value::Null,
        })
        .collect();

    if values.len() == 1 {
        values.remove(0)
    } else {
        Value::Array(values)
    }
}

fn rows(set: ResultSet) -> Value {
    Value::Array(set.into_iter().map(Value::Object).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn set(value: Value) -> ResultSet {
        value
            .as_array()
            .unwrap()
            .iter()
            .map(|row| row.as_object().unwrap().clone())
            .collect()
    }

    #[test]
    fn no_sentinel_returns_rows_unchanged() {
        let reply = demultiplex(vec![set(json!([{ "id": 1 }, { "id": 2 }]))]);
        assert_eq!(reply.status, 200);
        assert_eq!(reply.payload, json!([{ "id": 1 }, { "id": 2 }]));
    }

    #[test]
    fn no_sentinel_several_sets_is_list_of_sets() {
        let reply = demultiplex(vec![set(json!([{ "a": 1 }])), set(json!([]))]);
        assert_eq!(reply.payload, json!([[{ "a": 1 }], []]));
        assert_eq!(demultiplex(vec![]).payload, json!([]));
    }

    #[test]
    fn error_envelope_without_schema() {
        let reply = demultiplex(vec![set(json!([{
            "#RESULT#": true, "error": true, "status": 410, "message": "gone"
        }]))]);
        assert_eq!(reply.status, 410);
        assert_eq!(reply.payload, json!({ "error": true, "success": false, "message": "gone" }));
    }

    #[test]
    fn error_without_status_is_400() {
        let reply = demultiplex(vec![set(json!([{ "#RESULT#": 1, "error": 1 }]))]);
        assert_eq!(reply.status, 400);
        assert_eq!(reply.payload, json!({ "error": true, "success": false }));
    }

    #[test]
    fn schema_pair_is_ordered_tuple() {
        let reply = demultiplex(vec![
            set(json!([{ "#RESULT#": true, "error": false, "schema": "object,array" }])),
            set(json!([{ "a": 1 }])),
            set(json!([{ "b": 1 }, { "b": 2 }])),
        ]);
        assert_eq!(reply.status, 200);
        assert_eq!(reply.payload, json!([{ "a": 1 }, [{ "b": 1 }, { "b": 2 }]]));
    }

    #[test]
    fn single_object_descriptor_unwraps() {
        let reply = demultiplex(vec![
            set(json!([{ "#RESULT#": true, "error": false, "schema": "object" }])),
            set(json!([{ "a": 1 }])),
        ]);
        assert_eq!(reply.payload, json!({ "a": 1 }));
    }

    #[test]
    fn missing_sets_are_null_and_extra_sets_dropped() {
        let reply = demultiplex(vec![
            set(json!([{ "#RESULT#": true, "schema": "object,object" }])),
            set(json!([])),
        ]);
        assert_eq!(reply.payload, json!([null, null]));

        let reply = demultiplex(vec![
            set(json!([{ "#RESULT#": true, "schema": "array" }])),
            set(json!([{ "a": 1 }])),
            set(json!([{ "b": 1 }])),
        ]);
        assert_eq!(reply.payload, json!([{ "a": 1 }]));
    }

    #[test]
    fn success_envelope_without_schema_keeps_sets() {
        let reply = demultiplex(vec![
            set(json!([{ "#RESULT#": true, "error": false, "status": "201" }])),
            set(json!([{ "id": 9 }])),
        ]);
        assert_eq!(reply.status, 201);
        assert_eq!(reply.payload, json!([{ "id": 9 }]));
    }

    #[test]
    fn falsy_marker_is_plain_data() {
        let reply = demultiplex(vec![set(json!([{ "#RESULT#": 0, "error": true }]))]);
        assert_eq!(reply.status, 200);
        assert_eq!(reply.payload, json!([{ "#RESULT#": 0, "error": true }]));
    }
}

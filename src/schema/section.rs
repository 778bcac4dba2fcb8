use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::error::SectionError;
use super::node::{ObjectSchema, SchemaNode};
use super::validate::{SectionValidator, ValidationIssue};

/// HTTP input section a parameter schema validates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Querystring,
    Params,
    Body,
    Headers,
}

impl Section {
    pub const ALL: [Section; 4] = [Section::Querystring, Section::Params, Section::Body, Section::Headers];

    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Querystring => "querystring",
            Section::Params => "params",
            Section::Body => "body",
            Section::Headers => "headers",
        }
    }

    /// Sections whose values arrive as text and need coercion
    pub fn is_textual(&self) -> bool {
        !matches!(self, Section::Body)
    }
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Object schema of one section plus the validator compiled from it
#[derive(Debug, Clone)]
struct SectionSchema {
    object: ObjectSchema,
    validator: SectionValidator,
}

/// Request schema of one route: an object schema per input section, keyed
/// by parameter alias. Built once at compile time, read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct CompiledSchema {
    sections: BTreeMap<Section, SectionSchema>,
}

impl PartialEq for CompiledSchema {
    fn eq(&self, other: &Self) -> bool {
        self.sections.len() == other.sections.len()
            && self
                .sections
                .iter()
                .zip(&other.sections)
                .all(|((a, x), (b, y))| a == b && x.object == y.object)
    }
}

impl CompiledSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one parameter's node into its section and recompile that
    /// section's validator. Header names are case-insensitive and stored
    /// lowercased.
    pub fn insert(&mut self, section: Section, alias: &str, node: SchemaNode) -> Result<(), SectionError> {
        let key = match section {
            Section::Headers => alias.to_ascii_lowercase(),
            _ => alias.to_string(),
        };

        let mut object = self
            .sections
            .get(&section)
            .map(|s| s.object.clone())
            .unwrap_or_default();
        object
            .insert(key.clone(), node)
            .map_err(|_| SectionError::DuplicateAlias(key))?;
        let validator = SectionValidator::compile(&object).map_err(SectionError::Rejected)?;

        self.sections.insert(section, SectionSchema { object, validator });
        Ok(())
    }

    pub fn section(&self, section: Section) -> Option<&ObjectSchema> {
        self.sections.get(&section).map(|s| &s.object)
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn to_json_schema(&self) -> Value {
        let mut map = Map::new();
        for (section, schema) in &self.sections {
            map.insert(section.as_str().to_string(), schema.object.to_json_schema());
        }
        Value::Object(map)
    }

    /// Coerce (for textual sections) and validate one input section. The
    /// returned value is what the handler should read from. Issue paths are
    /// prefixed with the section name.
    pub fn check(&self, section: Section, value: Value) -> Result<Value, Vec<ValidationIssue>> {
        let Some(schema) = self.sections.get(&section) else {
            return Ok(value);
        };

        // A missing body validates like an empty one
        let value = match value {
            Value::Null if section == Section::Body => Value::Object(Map::new()),
            other => other,
        };
        let value = if section.is_textual() {
            schema.object.coerce(value)
        } else {
            value
        };

        let issues = schema.validator.issues(section.as_str(), &value);
        if issues.is_empty() {
            Ok(value)
        } else {
            Err(issues)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::node::NumberRules;
    use serde_json::json;

    #[test]
    fn headers_are_keyed_lowercase() {
        let mut schema = CompiledSchema::new();
        schema.insert(Section::Headers, "X-Tenant", SchemaNode::Any).unwrap();
        assert!(schema.section(Section::Headers).unwrap().get("x-tenant").is_some());
    }

    #[test]
    fn duplicate_alias_in_section_is_rejected() {
        let mut schema = CompiledSchema::new();
        schema.insert(Section::Body, "id", SchemaNode::Any).unwrap();
        assert!(schema.insert(Section::Body, "id", SchemaNode::Any).is_err());
        assert!(schema.insert(Section::Querystring, "id", SchemaNode::Any).is_ok());
    }

    #[test]
    fn check_coerces_textual_sections_only() {
        let mut schema = CompiledSchema::new();
        schema
            .insert(Section::Querystring, "page", SchemaNode::Integer(NumberRules::default()))
            .unwrap();
        schema
            .insert(Section::Body, "count", SchemaNode::Integer(NumberRules::default()))
            .unwrap();

        assert_eq!(
            schema.check(Section::Querystring, json!({ "page": "3" })).unwrap(),
            json!({ "page": 3 })
        );

        let issues = schema.check(Section::Body, json!({ "count": "3" })).unwrap_err();
        assert_eq!(issues[0].path, "body.count");
    }

    #[test]
    fn missing_body_reports_required_fields() {
        let mut schema = CompiledSchema::new();
        schema.insert(Section::Body, "name", SchemaNode::Any).unwrap();
        let issues = schema.check(Section::Body, Value::Null).unwrap_err();
        assert_eq!(issues[0].path, "body.name");
        assert_eq!(issues[0].message, "is required");
    }

    #[test]
    fn reports_every_failing_field() {
        let mut schema = CompiledSchema::new();
        schema
            .insert(Section::Querystring, "page", SchemaNode::Integer(NumberRules::default()))
            .unwrap();
        schema.insert(Section::Querystring, "sort", SchemaNode::Boolean).unwrap();

        let issues = schema
            .check(Section::Querystring, json!({ "page": "two", "sort": "maybe" }))
            .unwrap_err();
        let mut paths: Vec<&str> = issues.iter().map(|i| i.path.as_str()).collect();
        paths.sort();
        assert_eq!(paths, vec!["querystring.page", "querystring.sort"]);
    }

    #[test]
    fn equality_follows_the_declared_shape() {
        let mut a = CompiledSchema::new();
        let mut b = CompiledSchema::new();
        a.insert(Section::Body, "id", SchemaNode::Any).unwrap();
        b.insert(Section::Body, "id", SchemaNode::Any).unwrap();
        assert_eq!(a, b);

        b.insert(Section::Body, "name", SchemaNode::Any).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn sections_without_schema_pass_through() {
        let schema = CompiledSchema::new();
        assert_eq!(schema.check(Section::Params, json!({ "x": "1" })).unwrap(), json!({ "x": "1" }));
    }
}

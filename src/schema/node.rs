//! Validation node tree produced by the schema compiler

use regex::Regex;
use serde_json::{json, Map, Value};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    String(StringRules),
    Number(NumberRules),
    Integer(NumberRules),
    Boolean,
    Null,
    Any,
    Literal(Value),
    Array(ArraySchema),
    Object(ObjectSchema),
    Union(Vec<SchemaNode>),
    /// May be absent from the enclosing object
    Optional(Box<SchemaNode>),
    /// May be `null`
    Nullable(Box<SchemaNode>),
    /// Node produced by a registered custom validator
    Custom { name: String, schema: Box<SchemaNode> },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StringRules {
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub pattern: Option<Pattern>,
    pub format: Option<StringFormat>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NumberRules {
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub exclusive_minimum: Option<f64>,
    pub exclusive_maximum: Option<f64>,
    pub multiple_of: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArraySchema {
    pub items: Box<SchemaNode>,
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
    pub unique_items: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub schema: SchemaNode,
}

/// Object schema with properties kept in declaration order
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectSchema {
    pub properties: Vec<Property>,
    pub additional_properties: bool,
}

impl Default for ObjectSchema {
    fn default() -> Self {
        Self {
            properties: Vec::new(),
            additional_properties: true,
        }
    }
}

impl ObjectSchema {
    pub fn get(&self, name: &str) -> Option<&SchemaNode> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.schema)
    }

    /// Add a property; returns the node back if the name is already taken
    pub fn insert(&mut self, name: impl Into<String>, schema: SchemaNode) -> Result<(), SchemaNode> {
        let name = name.into();
        if self.get(&name).is_some() {
            return Err(schema);
        }
        self.properties.push(Property { name, schema });
        Ok(())
    }

    pub fn required(&self) -> impl Iterator<Item = &str> {
        self.properties
            .iter()
            .filter(|p| !p.schema.is_optional())
            .map(|p| p.name.as_str())
    }

    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for property in &self.properties {
            properties.insert(property.name.clone(), property.schema.to_json_schema());
        }

        let mut schema = json!({ "type": "object", "properties": properties });
        let required: Vec<&str> = self.required().collect();
        if !required.is_empty() {
            schema["required"] = json!(required);
        }
        if !self.additional_properties {
            schema["additionalProperties"] = json!(false);
        }
        schema
    }
}

/// Regex source checked for syntax when the schema is compiled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    source: String,
}

impl Pattern {
    pub fn new(source: impl Into<String>) -> Result<Self, regex::Error> {
        let source = source.into();
        Regex::new(&source)?;
        Ok(Self { source })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringFormat {
    Email,
    Uuid,
    Date,
    DateTime,
    Uri,
}

impl StringFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            StringFormat::Email => "email",
            StringFormat::Uuid => "uuid",
            StringFormat::Date => "date",
            StringFormat::DateTime => "date-time",
            StringFormat::Uri => "uri",
        }
    }
}

impl std::str::FromStr for StringFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "email" => StringFormat::Email,
            "uuid" => StringFormat::Uuid,
            "date" => StringFormat::Date,
            "date-time" => StringFormat::DateTime,
            "uri" => StringFormat::Uri,
            other => return Err(format!("unsupported format '{}'", other)),
        })
    }
}

impl SchemaNode {
    pub fn is_optional(&self) -> bool {
        matches!(self, SchemaNode::Optional(_))
    }

    /// Short name used in diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            SchemaNode::String(_) => "string",
            SchemaNode::Number(_) => "number",
            SchemaNode::Integer(_) => "integer",
            SchemaNode::Boolean => "boolean",
            SchemaNode::Null => "null",
            SchemaNode::Any => "any",
            SchemaNode::Literal(_) => "literal",
            SchemaNode::Array(_) => "array",
            SchemaNode::Object(_) => "object",
            SchemaNode::Union(_) => "union",
            SchemaNode::Optional(_) => "optional",
            SchemaNode::Nullable(_) => "nullable",
            SchemaNode::Custom { .. } => "custom",
        }
    }

    /// Structural sanity check run after compilation and on every custom
    /// validator at registration time.
    pub fn check(&self) -> Result<(), String> {
        match self {
            SchemaNode::String(rules) => check_range("minLength", rules.min_length, "maxLength", rules.max_length),
            SchemaNode::Number(rules) | SchemaNode::Integer(rules) => {
                if let (Some(min), Some(max)) = (rules.minimum, rules.maximum) {
                    if min > max {
                        return Err(format!("minimum {} exceeds maximum {}", min, max));
                    }
                }
                match rules.multiple_of {
                    Some(m) if m <= 0.0 => Err(format!("multipleOf must be positive, got {}", m)),
                    _ => Ok(()),
                }
            }
            SchemaNode::Boolean | SchemaNode::Null | SchemaNode::Any | SchemaNode::Literal(_) => Ok(()),
            SchemaNode::Array(array) => {
                check_range("minItems", array.min_items, "maxItems", array.max_items)?;
                array.items.check()
            }
            SchemaNode::Object(object) => {
                for (i, property) in object.properties.iter().enumerate() {
                    if object.properties[..i].iter().any(|p| p.name == property.name) {
                        return Err(format!("duplicate property '{}'", property.name));
                    }
                    property
                        .schema
                        .check()
                        .map_err(|e| format!("{}: {}", property.name, e))?;
                }
                Ok(())
            }
            SchemaNode::Union(branches) => {
                if branches.is_empty() {
                    return Err("union needs at least one member".to_string());
                }
                branches.iter().try_for_each(SchemaNode::check)
            }
            SchemaNode::Optional(inner) | SchemaNode::Nullable(inner) => inner.check(),
            SchemaNode::Custom { schema, .. } => schema.check(),
        }
    }

    pub fn to_json_schema(&self) -> Value {
        match self {
            SchemaNode::String(rules) => {
                let mut schema = json!({ "type": "string" });
                if let Some(v) = rules.min_length {
                    schema["minLength"] = json!(v);
                }
                if let Some(v) = rules.max_length {
                    schema["maxLength"] = json!(v);
                }
                if let Some(p) = &rules.pattern {
                    schema["pattern"] = json!(p.as_str());
                }
                if let Some(f) = rules.format {
                    schema["format"] = json!(f.as_str());
                }
                schema
            }
            SchemaNode::Number(rules) => number_schema("number", rules),
            SchemaNode::Integer(rules) => number_schema("integer", rules),
            SchemaNode::Boolean => json!({ "type": "boolean" }),
            SchemaNode::Null => json!({ "type": "null" }),
            SchemaNode::Any => json!({}),
            SchemaNode::Literal(v) => json!({ "const": v }),
            SchemaNode::Array(array) => {
                let mut schema = json!({ "type": "array", "items": array.items.to_json_schema() });
                if let Some(v) = array.min_items {
                    schema["minItems"] = json!(v);
                }
                if let Some(v) = array.max_items {
                    schema["maxItems"] = json!(v);
                }
                if array.unique_items {
                    schema["uniqueItems"] = json!(true);
                }
                schema
            }
            SchemaNode::Object(object) => object.to_json_schema(),
            SchemaNode::Union(branches) => {
                json!({ "anyOf": branches.iter().map(SchemaNode::to_json_schema).collect::<Vec<_>>() })
            }
            // Optionality is expressed by the parent's `required` list
            SchemaNode::Optional(inner) => inner.to_json_schema(),
            SchemaNode::Nullable(inner) => {
                json!({ "anyOf": [inner.to_json_schema(), { "type": "null" }] })
            }
            SchemaNode::Custom { name, schema } => {
                let mut rendered = schema.to_json_schema();
                if let Value::Object(map) = &mut rendered {
                    map.insert("x-validator".to_string(), json!(name));
                }
                rendered
            }
        }
    }
}

fn check_range(min_name: &str, min: Option<usize>, max_name: &str, max: Option<usize>) -> Result<(), String> {
    match (min, max) {
        (Some(min), Some(max)) if min > max => {
            Err(format!("{} {} exceeds {} {}", min_name, min, max_name, max))
        }
        _ => Ok(()),
    }
}

fn number_schema(kind: &str, rules: &NumberRules) -> Value {
    let mut schema = json!({ "type": kind });
    let keywords = [
        ("minimum", rules.minimum),
        ("maximum", rules.maximum),
        ("exclusiveMinimum", rules.exclusive_minimum),
        ("exclusiveMaximum", rules.exclusive_maximum),
        ("multipleOf", rules.multiple_of),
    ];
    for (keyword, value) in keywords {
        if let Some(v) = value {
            schema[keyword] = json!(v);
        }
    }
    schema
}

impl fmt::Display for SchemaNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json_schema())
    }
}

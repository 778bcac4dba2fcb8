use serde_json::{Map, Value};

use super::custom::CustomValidators;
use super::error::SchemaError;
use super::node::{
    ArraySchema, NumberRules, ObjectSchema, Pattern, SchemaNode, StringFormat, StringRules,
};
use super::parser::{parse, Expr};

/// Evaluates schema expressions against the `Type` builders and a custom
/// validator registry. Those two namespaces are all an expression can reach.
pub struct SchemaCompiler<'a> {
    validators: &'a CustomValidators,
}

impl<'a> SchemaCompiler<'a> {
    pub fn new(validators: &'a CustomValidators) -> Self {
        Self { validators }
    }

    pub fn compile(&self, source: &str) -> Result<SchemaNode, SchemaError> {
        let expr = parse(source)?;
        let node = self.build(&expr)?;
        node.check().map_err(SchemaError::IllFormed)?;
        Ok(node)
    }

    fn build(&self, expr: &Expr) -> Result<SchemaNode, SchemaError> {
        match expr {
            Expr::Call { namespace, name, args, .. } => match namespace.as_str() {
                "Type" => self.builder(name, args),
                "Custom" => {
                    if !args.is_empty() {
                        return Err(SchemaError::InvalidArguments {
                            builder: format!("Custom.{}", name),
                            reason: "custom validators take no arguments".to_string(),
                        });
                    }
                    self.validators.resolve(name)
                }
                other => Err(SchemaError::UnknownNamespace(other.to_string())),
            },
            Expr::Object(_) => Err(expected_schema("an object literal")),
            Expr::Array(_) => Err(expected_schema("an array literal")),
            Expr::Literal(v) => Err(expected_schema(&format!("literal {}", v))),
        }
    }

    fn builder(&self, name: &str, args: &[Expr]) -> Result<SchemaNode, SchemaError> {
        let args = Args { builder: name, args };

        match name {
            "String" => {
                args.arity(0, 1)?;
                string_rules(&args, args.options(0)?).map(SchemaNode::String)
            }
            "Number" => {
                args.arity(0, 1)?;
                number_rules(&args, args.options(0)?).map(SchemaNode::Number)
            }
            "Integer" => {
                args.arity(0, 1)?;
                number_rules(&args, args.options(0)?).map(SchemaNode::Integer)
            }
            "Boolean" => args.arity(0, 0).map(|_| SchemaNode::Boolean),
            "Null" => args.arity(0, 0).map(|_| SchemaNode::Null),
            "Any" => args.arity(0, 0).map(|_| SchemaNode::Any),
            "Literal" => {
                args.arity(1, 1)?;
                match literal_value(&args.args[0]) {
                    Some(v) if !v.is_array() && !v.is_object() => Ok(SchemaNode::Literal(v)),
                    _ => Err(args.invalid("expects a string, number, boolean or null")),
                }
            }
            "Enum" => {
                args.arity(1, 1)?;
                let Expr::Array(items) = &args.args[0] else {
                    return Err(args.invalid("expects an array of literal values"));
                };
                if items.is_empty() {
                    return Err(args.invalid("needs at least one value"));
                }
                items
                    .iter()
                    .map(|item| match literal_value(item) {
                        Some(v) if !v.is_array() && !v.is_object() => Ok(SchemaNode::Literal(v)),
                        _ => Err(args.invalid("expects an array of literal values")),
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(SchemaNode::Union)
            }
            "Array" => {
                args.arity(1, 2)?;
                let items = self.build(&args.args[0])?;
                array_schema(&args, items, args.options(1)?).map(SchemaNode::Array)
            }
            "Object" => {
                args.arity(1, 2)?;
                let Expr::Object(entries) = &args.args[0] else {
                    return Err(args.invalid("expects an object of property schemas"));
                };
                let mut object = ObjectSchema::default();
                for (key, value) in entries {
                    let schema = self.build(value)?;
                    if object.insert(key.clone(), schema).is_err() {
                        return Err(args.invalid(&format!("duplicate property '{}'", key)));
                    }
                }
                for (option, value) in args.options(1)? {
                    match option.as_str() {
                        "additionalProperties" => {
                            object.additional_properties = args.boolean(&option, &value)?
                        }
                        _ => return Err(args.unknown_option(&option)),
                    }
                }
                Ok(SchemaNode::Object(object))
            }
            "Union" => {
                args.arity(1, 1)?;
                let Expr::Array(members) = &args.args[0] else {
                    return Err(args.invalid("expects an array of schemas"));
                };
                members
                    .iter()
                    .map(|m| self.build(m))
                    .collect::<Result<Vec<_>, _>>()
                    .map(SchemaNode::Union)
            }
            "Optional" => {
                args.arity(1, 1)?;
                Ok(SchemaNode::Optional(Box::new(self.build(&args.args[0])?)))
            }
            "Nullable" => {
                args.arity(1, 1)?;
                Ok(SchemaNode::Nullable(Box::new(self.build(&args.args[0])?)))
            }
            other => Err(SchemaError::UnknownBuilder(other.to_string())),
        }
    }
}

fn expected_schema(found: &str) -> SchemaError {
    SchemaError::Expected {
        expected: "a Type.* or Custom.* call".to_string(),
        found: found.to_string(),
        offset: 0,
    }
}

/// Convert an expression made only of literals into a JSON value
fn literal_value(expr: &Expr) -> Option<Value> {
    match expr {
        Expr::Literal(v) => Some(v.clone()),
        Expr::Array(items) => items.iter().map(literal_value).collect::<Option<Vec<_>>>().map(Value::Array),
        Expr::Object(entries) => {
            let mut map = Map::new();
            for (key, value) in entries {
                map.insert(key.clone(), literal_value(value)?);
            }
            Some(Value::Object(map))
        }
        Expr::Call { .. } => None,
    }
}

struct Args<'e> {
    builder: &'e str,
    args: &'e [Expr],
}

impl<'e> Args<'e> {
    fn invalid(&self, reason: &str) -> SchemaError {
        SchemaError::InvalidArguments {
            builder: self.builder.to_string(),
            reason: reason.to_string(),
        }
    }

    fn unknown_option(&self, option: &str) -> SchemaError {
        SchemaError::UnknownOption {
            builder: self.builder.to_string(),
            option: option.to_string(),
        }
    }

    fn arity(&self, min: usize, max: usize) -> Result<(), SchemaError> {
        let n = self.args.len();
        if n < min || n > max {
            let expected = if min == max {
                format!("expects {} argument(s), got {}", min, n)
            } else {
                format!("expects {} to {} arguments, got {}", min, max, n)
            };
            return Err(self.invalid(&expected));
        }
        Ok(())
    }

    /// Options object at position `index`, empty when absent
    fn options(&self, index: usize) -> Result<Vec<(String, Value)>, SchemaError> {
        match self.args.get(index) {
            None => Ok(Vec::new()),
            Some(expr @ Expr::Object(_)) => match literal_value(expr) {
                Some(Value::Object(map)) => Ok(map.into_iter().collect()),
                _ => Err(self.invalid("options must contain only literal values")),
            },
            Some(_) => Err(self.invalid("options must be an object literal")),
        }
    }

    fn count(&self, option: &str, value: &Value) -> Result<usize, SchemaError> {
        value
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| self.invalid(&format!("{} must be a non-negative integer", option)))
    }

    fn number(&self, option: &str, value: &Value) -> Result<f64, SchemaError> {
        value
            .as_f64()
            .ok_or_else(|| self.invalid(&format!("{} must be a number", option)))
    }

    fn boolean(&self, option: &str, value: &Value) -> Result<bool, SchemaError> {
        value
            .as_bool()
            .ok_or_else(|| self.invalid(&format!("{} must be a boolean", option)))
    }

    fn string<'v>(&self, option: &str, value: &'v Value) -> Result<&'v str, SchemaError> {
        value
            .as_str()
            .ok_or_else(|| self.invalid(&format!("{} must be a string", option)))
    }
}

fn string_rules(args: &Args, options: Vec<(String, Value)>) -> Result<StringRules, SchemaError> {
    let mut rules = StringRules::default();
    for (option, value) in options {
        match option.as_str() {
            "minLength" => rules.min_length = Some(args.count(&option, &value)?),
            "maxLength" => rules.max_length = Some(args.count(&option, &value)?),
            "pattern" => {
                let source = args.string(&option, &value)?;
                let pattern = Pattern::new(source)
                    .map_err(|e| args.invalid(&format!("invalid pattern: {}", e)))?;
                rules.pattern = Some(pattern);
            }
            "format" => {
                let format: StringFormat = args
                    .string(&option, &value)?
                    .parse()
                    .map_err(|e: String| args.invalid(&e))?;
                rules.format = Some(format);
            }
            _ => return Err(args.unknown_option(&option)),
        }
    }
    Ok(rules)
}

fn number_rules(args: &Args, options: Vec<(String, Value)>) -> Result<NumberRules, SchemaError> {
    let mut rules = NumberRules::default();
    for (option, value) in options {
        let n = args.number(&option, &value);
        match option.as_str() {
            "minimum" => rules.minimum = Some(n?),
            "maximum" => rules.maximum = Some(n?),
            "exclusiveMinimum" => rules.exclusive_minimum = Some(n?),
            "exclusiveMaximum" => rules.exclusive_maximum = Some(n?),
            "multipleOf" => rules.multiple_of = Some(n?),
            _ => return Err(args.unknown_option(&option)),
        }
    }
    Ok(rules)
}

fn array_schema(args: &Args, items: SchemaNode, options: Vec<(String, Value)>) -> Result<ArraySchema, SchemaError> {
    let mut array = ArraySchema {
        items: Box::new(items),
        min_items: None,
        max_items: None,
        unique_items: false,
    };
    for (option, value) in options {
        match option.as_str() {
            "minItems" => array.min_items = Some(args.count(&option, &value)?),
            "maxItems" => array.max_items = Some(args.count(&option, &value)?),
            "uniqueItems" => array.unique_items = args.boolean(&option, &value)?,
            _ => return Err(args.unknown_option(&option)),
        }
    }
    Ok(array)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn compile(source: &str) -> Result<SchemaNode, SchemaError> {
        let validators = CustomValidators::with_builtins().unwrap();
        SchemaCompiler::new(&validators).compile(source)
    }

    #[test]
    fn compiles_object_with_options() {
        let node = compile(
            "Type.Object({
                name: Type.String({ minLength: 1, maxLength: 40 }),
                age: Type.Optional(Type.Integer({ minimum: 0 })),
                email: Custom.email(),
            }, { additionalProperties: false })",
        )
        .unwrap();

        assert_eq!(
            node.to_json_schema(),
            json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string", "minLength": 1, "maxLength": 40 },
                    "age": { "type": "integer", "minimum": 0.0 },
                    "email": { "type": "string", "format": "email", "maxLength": 254, "x-validator": "email" }
                },
                "required": ["name", "email"],
                "additionalProperties": false
            })
        );
    }

    #[test]
    fn enum_is_union_of_literals() {
        assert_eq!(
            compile("Type.Enum(['asc', 'desc'])").unwrap(),
            SchemaNode::Union(vec![
                SchemaNode::Literal(json!("asc")),
                SchemaNode::Literal(json!("desc")),
            ])
        );
    }

    #[test]
    fn unknown_validator_names_the_validator() {
        assert_eq!(
            compile("Type.Array(Custom.zipcode())").unwrap_err(),
            SchemaError::UnknownValidator("zipcode".to_string())
        );
    }

    #[test]
    fn only_type_and_custom_are_reachable() {
        assert_eq!(
            compile("process.exit()").unwrap_err(),
            SchemaError::UnknownNamespace("process".to_string())
        );
        assert_eq!(
            compile("Type.Function()").unwrap_err(),
            SchemaError::UnknownBuilder("Function".to_string())
        );
    }

    #[test]
    fn rejects_unknown_options_and_bad_values() {
        assert!(matches!(
            compile("Type.String({ minLen: 3 })"),
            Err(SchemaError::UnknownOption { ref option, .. }) if option == "minLen"
        ));
        assert!(matches!(
            compile("Type.String({ minLength: 'three' })"),
            Err(SchemaError::InvalidArguments { .. })
        ));
        assert!(matches!(
            compile("Type.String({ pattern: '(' })"),
            Err(SchemaError::InvalidArguments { .. })
        ));
        assert!(matches!(
            compile("Type.String({ format: 'ipv9' })"),
            Err(SchemaError::InvalidArguments { .. })
        ));
    }

    #[test]
    fn rejects_bare_literals_and_ill_formed_nodes() {
        assert!(matches!(compile("'hello'"), Err(SchemaError::Expected { .. })));
        assert!(matches!(
            compile("Type.Integer({ minimum: 10, maximum: 1 })"),
            Err(SchemaError::IllFormed(_))
        ));
        assert!(matches!(compile("Type.Union([])"), Err(SchemaError::IllFormed(_))));
    }

    #[test]
    fn compilation_is_deterministic() {
        let source = "Type.Union([Type.Literal(1), Type.Nullable(Custom.slug())])";
        assert_eq!(compile(source).unwrap(), compile(source).unwrap());
    }
}

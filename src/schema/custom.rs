//! Registry of named custom validators reachable as `Custom.<name>()`

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use super::compile::SchemaCompiler;
use super::error::{RegistryError, SchemaError};
use super::node::{Pattern, SchemaNode, StringFormat, StringRules};

/// Zero-argument factory producing the validator's schema node
pub type ValidatorFactory = Arc<dyn Fn() -> Result<SchemaNode, SchemaError> + Send + Sync>;

/// File extension of validator definitions in a validators directory
pub const VALIDATOR_EXTENSION: &str = "schema";

#[derive(Clone, Default)]
pub struct CustomValidators {
    factories: BTreeMap<String, ValidatorFactory>,
}

impl fmt::Debug for CustomValidators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomValidators")
            .field("names", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl CustomValidators {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `email`, `uuid` and `slug`
    pub fn with_builtins() -> Result<Self, RegistryError> {
        let mut validators = Self::new();
        validators.register("email", || {
            Ok(SchemaNode::String(StringRules {
                format: Some(StringFormat::Email),
                max_length: Some(254),
                ..Default::default()
            }))
        })?;
        validators.register("uuid", || {
            Ok(SchemaNode::String(StringRules {
                format: Some(StringFormat::Uuid),
                ..Default::default()
            }))
        })?;
        validators.register("slug", || {
            let pattern = Pattern::new("^[a-z0-9]+(?:-[a-z0-9]+)*$").map_err(|e| SchemaError::InvalidArguments {
                builder: "String".to_string(),
                reason: e.to_string(),
            })?;
            Ok(SchemaNode::String(StringRules {
                min_length: Some(1),
                pattern: Some(pattern),
                ..Default::default()
            }))
        })?;
        Ok(validators)
    }

    /// Register a validator after self-testing its factory once
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> Result<(), RegistryError>
    where
        F: Fn() -> Result<SchemaNode, SchemaError> + Send + Sync + 'static,
    {
        let name = name.into();
        if !is_identifier(&name) {
            return Err(RegistryError::InvalidName(name));
        }
        if self.factories.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }

        let node = factory().map_err(|source| RegistryError::SelfTest {
            name: name.clone(),
            source,
        })?;
        node.check().map_err(|reason| RegistryError::SelfTest {
            name: name.clone(),
            source: SchemaError::IllFormed(reason),
        })?;

        tracing::debug!("Registered custom validator '{}' ({})", name, node.kind());
        self.factories.insert(name, Arc::new(factory));
        Ok(())
    }

    /// Load every `<name>.schema` file in `dir`. Each file holds one schema
    /// expression; it may use `Type` builders and validators registered
    /// before the directory was loaded.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize, RegistryError> {
        let io_error = |source| RegistryError::Io {
            path: dir.display().to_string(),
            source,
        };

        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(io_error)? {
            let path = entry.map_err(io_error)?.path();
            if path.extension().and_then(|e| e.to_str()) == Some(VALIDATOR_EXTENSION) {
                files.push(path);
            }
        }
        files.sort();

        // Compile all files against the registry as it was before loading
        let base = self.clone();
        let compiler = SchemaCompiler::new(&base);
        let mut loaded = 0;

        for path in files {
            let name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();
            let source = std::fs::read_to_string(&path).map_err(|source| RegistryError::Io {
                path: path.display().to_string(),
                source,
            })?;

            let node = compiler
                .compile(&source)
                .map_err(|source| RegistryError::SelfTest { name: name.clone(), source })?;
            self.register(name, move || Ok(node.clone()))?;
            loaded += 1;
        }

        tracing::info!("Loaded {} custom validators from {}", loaded, dir.display());
        Ok(loaded)
    }

    /// Build the validator's node, wrapped so it stays identifiable
    pub fn resolve(&self, name: &str) -> Result<SchemaNode, SchemaError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| SchemaError::UnknownValidator(name.to_string()))?;
        Ok(SchemaNode::Custom {
            name: name.to_string(),
            schema: Box::new(factory()?),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::node::NumberRules;

    #[test]
    fn builtins_pass_self_test() {
        let validators = CustomValidators::with_builtins().unwrap();
        assert_eq!(validators.names().collect::<Vec<_>>(), vec!["email", "slug", "uuid"]);
        assert!(matches!(validators.resolve("slug"), Ok(SchemaNode::Custom { .. })));
    }

    #[test]
    fn rejects_duplicate_registration() {
        let mut validators = CustomValidators::new();
        validators.register("flag", || Ok(SchemaNode::Boolean)).unwrap();
        let err = validators.register("flag", || Ok(SchemaNode::Boolean)).unwrap_err();
        assert!(matches!(err, RegistryError::Duplicate(name) if name == "flag"));
    }

    #[test]
    fn rejects_ill_formed_factory() {
        let mut validators = CustomValidators::new();
        let err = validators
            .register("percent", || {
                Ok(SchemaNode::Number(NumberRules {
                    minimum: Some(100.0),
                    maximum: Some(0.0),
                    ..Default::default()
                }))
            })
            .unwrap_err();
        assert!(matches!(err, RegistryError::SelfTest { ref name, .. } if name == "percent"));
        assert!(!validators.contains("percent"));
    }

    #[test]
    fn rejects_failing_factory() {
        let mut validators = CustomValidators::new();
        let err = validators
            .register("broken", || Err(SchemaError::IllFormed("not a schema".into())))
            .unwrap_err();
        assert!(matches!(err, RegistryError::SelfTest { .. }));
    }

    #[test]
    fn rejects_names_unusable_in_expressions() {
        let mut validators = CustomValidators::new();
        let err = validators.register("zip-code", || Ok(SchemaNode::Any)).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidName(_)));
    }

    #[test]
    fn unknown_validator_is_reported_by_name() {
        let validators = CustomValidators::new();
        assert_eq!(
            validators.resolve("nope").unwrap_err(),
            SchemaError::UnknownValidator("nope".to_string())
        );
    }
}

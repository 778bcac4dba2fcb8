use thiserror::Error;

/// Errors raised while compiling a schema expression
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("empty schema expression")]
    Empty,

    #[error("unexpected character '{ch}' at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },

    #[error("unterminated string starting at offset {offset}")]
    UnterminatedString { offset: usize },

    #[error("invalid number '{text}' at offset {offset}")]
    InvalidNumber { text: String, offset: usize },

    #[error("expected {expected} at offset {offset}, found {found}")]
    Expected {
        expected: String,
        found: String,
        offset: usize,
    },

    #[error("unknown namespace '{0}' (expected Type or Custom)")]
    UnknownNamespace(String),

    #[error("unknown builder Type.{0}")]
    UnknownBuilder(String),

    #[error("unknown validator '{0}'")]
    UnknownValidator(String),

    #[error("Type.{builder}: {reason}")]
    InvalidArguments { builder: String, reason: String },

    #[error("unknown option '{option}' for Type.{builder}")]
    UnknownOption { builder: String, option: String },

    #[error("ill-formed schema: {0}")]
    IllFormed(String),
}

/// Errors raised while loading the custom validator registry
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("validator '{0}' is registered twice")]
    Duplicate(String),

    #[error("'{0}' is not a valid validator name")]
    InvalidName(String),

    #[error("validator '{name}' failed its self-test: {source}")]
    SelfTest {
        name: String,
        #[source]
        source: SchemaError,
    },

    #[error("failed to read validators from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while merging a parameter into a section schema
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SectionError {
    #[error("alias '{0}' is used twice")]
    DuplicateAlias(String),

    #[error("schema rejected by the validator: {0}")]
    Rejected(String),
}

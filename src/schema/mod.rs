//! Schema expression language
//!
//! Parameter schemas are written in procedure comments as small builder
//! expressions (`Type.Object({ id: Type.Integer() })`). They are parsed by a
//! dedicated interpreter that only understands the `Type` builders and
//! registered `Custom` validators, so comment text can never reach anything
//! else in the process.

pub mod compile;
pub mod custom;
pub mod error;
pub mod lexer;
pub mod node;
pub mod parser;
pub mod section;
pub mod validate;

pub use compile::SchemaCompiler;
pub use custom::{CustomValidators, ValidatorFactory};
pub use error::{RegistryError, SchemaError, SectionError};
pub use node::{ArraySchema, NumberRules, ObjectSchema, Pattern, Property, SchemaNode, StringFormat, StringRules};
pub use section::{CompiledSchema, Section};
pub use validate::{SectionValidator, ValidationIssue};

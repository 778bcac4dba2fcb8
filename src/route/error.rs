use std::fmt;
use thiserror::Error;

use crate::metadata::MetadataError;
use crate::schema::{SchemaError, Section};

use super::naming::{HttpMethod, NamingError};

/// Guard or hook registered under a name that is already taken
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("{kind} '{name}' is registered twice")]
    Duplicate { kind: &'static str, name: String },
}

/// A procedure that cannot become a route. Every variant names the procedure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error("procedure '{procedure}': {source}")]
    Naming {
        procedure: String,
        #[source]
        source: NamingError,
    },

    #[error("procedure '{procedure}': {source}")]
    Metadata {
        procedure: String,
        #[source]
        source: MetadataError,
    },

    #[error("procedure '{procedure}': malformed @param name '{raw}'")]
    InvalidParamName { procedure: String, raw: String },

    #[error("procedure '{procedure}': parameter '{parameter}' has unknown source '{source_name}'")]
    UnknownSource {
        procedure: String,
        parameter: String,
        source_name: String,
    },

    #[error("procedure '{procedure}': @param '{parameter}' is not a declared parameter")]
    UndeclaredParameter { procedure: String, parameter: String },

    #[error("procedure '{procedure}': parameter '{parameter}' is documented twice")]
    DuplicateBinding { procedure: String, parameter: String },

    #[error("procedure '{procedure}': parameter '{parameter}' has no @param binding")]
    MissingBinding { procedure: String, parameter: String },

    #[error("procedure '{procedure}': parameter '{parameter}': {source}")]
    Schema {
        procedure: String,
        parameter: String,
        #[source]
        source: SchemaError,
    },

    #[error("procedure '{procedure}': alias '{alias}' is used twice in {section}")]
    DuplicateAlias {
        procedure: String,
        section: Section,
        alias: String,
    },

    #[error("procedure '{procedure}': parameter '{parameter}' reads path parameter '{alias}' which is not in the path")]
    PathParamMismatch {
        procedure: String,
        parameter: String,
        alias: String,
    },

    #[error("procedure '{procedure}': unknown guard '{guard}'")]
    UnknownGuard { procedure: String, guard: String },

    #[error("procedure '{procedure}': guard '{guard}': {reason}")]
    InvalidGuardArgs {
        procedure: String,
        guard: String,
        reason: String,
    },

    #[error("procedure '{procedure}': unknown hook phase '{phase}'")]
    UnknownHookPhase { procedure: String, phase: String },

    #[error("procedure '{procedure}': hook phase '{phase}' is declared twice")]
    DuplicateHookPhase { procedure: String, phase: String },

    #[error("procedure '{procedure}': unknown hook '{hook}' in phase '{phase}'")]
    UnknownHook {
        procedure: String,
        phase: String,
        hook: String,
    },

    #[error("procedure '{procedure}': {method} {path} is already served by '{existing}'")]
    DuplicateRoute {
        procedure: String,
        existing: String,
        method: HttpMethod,
        path: String,
    },

    /// Same path shape under different parameter names, e.g. `/users/:id` and `/users/:user_id`
    #[error("procedure '{procedure}': path {path} conflicts with {existing_path} of '{existing}'")]
    ConflictingPath {
        procedure: String,
        existing: String,
        existing_path: String,
        path: String,
    },
}

impl CompileError {
    pub fn procedure(&self) -> &str {
        match self {
            CompileError::Naming { procedure, .. }
            | CompileError::Metadata { procedure, .. }
            | CompileError::InvalidParamName { procedure, .. }
            | CompileError::UnknownSource { procedure, .. }
            | CompileError::UndeclaredParameter { procedure, .. }
            | CompileError::DuplicateBinding { procedure, .. }
            | CompileError::MissingBinding { procedure, .. }
            | CompileError::Schema { procedure, .. }
            | CompileError::DuplicateAlias { procedure, .. }
            | CompileError::PathParamMismatch { procedure, .. }
            | CompileError::UnknownGuard { procedure, .. }
            | CompileError::InvalidGuardArgs { procedure, .. }
            | CompileError::UnknownHookPhase { procedure, .. }
            | CompileError::DuplicateHookPhase { procedure, .. }
            | CompileError::UnknownHook { procedure, .. }
            | CompileError::DuplicateRoute { procedure, .. }
            | CompileError::ConflictingPath { procedure, .. } => procedure,
        }
    }
}

/// Every compile error found in a catalog, in procedure order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompileErrors(pub Vec<CompileError>);

impl CompileErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompileError> {
        self.0.iter()
    }
}

impl fmt::Display for CompileErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} compile error(s)", self.0.len())?;
        for err in &self.0 {
            write!(f, "\n  {}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for CompileErrors {}

impl From<CompileError> for CompileErrors {
    fn from(err: CompileError) -> Self {
        CompileErrors(vec![err])
    }
}

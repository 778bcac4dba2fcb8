use serde::Serialize;
use thiserror::Error;

use crate::database::DatabaseError;
use crate::error::ApiError;

/// Kind segment of a signalled application error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AppErrorKind {
    /// Flat business error
    General,
    /// Validation error pointing at one field
    Field,
}

/// Application error raised by a procedure with
/// `SIGNAL SQLSTATE '45000' SET MESSAGE_TEXT = 'status|type|code|message[|field]'`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppError {
    pub status: u16,
    pub kind: AppErrorKind,
    pub code: String,
    pub message: String,
    pub field: Option<String>,
}

impl AppError {
    /// `None` when the text does not follow the convention
    pub fn parse(text: &str) -> Option<Self> {
        let mut parts = text.splitn(5, '|');
        let status: u16 = parts.next()?.trim().parse().ok()?;
        if !(100..=599).contains(&status) {
            return None;
        }
        let kind = match parts.next()?.trim() {
            "general" => AppErrorKind::General,
            "field" => AppErrorKind::Field,
            _ => return None,
        };
        let code = parts.next()?.trim().to_string();
        let message = parts.next()?.trim().to_string();
        let field = parts
            .next()
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::to_string);

        if code.is_empty() || (kind == AppErrorKind::Field && field.is_none()) {
            return None;
        }

        Some(Self {
            status,
            kind,
            code,
            message,
            field,
        })
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}: {}", self.status, self.code, self.message)
    }
}

#[derive(Error, Debug)]
pub enum InvokeError {
    /// Compilation guarantees a binding per parameter, so this is a compiler bug
    #[error("procedure '{procedure}' has no binding for parameter '{parameter}'")]
    MissingBinding { procedure: String, parameter: String },

    #[error("procedure '{procedure}' raised {error}")]
    Application { procedure: String, error: AppError },

    #[error("procedure '{procedure}' raised a malformed application error: {message}")]
    MalformedSignal { procedure: String, message: String },

    #[error("call to procedure '{procedure}' failed: {source}")]
    Database {
        procedure: String,
        #[source]
        source: DatabaseError,
    },
}

impl InvokeError {
    pub fn procedure(&self) -> &str {
        match self {
            InvokeError::MissingBinding { procedure, .. }
            | InvokeError::Application { procedure, .. }
            | InvokeError::MalformedSignal { procedure, .. }
            | InvokeError::Database { procedure, .. } => procedure,
        }
    }
}

impl From<InvokeError> for ApiError {
    fn from(err: InvokeError) -> Self {
        match err {
            InvokeError::Application { error, .. } => ApiError::Application {
                status: error.status,
                code: error.code,
                message: error.message,
                field: error.field,
            },
            InvokeError::MalformedSignal { message, .. } => ApiError::bad_request(message),
            InvokeError::MissingBinding { .. } => {
                tracing::error!("{}", err);
                ApiError::internal_server_error("Internal server error")
            }
            InvokeError::Database { ref source, .. } => {
                tracing::error!("{}", err);
                if source.is_unavailable() {
                    ApiError::service_unavailable("Database unavailable")
                } else {
                    ApiError::internal_server_error("Database error occurred")
                }
            }
        }
    }
}

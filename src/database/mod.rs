pub mod caller;
pub mod catalog;
pub mod manager;
pub mod row;

pub use caller::{CallOutput, CallStatus, MySqlCaller, ProcedureCaller};
pub use catalog::load_catalog;
pub use manager::DatabaseManager;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    /// Error reported by the server itself, with its SQLSTATE
    #[error("SQLSTATE {}: {message}", .state.as_deref().unwrap_or("HY000"))]
    Server {
        state: Option<String>,
        message: String,
    },

    #[error(transparent)]
    Sqlx(sqlx::Error),
}

impl DatabaseError {
    /// The pool could not hand out a connection
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            DatabaseError::Sqlx(sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_))
        )
    }
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db) => DatabaseError::Server {
                state: db.code().map(|code| code.into_owned()),
                message: db.message().to_string(),
            },
            other => DatabaseError::Sqlx(other),
        }
    }
}

use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::mysql::{MySql, MySqlArguments, MySqlPool};
use sqlx::query::Query;
use sqlx::Either;

use crate::types::{CallArg, ResultSet};

use super::row::row_to_json;
use super::DatabaseError;

/// Status packet MySQL appends after the result sets of a CALL
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallStatus {
    pub rows_affected: u64,
    pub last_insert_id: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallOutput {
    /// Result sets in the order the procedure produced them
    pub result_sets: Vec<ResultSet>,
    pub status: Option<CallStatus>,
}

/// Positional stored-procedure call
#[async_trait]
pub trait ProcedureCaller: Send + Sync {
    async fn call(&self, procedure: &str, args: &[CallArg]) -> Result<CallOutput, DatabaseError>;
}

pub struct MySqlCaller {
    pool: MySqlPool,
}

impl MySqlCaller {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProcedureCaller for MySqlCaller {
    async fn call(&self, procedure: &str, args: &[CallArg]) -> Result<CallOutput, DatabaseError> {
        let sql = call_statement(procedure, args.len());
        let mut query = sqlx::query(&sql);
        for arg in args {
            query = bind_arg(query, arg);
        }

        // Each result set ends with a Left; the last Left is the CALL's own status
        let mut sets: Vec<(ResultSet, CallStatus)> = Vec::new();
        let mut current = ResultSet::new();
        let mut stream = query.fetch_many(&self.pool);
        while let Some(step) = stream.try_next().await? {
            match step {
                Either::Left(done) => {
                    let status = CallStatus {
                        rows_affected: done.rows_affected(),
                        last_insert_id: done.last_insert_id(),
                    };
                    sets.push((std::mem::take(&mut current), status));
                }
                Either::Right(row) => current.push(row_to_json(&row)),
            }
        }
        if !current.is_empty() {
            sets.push((current, CallStatus::default()));
        }

        let status = match sets.last() {
            Some((rows, _)) if rows.is_empty() => sets.pop().map(|(_, status)| status),
            _ => None,
        };

        Ok(CallOutput {
            result_sets: sets.into_iter().map(|(rows, _)| rows).collect(),
            status,
        })
    }
}

/// `CALL \`name\`(?, ?, ...)`
pub fn call_statement(procedure: &str, arity: usize) -> String {
    let placeholders = vec!["?"; arity].join(", ");
    format!("CALL `{}`({})", procedure.replace('`', "``"), placeholders)
}

fn bind_arg<'q>(
    q: Query<'q, MySql, MySqlArguments>,
    arg: &CallArg,
) -> Query<'q, MySql, MySqlArguments> {
    match arg {
        CallArg::Null => q.bind(None::<String>),
        CallArg::Bool(b) => q.bind(*b),
        CallArg::Int(i) => q.bind(*i),
        CallArg::UInt(u) => q.bind(*u),
        CallArg::Float(f) => q.bind(*f),
        CallArg::Text(s) => q.bind(s.clone()),
    }
}

//! Request time half of a route: bind request fields to procedure arguments,
//! call the procedure, and turn its result sets into a reply

pub mod binding;
pub mod demux;
pub mod error;

pub use binding::{split_alias, ParamSource, ParameterBinding};
pub use demux::{demultiplex, Reply, ResultEnvelope, RESULT_MARKER};
pub use error::{AppError, AppErrorKind, InvokeError};

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::catalog::Procedure;
use crate::context::RequestContext;
use crate::database::{CallOutput, DatabaseError, ProcedureCaller};
use crate::types::CallArg;

/// SQLSTATE class procedures use for application errors (`45000`)
pub const DEFAULT_APP_ERROR_STATE: &str = "45";

#[derive(Debug, Clone, PartialEq)]
pub struct ProcedureHandler {
    procedure: Arc<Procedure>,
    bindings: BTreeMap<String, ParameterBinding>,
    app_error_state: String,
}

impl ProcedureHandler {
    pub fn new(
        procedure: Arc<Procedure>,
        bindings: BTreeMap<String, ParameterBinding>,
        app_error_state: impl Into<String>,
    ) -> Self {
        Self {
            procedure,
            bindings,
            app_error_state: app_error_state.into(),
        }
    }

    pub fn procedure(&self) -> &Procedure {
        &self.procedure
    }

    /// Bindings in declared parameter order
    pub fn bindings(&self) -> impl Iterator<Item = &ParameterBinding> {
        self.procedure
            .parameters
            .iter()
            .filter_map(|name| self.bindings.get(name))
    }

    /// Positional call arguments in the order the catalog declared them
    pub fn resolve_args(&self, request: &RequestContext) -> Result<Vec<CallArg>, InvokeError> {
        self.procedure
            .parameters
            .iter()
            .map(|name| {
                let binding = self.bindings.get(name).ok_or_else(|| InvokeError::MissingBinding {
                    procedure: self.procedure.name.clone(),
                    parameter: name.clone(),
                })?;
                Ok(CallArg::from(&binding.extract(request)))
            })
            .collect()
    }

    pub async fn invoke(
        &self,
        caller: &dyn ProcedureCaller,
        request: &RequestContext,
    ) -> Result<Reply, InvokeError> {
        let args = self.resolve_args(request)?;
        tracing::debug!("CALL {} with {} argument(s)", self.procedure.name, args.len());

        match caller.call(&self.procedure.name, &args).await {
            // The trailing call status carries nothing the reply needs
            Ok(CallOutput { result_sets, .. }) => Ok(demultiplex(result_sets)),
            Err(err) => Err(self.classify(err)),
        }
    }

    fn classify(&self, err: DatabaseError) -> InvokeError {
        let procedure = self.procedure.name.clone();
        match err {
            DatabaseError::Server {
                state: Some(ref state),
                ref message,
            } if state.starts_with(&self.app_error_state) => match AppError::parse(message) {
                Some(error) => InvokeError::Application { procedure, error },
                None => InvokeError::MalformedSignal {
                    procedure,
                    message: message.clone(),
                },
            },
            source => InvokeError::Database { procedure, source },
        }
    }
}

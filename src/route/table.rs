use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::invoker::{ParameterBinding, ProcedureHandler};
use crate::schema::CompiledSchema;

use super::error::CompileError;
use super::guard::CompiledGuard;
use super::hook::{HookChains, HookPhase};
use super::naming::HttpMethod;

/// One step of the chain that runs before request validation
#[derive(Debug, Clone, PartialEq)]
pub enum PreValidationStep {
    /// Populate `RequestContext::auth` from the auth provider
    AuthContext,
    Guard(CompiledGuard),
}

impl PreValidationStep {
    pub fn label(&self) -> String {
        match self {
            PreValidationStep::AuthContext => "auth-context".to_string(),
            PreValidationStep::Guard(guard) => format!("guard:{}", guard.label()),
        }
    }
}

/// A compiled route, shared read-only by every request it serves
#[derive(Debug, Clone, PartialEq)]
pub struct RouteSpec {
    pub method: HttpMethod,
    pub path: String,
    pub summary: String,
    /// Auth context first, then guards in comment order
    pub pre_validation: Vec<PreValidationStep>,
    pub hooks: HookChains,
    pub schema: CompiledSchema,
    pub handler: ProcedureHandler,
}

impl RouteSpec {
    pub fn procedure_name(&self) -> &str {
        &self.handler.procedure().name
    }

    pub fn describe(&self) -> RouteDescriptor {
        RouteDescriptor {
            procedure: self.procedure_name().to_string(),
            method: self.method,
            path: self.path.clone(),
            summary: self.summary.clone(),
            pre_validation: self.pre_validation.iter().map(PreValidationStep::label).collect(),
            hooks: self
                .hooks
                .iter()
                .map(|(phase, hooks)| (phase, hooks.iter().map(|h| h.name.clone()).collect()))
                .collect(),
            parameters: self.handler.bindings().cloned().collect(),
            schema: self.schema.to_json_schema(),
        }
    }
}

/// Serializable view of a route for listings and comparisons
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteDescriptor {
    pub procedure: String,
    pub method: HttpMethod,
    pub path: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub summary: String,
    pub pre_validation: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub hooks: BTreeMap<HookPhase, Vec<String>>,
    pub parameters: Vec<ParameterBinding>,
    pub schema: Value,
}

/// Path with parameter names erased
fn path_shape(path: &str) -> Vec<&str> {
    path.split('/')
        .map(|segment| if segment.starts_with(':') { ":" } else { segment })
        .collect()
}

/// The complete, immutable set of routes built from a catalog
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<RouteSpec>,
    index: BTreeMap<(HttpMethod, String), usize>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a route unless its method and path are already taken, or its
    /// path differs from a registered one only in parameter names
    pub fn insert(&mut self, route: RouteSpec) -> Result<(), CompileError> {
        let key = (route.method, route.path.clone());
        if let Some(&existing) = self.index.get(&key) {
            return Err(CompileError::DuplicateRoute {
                procedure: route.procedure_name().to_string(),
                existing: self.routes[existing].procedure_name().to_string(),
                method: route.method,
                path: route.path,
            });
        }

        let shape = path_shape(&route.path);
        if let Some(other) = self
            .routes
            .iter()
            .find(|other| other.path != route.path && path_shape(&other.path) == shape)
        {
            return Err(CompileError::ConflictingPath {
                procedure: route.procedure_name().to_string(),
                existing: other.procedure_name().to_string(),
                existing_path: other.path.clone(),
                path: route.path,
            });
        }
        self.index.insert(key, self.routes.len());
        self.routes.push(route);
        Ok(())
    }

    pub fn get(&self, method: HttpMethod, path: &str) -> Option<&RouteSpec> {
        self.index
            .get(&(method, path.to_string()))
            .map(|&i| &self.routes[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &RouteSpec> {
        self.routes.iter()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn describe(&self) -> Vec<RouteDescriptor> {
        self.routes.iter().map(RouteSpec::describe).collect()
    }

    pub fn into_routes(self) -> Vec<RouteSpec> {
        self.routes
    }
}

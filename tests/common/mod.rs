#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{Map, Value};
use tower::ServiceExt;

use procroute::auth::{AnonymousAuth, AuthContext, AuthProvider};
use procroute::catalog::{Procedure, ProcedureCatalog};
use procroute::context::{Exchange, RequestContext};
use procroute::database::{CallOutput, DatabaseError, ProcedureCaller};
use procroute::error::ApiError;
use procroute::route::{FnHook, Guard, GuardRegistry, Hook, HookRegistry, NamingConvention, RouteCompiler, RouteTable};
use procroute::schema::CustomValidators;
use procroute::server::{self, AppState};
use procroute::types::{CallArg, ResultSet};

/// What a scripted procedure returns when called
pub enum Script {
    Sets(Vec<Value>),
    Signal { state: &'static str, message: &'static str },
    Unavailable,
}

/// In-memory `ProcedureCaller` answering from a per-procedure script
#[derive(Clone, Default)]
pub struct ScriptedCaller {
    scripts: Arc<Mutex<HashMap<String, Arc<Script>>>>,
    calls: Arc<Mutex<Vec<(String, Vec<CallArg>)>>>,
}

impl ScriptedCaller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Each value is one result set: a JSON array of row objects
    pub fn returns(self, procedure: &str, sets: Vec<Value>) -> Self {
        self.script(procedure, Script::Sets(sets))
    }

    pub fn script(self, procedure: &str, script: Script) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(procedure.to_string(), Arc::new(script));
        self
    }

    pub fn calls(&self) -> Vec<(String, Vec<CallArg>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcedureCaller for ScriptedCaller {
    async fn call(&self, procedure: &str, args: &[CallArg]) -> Result<CallOutput, DatabaseError> {
        self.calls
            .lock()
            .unwrap()
            .push((procedure.to_string(), args.to_vec()));

        let script = self.scripts.lock().unwrap().get(procedure).cloned();
        match script.as_deref() {
            Some(Script::Sets(sets)) => Ok(CallOutput {
                result_sets: sets.iter().map(result_set).collect(),
                status: None,
            }),
            Some(Script::Signal { state, message }) => Err(DatabaseError::Server {
                state: Some(state.to_string()),
                message: message.to_string(),
            }),
            Some(Script::Unavailable) => Err(DatabaseError::Sqlx(sqlx::Error::PoolTimedOut)),
            None => Ok(CallOutput::default()),
        }
    }
}

fn result_set(value: &Value) -> ResultSet {
    value
        .as_array()
        .map(|rows| rows.iter().filter_map(|r| r.as_object().cloned()).collect())
        .unwrap_or_default()
}

/// Trusts an `x-test-user` header holding the JSON claims; no header means anonymous
pub struct HeaderAuth;

#[async_trait]
impl AuthProvider for HeaderAuth {
    async fn authenticate(&self, headers: &Map<String, Value>) -> AuthContext {
        let Some(claims) = headers
            .get("x-test-user")
            .and_then(Value::as_str)
            .and_then(|raw| serde_json::from_str::<Map<String, Value>>(raw).ok())
        else {
            return AuthContext::anonymous();
        };
        AuthContext {
            authenticated: true,
            authorized: claims.get("aud").is_some(),
            user: Some(claims),
        }
    }
}

pub fn procedure(name: &str, params: &[&str], comment: &str) -> Procedure {
    Procedure::new(
        name,
        format!("BEGIN\n{}\nSELECT 1;\nEND", comment),
        params.iter().map(|p| p.to_string()).collect(),
    )
}

pub fn catalog(procedures: Vec<Procedure>) -> ProcedureCatalog {
    ProcedureCatalog::from_procedures(procedures, "api_")
}

/// Compiler with every built-in guard, hook and validator
pub fn compiler() -> Result<RouteCompiler> {
    Ok(RouteCompiler::new(NamingConvention::default())
        .with_validators(CustomValidators::with_builtins()?)
        .with_guards(GuardRegistry::with_builtins())
        .with_hooks(HookRegistry::with_builtins()))
}

pub fn compile(procedures: Vec<Procedure>) -> Result<RouteTable> {
    Ok(compiler()?.compile_catalog(&catalog(procedures))?)
}

/// Compile with extra hooks and guards registered next to the built-ins
pub fn compile_with(
    procedures: Vec<Procedure>,
    hooks: Vec<(&str, Arc<dyn Hook>)>,
    guards: Vec<(&str, Arc<dyn Guard>)>,
) -> Result<RouteTable> {
    let mut hook_registry = HookRegistry::with_builtins();
    for (name, hook) in hooks {
        hook_registry.register(name, hook)?;
    }
    let mut guard_registry = GuardRegistry::with_builtins();
    for (name, guard) in guards {
        guard_registry.register(name, move |_: &[String]| Ok(Arc::clone(&guard)))?;
    }

    Ok(compiler()?
        .with_hooks(hook_registry)
        .with_guards(guard_registry)
        .compile_catalog(&catalog(procedures))?)
}

/// Shared log of lifecycle steps, in the order they ran
#[derive(Clone, Default)]
pub struct Trace(Arc<Mutex<Vec<String>>>);

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Hook that records `describe(exchange)` and lets the request through
    pub fn hook<F>(&self, describe: F) -> Arc<dyn Hook>
    where
        F: Fn(&Exchange) -> String + Send + Sync + 'static,
    {
        let trace = self.clone();
        Arc::new(FnHook(move |exchange: &mut Exchange| -> Result<(), ApiError> {
            trace.push(describe(&*exchange));
            Ok(())
        }))
    }

    pub fn guard(&self) -> Arc<dyn Guard> {
        Arc::new(TraceGuard(self.clone()))
    }
}

/// Records whether the auth context was populated before it ran
struct TraceGuard(Trace);

impl Guard for TraceGuard {
    fn check(&self, request: &RequestContext) -> Result<(), ApiError> {
        self.0.push(format!("guard authenticated={}", request.auth.authenticated));
        Ok(())
    }
}

pub fn app(table: RouteTable, caller: ScriptedCaller) -> Router {
    server::router(table, AppState::new(Arc::new(caller), Arc::new(HeaderAuth)))
}

pub fn anonymous_app(table: RouteTable, caller: ScriptedCaller) -> Router {
    server::router(table, AppState::new(Arc::new(caller), Arc::new(AnonymousAuth)))
}

pub async fn send(app: Router, request: Request<Body>) -> Result<(StatusCode, axum::http::HeaderMap, Value)> {
    let response = app.oneshot(request).await?;
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };
    Ok((status, headers, body))
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

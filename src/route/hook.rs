//! Lifecycle hooks attached to routes with `@hooks phase fn1, fn2`

use async_trait::async_trait;
use axum::http::{header, HeaderValue};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::context::Exchange;
use crate::error::ApiError;

use super::error::RegistrationError;

/// Request lifecycle phases, in the order they fire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum HookPhase {
    #[serde(rename = "onRequest")]
    OnRequest,
    #[serde(rename = "preValidation")]
    PreValidation,
    #[serde(rename = "preHandler")]
    PreHandler,
    #[serde(rename = "preSerialization")]
    PreSerialization,
    #[serde(rename = "onSend")]
    OnSend,
    #[serde(rename = "onResponse")]
    OnResponse,
    #[serde(rename = "onError")]
    OnError,
}

impl HookPhase {
    pub const ALL: [HookPhase; 7] = [
        HookPhase::OnRequest,
        HookPhase::PreValidation,
        HookPhase::PreHandler,
        HookPhase::PreSerialization,
        HookPhase::OnSend,
        HookPhase::OnResponse,
        HookPhase::OnError,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HookPhase::OnRequest => "onRequest",
            HookPhase::PreValidation => "preValidation",
            HookPhase::PreHandler => "preHandler",
            HookPhase::PreSerialization => "preSerialization",
            HookPhase::OnSend => "onSend",
            HookPhase::OnResponse => "onResponse",
            HookPhase::OnError => "onError",
        }
    }
}

impl std::str::FromStr for HookPhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HookPhase::ALL
            .into_iter()
            .find(|phase| phase.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[async_trait]
pub trait Hook: Send + Sync {
    /// An error short-circuits the remaining request phases and is sent as the reply
    async fn run(&self, exchange: &mut Exchange) -> Result<(), ApiError>;
}

/// Adapts a synchronous closure into a hook
pub struct FnHook<F>(pub F);

#[async_trait]
impl<F> Hook for FnHook<F>
where
    F: Fn(&mut Exchange) -> Result<(), ApiError> + Send + Sync,
{
    async fn run(&self, exchange: &mut Exchange) -> Result<(), ApiError> {
        (self.0)(exchange)
    }
}

#[derive(Clone, Default)]
pub struct HookRegistry {
    hooks: BTreeMap<String, Arc<dyn Hook>>,
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.hooks.keys()).finish()
    }
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut hooks: BTreeMap<String, Arc<dyn Hook>> = BTreeMap::new();
        hooks.insert("log_request".into(), Arc::new(LogRequest));
        hooks.insert("no_store".into(), Arc::new(NoStore));
        Self { hooks }
    }

    pub fn register(&mut self, name: impl Into<String>, hook: Arc<dyn Hook>) -> Result<(), RegistrationError> {
        let name = name.into();
        if self.hooks.contains_key(&name) {
            return Err(RegistrationError::Duplicate { kind: "hook", name });
        }
        self.hooks.insert(name, hook);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Hook>> {
        self.hooks.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.hooks.keys().map(String::as_str)
    }
}

#[derive(Clone)]
pub struct CompiledHook {
    pub name: String,
    pub hook: Arc<dyn Hook>,
}

impl fmt::Debug for CompiledHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl PartialEq for CompiledHook {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

/// Hook functions of one route, grouped by phase in declaration order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HookChains {
    chains: BTreeMap<HookPhase, Vec<CompiledHook>>,
}

impl HookChains {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, phase: HookPhase) -> bool {
        self.chains.contains_key(&phase)
    }

    pub fn insert(&mut self, phase: HookPhase, hooks: Vec<CompiledHook>) {
        self.chains.insert(phase, hooks);
    }

    pub fn get(&self, phase: HookPhase) -> &[CompiledHook] {
        self.chains.get(&phase).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (HookPhase, &[CompiledHook])> {
        self.chains.iter().map(|(phase, hooks)| (*phase, hooks.as_slice()))
    }

    /// Run one phase in order, stopping at the first failing hook
    pub async fn run(&self, phase: HookPhase, exchange: &mut Exchange) -> Result<(), ApiError> {
        for hook in self.get(phase) {
            tracing::trace!("Running {} hook '{}'", phase, hook.name);
            hook.hook.run(exchange).await?;
        }
        Ok(())
    }
}

struct LogRequest;

#[async_trait]
impl Hook for LogRequest {
    async fn run(&self, exchange: &mut Exchange) -> Result<(), ApiError> {
        let request = &exchange.request;
        tracing::info!(
            "{} {} [{}] -> {}",
            request.method,
            request.path,
            request.id,
            exchange.status
        );
        Ok(())
    }
}

struct NoStore;

#[async_trait]
impl Hook for NoStore {
    async fn run(&self, exchange: &mut Exchange) -> Result<(), ApiError> {
        exchange
            .headers
            .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RequestContext;

    #[test]
    fn phases_parse_by_lifecycle_name() {
        assert_eq!("preHandler".parse::<HookPhase>(), Ok(HookPhase::PreHandler));
        assert_eq!("prehandler".parse::<HookPhase>(), Err("prehandler".to_string()));
        assert!("beforeAll".parse::<HookPhase>().is_err());
    }

    #[tokio::test]
    async fn chain_runs_in_order_and_stops_on_error() {
        let mark = |tag: &'static str| -> Arc<dyn Hook> {
            Arc::new(FnHook(move |exchange: &mut Exchange| -> Result<(), ApiError> {
                let seen = exchange.request.locals.len();
                exchange.request.locals.insert(tag.into(), serde_json::json!(seen));
                Ok(())
            }))
        };
        let fail: Arc<dyn Hook> = Arc::new(FnHook(|_: &mut Exchange| -> Result<(), ApiError> {
            Err(ApiError::forbidden("stop"))
        }));

        let mut chains = HookChains::new();
        chains.insert(
            HookPhase::PreHandler,
            vec![
                CompiledHook { name: "first".into(), hook: mark("first") },
                CompiledHook { name: "second".into(), hook: mark("second") },
                CompiledHook { name: "fail".into(), hook: fail },
                CompiledHook { name: "never".into(), hook: mark("never") },
            ],
        );

        let mut exchange = Exchange::new(RequestContext::new("GET", "/"));
        let err = chains.run(HookPhase::PreHandler, &mut exchange).await.unwrap_err();

        assert_eq!(err.status_code(), 403);
        assert_eq!(exchange.request.locals["first"], 0);
        assert_eq!(exchange.request.locals["second"], 1);
        assert!(!exchange.request.locals.contains_key("never"));
    }

    #[tokio::test]
    async fn no_store_sets_cache_control() {
        let registry = HookRegistry::with_builtins();
        let mut exchange = Exchange::new(RequestContext::new("GET", "/"));
        registry.get("no_store").unwrap().run(&mut exchange).await.unwrap();
        assert_eq!(exchange.headers[header::CACHE_CONTROL], "no-store");
    }

    #[tokio::test]
    async fn empty_phase_is_a_no_op() {
        let mut exchange = Exchange::new(RequestContext::new("GET", "/"));
        assert!(HookChains::new().run(HookPhase::OnSend, &mut exchange).await.is_ok());
    }
}

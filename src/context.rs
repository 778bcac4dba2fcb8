//! Per-request state shared by guards, hooks and the invoker

use axum::http::HeaderMap;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::auth::AuthContext;
use crate::error::ApiError;

/// Request fields as seen by the route pipeline
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub id: Uuid,
    pub method: String,
    pub path: String,
    pub query: Map<String, Value>,
    pub params: Map<String, Value>,
    pub body: Value,
    /// Header names are lowercased
    pub headers: Map<String, Value>,
    pub auth: AuthContext,
    /// Free-form side channel hooks can write to; read by the `request` parameter source
    pub locals: Map<String, Value>,
}

impl RequestContext {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            method: method.into(),
            path: path.into(),
            query: Map::new(),
            params: Map::new(),
            body: Value::Null,
            headers: Map::new(),
            auth: AuthContext::anonymous(),
            locals: Map::new(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .and_then(Value::as_str)
    }
}

/// A request together with the reply being built for it. Hooks receive the
/// exchange mutably: request-phase hooks usually touch `request`, reply-phase
/// hooks `status`, `payload` and `headers`.
#[derive(Debug)]
pub struct Exchange {
    pub request: RequestContext,
    pub status: u16,
    pub payload: Option<Value>,
    pub headers: HeaderMap,
    /// Set while `onError` hooks run
    pub error: Option<ApiError>,
}

impl Exchange {
    pub fn new(request: RequestContext) -> Self {
        Self {
            request,
            status: 200,
            payload: None,
            headers: HeaderMap::new(),
            error: None,
        }
    }
}

//! axum request -> `RequestContext`

use axum::body::{to_bytes, Body};
use axum::extract::{FromRequestParts, Path, Request};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::context::RequestContext;
use crate::error::ApiError;

pub async fn request_context(
    request: Request,
    has_path_params: bool,
    body_limit: usize,
) -> Result<RequestContext, ApiError> {
    let (mut parts, body) = request.into_parts();

    let mut context = RequestContext::new(parts.method.as_str(), parts.uri.path());
    if has_path_params {
        context.params = path_params(&mut parts).await;
    }
    context.query = query_map(parts.uri.query());
    context.headers = header_map(&parts.headers);
    context.body = json_body(body, body_limit).await?;

    Ok(context)
}

async fn path_params(parts: &mut Parts) -> Map<String, Value> {
    match Path::<HashMap<String, String>>::from_request_parts(parts, &()).await {
        Ok(Path(params)) => params
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect(),
        Err(e) => {
            tracing::debug!("Ignoring undecodable path parameters: {}", e);
            Map::new()
        }
    }
}

/// Repeated keys collect into an array, in order of appearance
pub fn query_map(query: Option<&str>) -> Map<String, Value> {
    let mut map = Map::new();
    let Some(query) = query else {
        return map;
    };

    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        let value = Value::String(value.into_owned());
        match map.get_mut(&*key) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                map.insert(key.into_owned(), value);
            }
        }
    }
    map
}

/// Lowercased names; repeated headers are joined with ", "
pub fn header_map(headers: &HeaderMap) -> Map<String, Value> {
    let mut map = Map::new();
    for (name, value) in headers {
        let Ok(value) = value.to_str() else {
            continue;
        };
        match map.get_mut(name.as_str()) {
            Some(Value::String(existing)) => {
                existing.push_str(", ");
                existing.push_str(value);
            }
            _ => {
                map.insert(name.as_str().to_string(), Value::String(value.to_string()));
            }
        }
    }
    map
}

async fn json_body(body: Body, limit: usize) -> Result<Value, ApiError> {
    let bytes = to_bytes(body, limit)
        .await
        .map_err(|_| ApiError::bad_request("Request body could not be read or is too large"))?;

    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }

    serde_json::from_slice(&bytes)
        .map_err(|e| ApiError::invalid_json(format!("Invalid JSON body: {}", e)))
}

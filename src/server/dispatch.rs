//! Per-request lifecycle of a compiled route
//!
//! onRequest -> pre-validation chain -> preValidation -> schema validation ->
//! preHandler -> procedure call -> preSerialization -> onSend -> reply ->
//! onResponse. A failure anywhere before the reply runs the onError hooks and
//! replaces the reply with the error body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::context::{Exchange, RequestContext};
use crate::error::ApiError;
use crate::route::{HookPhase, PreValidationStep, RouteSpec};
use crate::schema::Section;

use super::AppState;

pub async fn dispatch(route: &RouteSpec, state: &AppState, request: RequestContext) -> Response {
    let mut exchange = Exchange::new(request);

    if let Err(err) = drive(route, state, &mut exchange).await {
        fail(route, &mut exchange, err).await;
    }

    let response = respond(&exchange);

    if let Err(err) = route.hooks.run(HookPhase::OnResponse, &mut exchange).await {
        tracing::warn!(
            "onResponse hook failed for {}: {}",
            route.procedure_name(),
            err
        );
    }

    response
}

async fn drive(route: &RouteSpec, state: &AppState, exchange: &mut Exchange) -> Result<(), ApiError> {
    route.hooks.run(HookPhase::OnRequest, exchange).await?;

    for step in &route.pre_validation {
        match step {
            PreValidationStep::AuthContext => {
                exchange.request.auth = state.auth.authenticate(&exchange.request.headers).await;
            }
            PreValidationStep::Guard(guard) => guard.guard.check(&exchange.request)?,
        }
    }
    route.hooks.run(HookPhase::PreValidation, exchange).await?;

    validate(route, &mut exchange.request)?;
    route.hooks.run(HookPhase::PreHandler, exchange).await?;

    let reply = route
        .handler
        .invoke(state.caller.as_ref(), &exchange.request)
        .await?;
    exchange.status = reply.status;
    exchange.payload = Some(reply.payload);

    route.hooks.run(HookPhase::PreSerialization, exchange).await?;
    route.hooks.run(HookPhase::OnSend, exchange).await?;
    Ok(())
}

async fn fail(route: &RouteSpec, exchange: &mut Exchange, err: ApiError) {
    exchange.status = err.status_code();
    exchange.payload = Some(err.to_json());
    exchange.error = Some(err);

    if let Err(hook_err) = route.hooks.run(HookPhase::OnError, exchange).await {
        tracing::warn!(
            "onError hook failed for {}: {}",
            route.procedure_name(),
            hook_err
        );
    }
}

/// Validate and coerce every section the route declares, writing coerced
/// values back so the invoker reads typed data
fn validate(route: &RouteSpec, request: &mut RequestContext) -> Result<(), ApiError> {
    let mut field_errors = BTreeMap::new();

    for section in Section::ALL {
        if route.schema.section(section).is_none() {
            continue;
        }

        match route.schema.check(section, section_value(request, section)) {
            Ok(value) => store_section(request, section, value),
            Err(issues) => {
                for issue in issues {
                    field_errors.entry(issue.path).or_insert(issue.message);
                }
            }
        }
    }

    if field_errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::validation_error("Request validation failed", Some(field_errors)))
    }
}

fn section_value(request: &RequestContext, section: Section) -> Value {
    match section {
        Section::Querystring => Value::Object(request.query.clone()),
        Section::Params => Value::Object(request.params.clone()),
        Section::Body => request.body.clone(),
        Section::Headers => Value::Object(request.headers.clone()),
    }
}

fn store_section(request: &mut RequestContext, section: Section, value: Value) {
    let slot = match section {
        Section::Body => {
            request.body = value;
            return;
        }
        Section::Querystring => &mut request.query,
        Section::Params => &mut request.params,
        Section::Headers => &mut request.headers,
    };
    if let Value::Object(map) = value {
        *slot = map;
    }
}

fn respond(exchange: &Exchange) -> Response {
    let status = StatusCode::from_u16(exchange.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = match &exchange.payload {
        Some(payload) => (status, Json(payload.clone())).into_response(),
        None => status.into_response(),
    };
    // Hook-set headers replace same-named defaults such as content-type
    response.headers_mut().extend(exchange.headers.clone());
    response
}

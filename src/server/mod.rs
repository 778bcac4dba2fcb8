//! axum adapter for a compiled `RouteTable`

pub mod dispatch;
pub mod extract;

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use axum::routing::{on, MethodFilter, MethodRouter};
use axum::Router;
use futures::future::{BoxFuture, FutureExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::AuthProvider;
use crate::config::AppConfig;
use crate::database::ProcedureCaller;
use crate::error::ApiError;
use crate::route::{HttpMethod, RouteSpec, RouteTable};

/// Collaborators shared by every request
#[derive(Clone)]
pub struct AppState {
    pub caller: Arc<dyn ProcedureCaller>,
    pub auth: Arc<dyn AuthProvider>,
    pub body_limit: usize,
}

impl AppState {
    pub fn new(caller: Arc<dyn ProcedureCaller>, auth: Arc<dyn AuthProvider>) -> Self {
        Self {
            caller,
            auth,
            body_limit: 10 * 1024 * 1024,
        }
    }

    pub fn with_body_limit(mut self, body_limit: usize) -> Self {
        self.body_limit = body_limit;
        self
    }
}

/// Register every route of the table; unmatched requests get a JSON 404
pub fn router(table: RouteTable, state: AppState) -> Router {
    let mut by_path: BTreeMap<String, MethodRouter> = BTreeMap::new();

    for route in table.into_routes() {
        tracing::debug!(
            "Registering {} {} -> {}",
            route.method,
            route.path,
            route.procedure_name()
        );
        let path = route.path.clone();
        let filter = method_filter(route.method);
        let handler = route_handler(Arc::new(route), state.clone());

        let methods = match by_path.remove(&path) {
            Some(methods) => methods.on(filter, handler),
            None => on(filter, handler),
        };
        by_path.insert(path, methods);
    }

    by_path
        .into_iter()
        .fold(Router::new(), |router, (path, methods)| router.route(&path, methods))
        .fallback(not_found)
}

/// The router with tracing and optional CORS layers from configuration
pub fn app(table: RouteTable, state: AppState, config: &AppConfig) -> Router {
    let mut app = router(table, state);

    if config.security.enable_cors {
        app = app.layer(cors_layer(&config.security.cors_origins));
    }

    app.layer(TraceLayer::new_for_http())
}

fn route_handler(
    route: Arc<RouteSpec>,
    state: AppState,
) -> impl Fn(Request) -> BoxFuture<'static, Response> + Clone + Send + 'static {
    let has_path_params = route.path.split('/').any(|segment| segment.starts_with(':'));

    move |request: Request| {
        let route = Arc::clone(&route);
        let state = state.clone();
        async move {
            match extract::request_context(request, has_path_params, state.body_limit).await {
                Ok(context) => dispatch::dispatch(&route, &state, context).await,
                Err(err) => err.into_response(),
            }
        }
        .boxed()
    }
}

fn method_filter(method: HttpMethod) -> MethodFilter {
    match method {
        HttpMethod::Get => MethodFilter::GET,
        HttpMethod::Post => MethodFilter::POST,
        HttpMethod::Put => MethodFilter::PUT,
        HttpMethod::Patch => MethodFilter::PATCH,
        HttpMethod::Delete => MethodFilter::DELETE,
        HttpMethod::Head => MethodFilter::HEAD,
        HttpMethod::Options => MethodFilter::OPTIONS,
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(origins))
    }
}

async fn not_found(request: Request) -> Response {
    ApiError::not_found(format!(
        "No route for {} {}",
        request.method(),
        request.uri().path()
    ))
    .into_response()
}

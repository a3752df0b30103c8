// api/mod.rs - application state and HTTP routing table

use std::sync::Arc;

use axum::{http::header::AUTHORIZATION, middleware::from_fn_with_state, routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::auth::AuthenticationGate;
use crate::database::RouteStore;
use crate::handlers;
use crate::middleware::launch_params_middleware;
use crate::services::RouteAggregationService;

/// Shared, read-only state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<dyn RouteStore>,
    pub aggregation: Arc<RouteAggregationService>,
}

impl AppState {
    pub fn new(routes: Arc<dyn RouteStore>, aggregation: Arc<RouteAggregationService>) -> Self {
        Self { routes, aggregation }
    }
}

/// Full application router. Everything except the gate's exempt prefixes
/// requires signed launch parameters, including the 404 fallback.
pub fn app(state: AppState, gate: Arc<AuthenticationGate>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([AUTHORIZATION]);

    Router::new()
        // Operator endpoints
        .route("/health", get(handlers::health))
        .route("/info", get(handlers::info))
        // Caller identity
        .route("/auth/whoami", get(handlers::whoami))
        // Routes with resolved geography
        .route("/routes", get(handlers::list_routes))
        .route("/routes/:route_id", get(handlers::get_route))
        .route("/routes/company/:company_id", get(handlers::company_routes))
        .route("/routes/search/:query", get(handlers::search_routes))
        .fallback(handlers::no_route)
        .with_state(state)
        // Global middleware
        .layer(from_fn_with_state(gate, launch_params_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

// handlers/routes.rs - route read endpoints
//
// Every route leaving these handlers passes through RouteAggregationService,
// so clients only ever see the RouteWithGeo shape.

use axum::extract::{Path, State};
use uuid::Uuid;

use crate::api::AppState;
use crate::database::models::RouteWithGeo;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};

const MIN_SEARCH_LEN: usize = 2;

/// GET /routes - all non-deleted routes
pub async fn list_routes(State(state): State<AppState>) -> ApiResult<Vec<RouteWithGeo>> {
    let routes = state.routes.all_routes().await?;
    let views = state.aggregation.to_routes_with_geo(routes).await?;
    Ok(ApiResponse::success(views))
}

/// GET /routes/:route_id
pub async fn get_route(
    State(state): State<AppState>,
    Path(route_id): Path<String>,
) -> ApiResult<RouteWithGeo> {
    let route_id = parse_uuid("route_id", &route_id)?;
    let route = state.routes.get_route(route_id).await?;
    let view = state.aggregation.to_route_with_geo(route).await?;
    Ok(ApiResponse::success(view))
}

/// GET /routes/company/:company_id
pub async fn company_routes(
    State(state): State<AppState>,
    Path(company_id): Path<String>,
) -> ApiResult<Vec<RouteWithGeo>> {
    let company_id = parse_uuid("company_id", &company_id)?;
    let routes = state.routes.company_routes(company_id).await?;
    let views = state.aggregation.to_routes_with_geo(routes).await?;
    Ok(ApiResponse::success(views))
}

/// GET /routes/search/:query - substring match on name and description
pub async fn search_routes(
    State(state): State<AppState>,
    Path(query): Path<String>,
) -> ApiResult<Vec<RouteWithGeo>> {
    let query = query.trim();
    if query.chars().count() < MIN_SEARCH_LEN {
        return Err(ApiError::bad_request(format!(
            "Search query must be at least {} characters",
            MIN_SEARCH_LEN
        )));
    }

    let routes = state.routes.search_routes(query).await?;
    let views = state.aggregation.to_routes_with_geo(routes).await?;
    Ok(ApiResponse::success(views))
}

fn parse_uuid(field: &str, value: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(value).map_err(|_| ApiError::bad_request(format!("Invalid UUID in '{}'", field)))
}

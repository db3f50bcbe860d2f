//! Router assembly
//!
//! Health probes sit at the root, resources under `/api/v1`, and anything
//! else falls through to a 404 in the standard error shape. Everything under
//! `/api` is rate limited per client.

use axum::{
    http::Uri,
    middleware::{from_fn_with_state, map_response},
    response::Response,
    Router,
};

use crate::handlers::ApiError;
use crate::rate_limit::{limit_api, ApiRateLimit};
use crate::state::AppState;

/// Version prefix for every resource route
pub const API_PREFIX: &str = "/api/v1";

/// Complete application router
pub fn build_app(state: AppState) -> Router {
    let production = state.config().service.is_production();

    let router = Router::new()
        .merge(crate::health::router())
        .nest(API_PREFIX, crate::resources::api_router())
        .fallback(route_not_found);

    let router = match ApiRateLimit::from_config(&state.config().middleware.governor) {
        Some(limit) => router.layer(from_fn_with_state(limit, limit_api)),
        None => router,
    };

    let router = if production {
        router.layer(map_response(production_errors))
    } else {
        router
    };

    router.with_state(state)
}

async fn route_not_found(uri: Uri) -> ApiError {
    ApiError::route_not_found(uri.path())
}

/// Re-render error responses without internal details
async fn production_errors(mut response: Response) -> Response {
    match response.extensions_mut().remove::<ApiError>() {
        Some(error) => error.into_production_response(),
        None => response,
    }
}

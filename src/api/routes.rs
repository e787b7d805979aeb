//! Router configuration for the API.
//!
//! This module provides centralized route registration and middleware
//! configuration for the application.

use axum::{Router, middleware};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::doc::ApiDoc;
use crate::api::handlers;
use crate::api::middleware::{
    auth_middleware, global_error_handler, logging_middleware, request_id_middleware,
};
use crate::state::AppState;

/// Creates the main application router with all routes and middleware.
///
/// # Routes
/// - `/api/notifications` - Notification CRUD and the live stream (bearer token)
/// - `/api/health` - Health, readiness and liveness probes (public)
/// - `/swagger-ui`, `/api-docs/openapi.json` - API documentation
///
/// # Middleware Order
/// Last added runs first:
/// 1. CORS
/// 2. Request ID - generates/propagates `x-request-id`
/// 3. Logging - request span keyed by the request ID
/// 4. Error handler - request ID on error bodies, JSON for plain rejections
/// 5. Compression (event streams are left uncompressed)
pub fn create_router(state: AppState) -> Router {
    let notification_routes = handlers::notifications::notification_routes().route_layer(
        middleware::from_fn_with_state(state.clone(), auth_middleware),
    );

    let api_routes = OpenApiRouter::new()
        .nest("/notifications", notification_routes)
        .merge(handlers::health::health_routes());

    let (router, openapi) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .nest("/api", api_routes)
        .split_for_parts();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    router
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi))
        .layer(CompressionLayer::new())
        .layer(middleware::from_fn(global_error_handler))
        .layer(middleware::from_fn(logging_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(cors)
        .with_state(state)
}

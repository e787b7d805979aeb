//! Health check endpoint handlers.
//!
//! Health checks probe the database pool directly (when the PostgreSQL
//! backend is in use) and report the broadcast hub's state.

use std::collections::HashMap;
use std::time::Instant;

use axum::{extract::State, http::StatusCode, response::Json};
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::api::doc::HEALTH_TAG;
use crate::api::dto::{ComponentHealth, HealthResponse, HealthStatus, HubStats};
use crate::state::AppState;

/// Creates health check routes.
///
/// # Routes
/// - `GET /health` - Full health report
/// - `GET /health/ready` - Readiness probe
/// - `GET /health/live` - Liveness probe
pub fn health_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(health_check))
        .routes(routes!(readiness_check))
        .routes(routes!(liveness_check))
}

/// Full health report including store connectivity and hub statistics.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy or degraded", body = HealthResponse),
        (status = 503, description = "Service is unhealthy", body = HealthResponse)
    ),
    tag = HEALTH_TAG
)]
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let database = check_database(&state).await;
    let hub = check_hub(&state);
    let status = database.status.worst(hub.status);

    let mut checks = HashMap::new();
    checks.insert("database".to_string(), database);
    checks.insert("hub".to_string(), hub);

    let response = HealthResponse {
        status,
        version: crate::pkg_version().to_string(),
        timestamp: jiff::Timestamp::now().to_string(),
        checks,
        hub: hub_stats(&state),
    };

    let code = match status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
    };
    (code, Json(response))
}

/// Readiness probe.
///
/// Not ready while the store is unreachable or the hub is shutting down.
#[utoipa::path(
    get,
    path = "/health/ready",
    responses(
        (status = 200, description = "Service is ready"),
        (status = 503, description = "Service is not ready")
    ),
    tag = HEALTH_TAG
)]
pub async fn readiness_check(State(state): State<AppState>) -> StatusCode {
    let status = check_database(&state)
        .await
        .status
        .worst(check_hub(&state).status);

    match status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Degraded | HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Liveness probe. Does not touch external dependencies.
#[utoipa::path(
    get,
    path = "/health/live",
    responses(
        (status = 200, description = "Service is alive")
    ),
    tag = HEALTH_TAG
)]
pub async fn liveness_check() -> StatusCode {
    StatusCode::OK
}

async fn check_database(state: &AppState) -> ComponentHealth {
    let Some(pool) = &state.db_pool else {
        return ComponentHealth::new(HealthStatus::Healthy, "In-memory store");
    };

    let start = Instant::now();
    let elapsed = |start: Instant| start.elapsed().as_millis() as u64;

    match pool.get().await {
        Ok(mut conn) => {
            use diesel_async::RunQueryDsl;

            match diesel::sql_query("SELECT 1").execute(&mut conn).await {
                Ok(_) => ComponentHealth::new(HealthStatus::Healthy, "Connected")
                    .with_response_time(elapsed(start)),
                Err(e) => {
                    ComponentHealth::new(HealthStatus::Unhealthy, format!("Query failed: {}", e))
                        .with_response_time(elapsed(start))
                }
            }
        }
        Err(e) => {
            ComponentHealth::new(HealthStatus::Unhealthy, format!("Connection failed: {}", e))
                .with_response_time(elapsed(start))
        }
    }
}

fn check_hub(state: &AppState) -> ComponentHealth {
    if state.hub.is_shut_down() {
        ComponentHealth::new(HealthStatus::Degraded, "Shutting down")
    } else {
        ComponentHealth::new(HealthStatus::Healthy, "Accepting subscribers")
    }
}

fn hub_stats(state: &AppState) -> HubStats {
    HubStats {
        channels: state.hub.channel_count(),
        subscribers: state.hub.total_subscribers(),
        shut_down: state.hub.is_shut_down(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_state;

    #[tokio::test]
    async fn test_liveness_check() {
        assert_eq!(liveness_check().await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_reports_open_streams() {
        let state = test_state();
        let _first = state.hub.subscribe(7).unwrap();
        let _second = state.hub.subscribe(7).unwrap();

        let (code, Json(response)) = health_check(State(state)).await;

        assert_eq!(code, StatusCode::OK);
        assert_eq!(response.status, HealthStatus::Healthy);
        assert_eq!(
            response.hub,
            HubStats {
                channels: 1,
                subscribers: 2,
                shut_down: false
            }
        );
        assert!(response.checks.contains_key("database"));
    }

    #[tokio::test]
    async fn test_not_ready_after_hub_shutdown() {
        let state = test_state();
        assert_eq!(readiness_check(State(state.clone())).await, StatusCode::OK);

        state.hub.shutdown();

        assert_eq!(
            readiness_check(State(state.clone())).await,
            StatusCode::SERVICE_UNAVAILABLE
        );
        let (code, Json(response)) = health_check(State(state)).await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(response.status, HealthStatus::Degraded);
        assert!(response.hub.shut_down);
    }
}

//! System endpoints: health check.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app_state::AppState;

/// Liveness of the backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StoreHealth {
    /// The store answered a ping.
    Up,
    /// The ping failed.
    Down,
}

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// `healthy` or `degraded`.
    pub status: &'static str,
    /// Store liveness.
    pub store: StoreHealth,
    /// RFC 3339 time of the check.
    pub timestamp: String,
    /// Crate version.
    pub version: &'static str,
}

impl HealthResponse {
    fn for_store(store: StoreHealth) -> (StatusCode, Self) {
        let (code, status) = match store {
            StoreHealth::Up => (StatusCode::OK, "healthy"),
            StoreHealth::Down => (StatusCode::SERVICE_UNAVAILABLE, "degraded"),
        };
        (
            code,
            Self {
                status,
                store,
                timestamp: Utc::now().to_rfc3339(),
                version: env!("CARGO_PKG_VERSION"),
            },
        )
    }
}

/// `GET /health` — Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Pings the store and reports its liveness with the version and current timestamp. Requires no token.",
    responses(
        (status = 200, description = "Service and store are up", body = HealthResponse),
        (status = 503, description = "Store unreachable", body = HealthResponse),
    )
)]
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let store = match state.store.ping().await {
        Ok(()) => StoreHealth::Up,
        Err(e) => {
            tracing::warn!(error = %e, "store ping failed");
            StoreHealth::Down
        }
    };
    let (code, body) = HealthResponse::for_store(store);
    (code, Json(body))
}

/// System routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_handler))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_down_degrades_to_503() {
        let (code, body) = HealthResponse::for_store(StoreHealth::Down);
        assert_eq!(code, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.status, "degraded");
        assert_eq!(body.store, StoreHealth::Down);
    }

    #[test]
    fn store_up_is_healthy() {
        let (code, body) = HealthResponse::for_store(StoreHealth::Up);
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body.status, "healthy");
        assert_eq!(body.version, env!("CARGO_PKG_VERSION"));
    }
}

//! Liveness probe. Reports database reachability and the oracle
//! configuration dialogue turns will run against, so a misconfigured
//! deployment shows up here instead of on a student's first message.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Json, Router, routing::get};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: String,
    pub oracle: OracleHealth,
}

#[derive(Serialize, ToSchema)]
pub struct OracleHealth {
    /// Whether dialogue calls can be served (API key present or mock mode)
    pub configured: bool,
    pub mock_mode: bool,
}

/// Health check
///
/// 503 when the database is unreachable. An unconfigured oracle degrades
/// the reported status but keeps the service up: rooms and the monitor
/// view work without it.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Database unreachable", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_ok = sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&state.db)
        .await
        .is_ok();
    let oracle = OracleHealth {
        configured: state.oracle.is_configured(),
        mock_mode: state.oracle.mock_mode(),
    };

    let status = if db_ok && oracle.configured {
        "ok"
    } else {
        "degraded"
    };
    let http_status = if db_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        http_status,
        Json(HealthResponse {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            database: if db_ok { "ok" } else { "unreachable" }.to_string(),
            oracle,
        }),
    )
}

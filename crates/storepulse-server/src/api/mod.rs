mod envelope;
mod reports;

use std::time::Duration;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Extension, Json, Router,
};
use serde::Serialize;
use sqlx::PgPool;
use storepulse_engine::EngineOptions;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};

use crate::middleware::{
    enforce_rate_limit, request_id, require_bearer_auth, AuthState, RateLimitState, RequestId,
};

pub use envelope::{ApiError, ApiResponse, ErrorCode};

/// Protected routes allow this many requests per client per minute.
const REQUESTS_PER_MINUTE: usize = 120;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    /// Policies applied to every report this server builds.
    pub engine: EngineOptions,
}

#[derive(Debug, Serialize)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

pub fn default_rate_limit_state() -> RateLimitState {
    RateLimitState::new(REQUESTS_PER_MINUTE, Duration::from_secs(60))
}

/// The full router: public health check plus the authenticated, rate-limited
/// report endpoints, all behind CORS and request-id tagging.
pub fn build_app(state: AppState, auth: AuthState, rate_limit: RateLimitState) -> Router {
    let reports = Router::new()
        .route(
            "/api/v1/trigger_report",
            get(reports::trigger_report).post(reports::trigger_report),
        )
        .route("/api/v1/get_report", get(reports::get_report))
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn_with_state(
                    rate_limit,
                    enforce_rate_limit,
                ))
                .layer(axum::middleware::from_fn_with_state(
                    auth,
                    require_bearer_auth,
                )),
        );

    Router::new()
        .route("/api/v1/health", get(health))
        .merge(reports)
        .layer(
            ServiceBuilder::new()
                .layer(cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let (status, data) = match storepulse_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            HealthData {
                status: "ok",
                database: "ok",
            },
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                HealthData {
                    status: "degraded",
                    database: "unavailable",
                },
            )
        }
    };
    (status, Json(ApiResponse::new(req_id.0, data)))
}

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use storepulse_core::ReportStatus;
use uuid::Uuid;

use crate::dispatch::spawn_report_build;
use crate::middleware::RequestId;

use super::{ApiError, ApiResponse, AppState, ErrorCode};

#[derive(Debug, Deserialize)]
pub(super) struct GetReportQuery {
    pub report_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct TriggeredReport {
    report_id: Uuid,
}

#[derive(Debug, Serialize)]
pub(super) struct ReportStatusItem {
    status: ReportStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub(super) async fn trigger_report(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<TriggeredReport>>, ApiError> {
    let row = storepulse_db::create_report(&state.pool)
        .await
        .map_err(|e| ApiError::from_db(req_id.0.clone(), &e))?;

    tracing::info!(report_id = %row.report_id, request_id = %req_id.0, "report triggered");
    spawn_report_build(state.pool.clone(), row.report_id, state.engine);

    Ok(Json(ApiResponse::new(
        req_id.0,
        TriggeredReport {
            report_id: row.report_id,
        },
    )))
}

pub(super) async fn get_report(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<GetReportQuery>,
) -> Result<Json<ApiResponse<ReportStatusItem>>, ApiError> {
    let report_id = query
        .report_id
        .as_deref()
        .map(str::trim)
        .and_then(|raw| Uuid::parse_str(raw).ok())
        .ok_or_else(|| {
            ApiError::new(
                req_id.0.clone(),
                ErrorCode::BadRequest,
                "report_id query parameter must be a UUID",
            )
        })?;

    let row = storepulse_db::get_report(&state.pool, report_id)
        .await
        .map_err(|e| ApiError::from_db(req_id.0.clone(), &e))?;
    let status = row
        .status()
        .map_err(|e| ApiError::from_db(req_id.0.clone(), &e))?;

    let data = match status {
        ReportStatus::Running => ReportStatusItem {
            status,
            report: None,
            error: None,
        },
        ReportStatus::Complete => ReportStatusItem {
            status,
            report: Some(row.report.unwrap_or_default()),
            error: None,
        },
        ReportStatus::Failed => ReportStatusItem {
            status,
            report: None,
            error: Some(row.error_message.unwrap_or_default()),
        },
    };

    Ok(Json(ApiResponse::new(req_id.0, data)))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use storepulse_engine::EngineOptions;
    use tower::ServiceExt;

    use super::*;
    use crate::api::{build_app, default_rate_limit_state};
    use crate::middleware::AuthState;

    #[test]
    fn running_item_omits_report_and_error() {
        let item = ReportStatusItem {
            status: ReportStatus::Running,
            report: None,
            error: None,
        };
        let json = serde_json::to_value(&item).expect("serialize");
        assert_eq!(json, serde_json::json!({ "status": "Running" }));
    }

    fn app(pool: sqlx::PgPool) -> Router {
        let state = AppState {
            pool,
            engine: EngineOptions::default(),
        };
        let auth = AuthState::from_keys("", true).expect("auth");
        build_app(state, auth, default_rate_limit_state())
    }

    async fn get_json(app: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).expect("request"))
            .await
            .expect("response");
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        (status, serde_json::from_slice(&body).expect("json parse"))
    }

    async fn seed(pool: &sqlx::PgPool) {
        sqlx::query("INSERT INTO stores (store_id, timezone) VALUES ('s1', 'UTC')")
            .execute(pool)
            .await
            .expect("insert store");
        sqlx::query(
            "INSERT INTO business_hours (store_id, day_of_week, start_time_local, end_time_local) \
             SELECT 's1', d, TIME '09:00', TIME '17:00' FROM generate_series(0, 6) AS d",
        )
        .execute(pool)
        .await
        .expect("insert hours");
        sqlx::query(
            "INSERT INTO store_status (store_id, status, timestamp_utc) VALUES \
             ('s1', 'active', TIMESTAMPTZ '2023-01-23 09:00:00+00'), \
             ('s1', 'active', TIMESTAMPTZ '2023-01-23 17:00:00+00')",
        )
        .execute(pool)
        .await
        .expect("insert observations");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn triggered_report_completes_with_csv(pool: sqlx::PgPool) {
        seed(&pool).await;
        let app = app(pool);

        let (status, json) = get_json(&app, "/api/v1/trigger_report").await;
        assert_eq!(status, StatusCode::OK);
        let report_id = json["data"]["report_id"]
            .as_str()
            .expect("report id")
            .to_string();

        let uri = format!("/api/v1/get_report?report_id={report_id}");
        let mut last = serde_json::Value::Null;
        for _ in 0..50 {
            let (status, json) = get_json(&app, &uri).await;
            assert_eq!(status, StatusCode::OK);
            if json["data"]["status"] != "Running" {
                last = json;
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        assert_eq!(last["data"]["status"], "Complete");
        let csv = last["data"]["report"].as_str().expect("csv");
        let lines: Vec<&str> = csv.lines().collect();
        assert!(lines[0].starts_with("store_id,uptime_last_hour (in minutes)"));
        assert_eq!(lines[1], "s1,60,8,8,0,0,0");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn unknown_report_is_not_found(pool: sqlx::PgPool) {
        let app = app(pool);
        let uri = format!("/api/v1/get_report?report_id={}", Uuid::new_v4());
        let (status, json) = get_json(&app, &uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"]["code"], "not_found");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn failed_report_exposes_error(pool: sqlx::PgPool) {
        let row = storepulse_db::create_report(&pool).await.expect("create");
        storepulse_db::fail_report(&pool, row.report_id, "snapshot load failed")
            .await
            .expect("fail");

        let app = app(pool);
        let uri = format!("/api/v1/get_report?report_id={}", row.report_id);
        let (status, json) = get_json(&app, &uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["status"], "Failed");
        assert_eq!(json["data"]["error"], "snapshot load failed");
        assert!(json["data"].get("report").is_none());
    }
}

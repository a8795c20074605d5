// HTTP request handlers
use crate::domain::options::{AnalyticsOptions, BucketWidth, OptionsError};
use crate::domain::telemetry::CycleId;
use crate::infrastructure::http_response::{accepts_brotli, json_response};
use crate::infrastructure::view_mapper::{
    BatteryView, aggregates_to_view, battery_to_view, cycles_to_view, dataset_to_refresh_view,
    report_to_view,
};
use crate::presentation::app_state::AppState;
use crate::presentation::error::ApiError;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Dashboard controls; anything omitted falls back to the configured defaults.
#[derive(Debug, Default, Deserialize)]
pub struct AnalyticsQuery {
    pub bucket: Option<u32>,
    pub deep_discharge_soc: Option<f64>,
}

impl AnalyticsQuery {
    pub fn resolve(&self, defaults: AnalyticsOptions) -> Result<AnalyticsOptions, OptionsError> {
        let bucket_width = match self.bucket {
            Some(degrees) => BucketWidth::try_from(degrees)?,
            None => defaults.bucket_width,
        };
        AnalyticsOptions::new(
            bucket_width,
            self.deep_discharge_soc.unwrap_or(defaults.deep_discharge_soc),
        )
    }
}

async fn respond<T: Serialize>(data: &T, headers: &HeaderMap) -> Response {
    match json_response(StatusCode::OK, data, accepts_brotli(headers)).await {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// List the batteries this deployment may open
pub async fn list_batteries(headers: HeaderMap, State(state): State<Arc<AppState>>) -> Response {
    let batteries: Vec<BatteryView> = state
        .battery_service
        .list_batteries()
        .into_iter()
        .map(battery_to_view)
        .collect();
    respond(&batteries, &headers).await
}

/// Cycle numbers available for navigation
pub async fn list_cycles(
    Path(imei): Path<String>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    let cycles = state.analytics_service.list_cycles(&imei).await?;
    Ok(respond(&cycles_to_view(imei, cycles), &headers).await)
}

/// Metrics for one cycle plus the dataset trends
pub async fn cycle_metrics(
    Path((imei, cycle)): Path<(String, CycleId)>,
    Query(query): Query<AnalyticsQuery>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    let options = query.resolve(state.analytics_service.defaults())?;
    let report = state
        .analytics_service
        .cycle_report(&imei, cycle, &options)
        .await?;
    Ok(respond(&report_to_view(report), &headers).await)
}

/// Metrics for the most recent cycle
pub async fn latest_cycle_metrics(
    Path(imei): Path<String>,
    Query(query): Query<AnalyticsQuery>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    let options = query.resolve(state.analytics_service.defaults())?;
    let report = state
        .analytics_service
        .latest_cycle_report(&imei, &options)
        .await?;
    Ok(respond(&report_to_view(report), &headers).await)
}

/// Long-term trends across all cycles
pub async fn trends(
    Path(imei): Path<String>,
    Query(query): Query<AnalyticsQuery>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    let options = query.resolve(state.analytics_service.defaults())?;
    let aggregates = state.analytics_service.trends(&imei, &options).await?;
    Ok(respond(&aggregates_to_view(&aggregates), &headers).await)
}

/// Refetch the battery's telemetry, replacing the session dataset
pub async fn refresh_dataset(
    Path(imei): Path<String>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    let dataset = state.analytics_service.refresh(&imei).await?;
    Ok(respond(&dataset_to_refresh_view(&dataset), &headers).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::analytics_service::test_support::{IMEI, StaticRepository, service};
    use crate::application::battery_service::BatteryService;
    use crate::domain::telemetry::test_support::sample;
    use crate::presentation::routes::build_router;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    fn app(repository: StaticRepository) -> axum::Router {
        let state = Arc::new(AppState {
            battery_service: BatteryService::new(vec![IMEI.to_string()]),
            analytics_service: service(Arc::new(repository)),
        });
        build_router(state)
    }

    fn dataset() -> StaticRepository {
        StaticRepository::new(vec![
            sample(1, 0, 10.0, 80.0),
            sample(1, 60, 20.0, 60.0),
            sample(2, 120, 0.0, 60.0),
            sample(2, 180, 0.0, 60.0),
        ])
    }

    async fn get(app: axum::Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[test]
    fn test_query_falls_back_to_defaults() {
        let defaults = AnalyticsOptions::default();
        assert_eq!(AnalyticsQuery::default().resolve(defaults), Ok(defaults));

        let query = AnalyticsQuery {
            bucket: Some(20),
            deep_discharge_soc: Some(15.0),
        };
        let resolved = query.resolve(defaults).unwrap();
        assert_eq!(resolved.bucket_width, BucketWidth::Twenty);
        assert_eq!(resolved.deep_discharge_soc, 15.0);
    }

    #[tokio::test]
    async fn test_cycle_metrics_endpoint() {
        let (status, body) = get(app(dataset()), &format!("/batteries/{IMEI}/cycles/1?bucket=5")).await;

        assert_eq!(status, StatusCode::OK);
        let metrics = &body["metrics"];
        assert_eq!(metrics["cycle_number"], 1);
        assert_eq!(metrics["duration_hours"], 1.0);
        assert_eq!(metrics["performance"]["average_speed"], 15.0);
        assert_eq!(metrics["soc"]["average"], 70.0);
        assert_eq!(metrics["temperature"]["bucket_width"], 5.0);
        assert_eq!(body["trends"]["total_cycles"], 2);
    }

    #[tokio::test]
    async fn test_latest_reports_data_gap_and_undefined_efficiency() {
        let (status, body) = get(app(dataset()), &format!("/batteries/{IMEI}/latest")).await;

        assert_eq!(status, StatusCode::OK);
        let metrics = &body["metrics"];
        assert_eq!(metrics["cycle_number"], 2);
        assert_eq!(metrics["performance"]["possible_data_gap"], true);
        assert!(metrics["efficiency_proxy"].is_null());
    }

    #[tokio::test]
    async fn test_invalid_bucket_is_bad_request() {
        let (status, body) = get(app(dataset()), &format!("/batteries/{IMEI}/cycles/1?bucket=7")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["retry"], false);
    }

    #[tokio::test]
    async fn test_unknown_battery_is_not_found() {
        let (status, _) = get(app(dataset()), "/batteries/123/cycles").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_upstream_failure_asks_for_retry() {
        let (status, body) = get(app(StaticRepository::failing()), &format!("/batteries/{IMEI}/trends")).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["retry"], true);
    }

    #[tokio::test]
    async fn test_list_cycles_and_batteries() {
        let (status, body) = get(app(dataset()), &format!("/batteries/{IMEI}/cycles")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cycles"], serde_json::json!([1, 2]));
        assert_eq!(body["latest"], 2);

        let (status, body) = get(app(dataset()), "/batteries").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["imei"], IMEI);
    }
}

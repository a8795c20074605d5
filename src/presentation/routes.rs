// Router construction
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    cycle_metrics, health_check, latest_cycle_metrics, list_batteries, list_cycles,
    refresh_dataset, trends,
};
use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/batteries", get(list_batteries))
        .route("/batteries/:imei/cycles", get(list_cycles))
        .route("/batteries/:imei/cycles/:cycle", get(cycle_metrics))
        .route("/batteries/:imei/latest", get(latest_cycle_metrics))
        .route("/batteries/:imei/trends", get(trends))
        .route("/batteries/:imei/refresh", post(refresh_dataset))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

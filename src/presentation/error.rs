// API errors and their HTTP mapping
use crate::application::analytics_service::AnalyticsError;
use crate::domain::options::OptionsError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Analytics(#[from] AnalyticsError),
    #[error(transparent)]
    InvalidOptions(#[from] OptionsError),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    /// Set when the same request may succeed once the upstream recovers
    retry: bool,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Analytics(AnalyticsError::UnknownBattery(_)) => StatusCode::NOT_FOUND,
            ApiError::Analytics(AnalyticsError::NoData(_)) => StatusCode::NOT_FOUND,
            ApiError::Analytics(AnalyticsError::Fetch { .. }) => StatusCode::BAD_GATEWAY,
            ApiError::InvalidOptions(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            error: self.to_string(),
            retry: status == StatusCode::BAD_GATEWAY,
        };
        (status, Json(body)).into_response()
    }
}

//! Maps core errors onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use care_kpi_core::KpiError;

#[derive(Debug)]
pub enum AppError {
    /// Missing or invalid bearer token.
    Unauthenticated(String),
    Kpi(KpiError),
}

impl From<KpiError> for AppError {
    fn from(err: KpiError) -> Self {
        Self::Kpi(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Unauthenticated(msg) => (StatusCode::UNAUTHORIZED, msg),
            Self::Kpi(err) => {
                let status = StatusCode::from_u16(err.http_status())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                if status.is_server_error() {
                    tracing::error!(error = %err, "request failed");
                    // Internal details stay in the log.
                    (status, "internal server error".to_string())
                } else {
                    (status, err.to_string())
                }
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

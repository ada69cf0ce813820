use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::sheets::{GatewayError, GatewayErrorKind};

pub const RENAMED_TAB_MESSAGE: &str = "unable to retrieve the contents of the table. If you have renamed the tab, please resynchronize";

#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    Unauthorized(String),
    QuotaExceeded(String),
    MethodDisabled(String),
    UnsupportedMethod(String),
    InvalidInput(String),
    Upstream(String),
    RateLimited(String),
    Internal(String),
    Database(sqlx::Error),
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::NotFound(msg) => write!(f, "Not Found: {msg}"),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {msg}"),
            AppError::QuotaExceeded(msg) => write!(f, "Quota Exceeded: {msg}"),
            AppError::MethodDisabled(msg) => write!(f, "Method Disabled: {msg}"),
            AppError::UnsupportedMethod(msg) => write!(f, "Unsupported Method: {msg}"),
            AppError::InvalidInput(msg) => write!(f, "Invalid Input: {msg}"),
            AppError::Upstream(msg) => write!(f, "Upstream Failure: {msg}"),
            AppError::RateLimited(msg) => write!(f, "Rate Limited: {msg}"),
            AppError::Internal(msg) => write!(f, "Internal Error: {msg}"),
            AppError::Database(err) => write!(f, "Database Error: {err}"),
        }
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::QuotaExceeded(_) | AppError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::MethodDisabled(_) | AppError::UnsupportedMethod(_) => {
                StatusCode::METHOD_NOT_ALLOWED
            }
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::Upstream(_) | AppError::Internal(_) | AppError::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            AppError::NotFound(msg)
            | AppError::Unauthorized(msg)
            | AppError::QuotaExceeded(msg)
            | AppError::MethodDisabled(msg)
            | AppError::UnsupportedMethod(msg)
            | AppError::InvalidInput(msg)
            | AppError::RateLimited(msg) => msg,
            AppError::Upstream(msg) => {
                tracing::warn!("Upstream failure: {msg}");
                msg
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {msg}");
                "Internal server error".to_string()
            }
            AppError::Database(err) => {
                tracing::error!("Database error: {err}");
                "Internal server error".to_string()
            }
        };

        let body = json!({ "success": false, "message": message });
        (status, axum::Json(body)).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err)
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err.kind {
            GatewayErrorKind::RangeNotFound => {
                tracing::debug!("Range lookup failed: {}", err.message);
                AppError::Upstream(RENAMED_TAB_MESSAGE.to_string())
            }
            GatewayErrorKind::Unauthorized => AppError::Upstream(format!(
                "The spreadsheet owner's Google credentials were rejected: {}",
                err.message
            )),
            GatewayErrorKind::Transport | GatewayErrorKind::Api => {
                AppError::Upstream(format!("Spreadsheet request failed: {}", err.message))
            }
        }
    }
}

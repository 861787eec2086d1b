use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Machine-readable error codes returned to clients alongside the message.
pub mod code {
    pub const MISSING_ORDER_ID: &str = "MISSING_ORDER_ID";
    pub const ORDER_NOT_FOUND: &str = "ORDER_NOT_FOUND";
    pub const INVALID_REQUEST: &str = "INVALID_REQUEST";
    pub const PAYMENT_NOT_COMPLETED: &str = "PAYMENT_NOT_COMPLETED";
    pub const TEST_ORDER_REJECTED: &str = "TEST_ORDER_REJECTED";
    pub const PAYMENT_CANCELLED: &str = "PAYMENT_CANCELLED";
    pub const PAYMENT_FAILED: &str = "PAYMENT_FAILED";
    pub const PAYMENT_EXPIRED: &str = "PAYMENT_EXPIRED";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {message}")]
    NotFound {
        message: String,
        code: &'static str,
    },

    #[error("Bad request: {message}")]
    BadRequest {
        message: String,
        code: &'static str,
    },

    #[error("Forbidden: {message}")]
    Forbidden {
        message: String,
        code: &'static str,
    },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found(message: impl Into<String>, code: &'static str) -> Self {
        AppError::NotFound {
            message: message.into(),
            code,
        }
    }

    pub fn bad_request(message: impl Into<String>, code: &'static str) -> Self {
        AppError::BadRequest {
            message: message.into(),
            code,
        }
    }

    pub fn forbidden(message: impl Into<String>, code: &'static str) -> Self {
        AppError::Forbidden {
            message: message.into(),
            code,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse {
    success: bool,
    error: String,
    error_code: &'static str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, error_code) = match &self {
            AppError::NotFound { message, code } => {
                (StatusCode::NOT_FOUND, message.clone(), *code)
            }
            AppError::BadRequest { message, code } => {
                (StatusCode::BAD_REQUEST, message.clone(), *code)
            }
            AppError::Forbidden { message, code } => {
                (StatusCode::FORBIDDEN, message.clone(), *code)
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    code::INTERNAL_ERROR,
                )
            }
            AppError::Pool(e) => {
                tracing::error!("Pool error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    code::INTERNAL_ERROR,
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    code::INTERNAL_ERROR,
                )
            }
        };

        let body = ErrorResponse {
            success: false,
            error,
            error_code,
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

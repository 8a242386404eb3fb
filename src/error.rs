//! Error handling for the ShopPulse backend
//!
//! Centralized error management providing consistent error types,
//! HTTP status code mapping, and automatic error logging.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;
use tracing::error;

use crate::shopify::ShopifyError;

/// Error type covering all platform operations
#[derive(Debug)]
pub enum AppError {
    /// Database-related errors
    Database(anyhow::Error),
    /// Shopify API errors (token exchange, order fetch)
    Shopify(ShopifyError),
    /// Validation errors
    Validation(String),
    /// Not found errors
    NotFound(String),
    /// Internal server errors
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Database(err) => write!(f, "Database error: {}", err),
            AppError::Shopify(err) => write!(f, "Shopify error: {}", err),
            AppError::Validation(msg) => write!(f, "Validation error: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

/// Converts application errors to proper HTTP responses with status codes
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, error_code) = match &self {
            AppError::Database(_) => {
                error!("Database error: {}", self);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string(), "DATABASE_ERROR")
            }
            AppError::Shopify(err) => {
                // Upstream details stay in the log; callers get a generic body.
                error!("Shopify error: {}", err);
                (StatusCode::BAD_GATEWAY, "Shopify service unavailable".to_string(), "SHOPIFY_ERROR")
            }
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, msg.clone(), "VALIDATION_ERROR")
            }
            AppError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, msg.clone(), "NOT_FOUND")
            }
            AppError::Internal(msg) => {
                error!("Internal error: {}", self);
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone(), "INTERNAL_ERROR")
            }
        };

        let body = Json(json!({
            "success": false,
            "error": {
                "code": error_code,
                "message": error_message
            },
            "timestamp": chrono::Utc::now()
        }));

        (status, body).into_response()
    }
}

/// Convenient result type for all application operations
pub type AppResult<T> = Result<T, AppError>;

/// Converts generic anyhow errors to application errors
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Database(err)
    }
}

/// Converts database errors to application errors
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(anyhow::Error::from(err))
    }
}

/// Converts JSON serialization errors to application errors
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Validation(format!("JSON parsing error: {}", err))
    }
}

/// Converts Shopify client errors to application errors
impl From<ShopifyError> for AppError {
    fn from(err: ShopifyError) -> Self {
        AppError::Shopify(err)
    }
}

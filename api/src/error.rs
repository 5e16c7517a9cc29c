use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use maieutic_core::error::{self, ApiError};
use uuid::Uuid;

use crate::oracle::OracleError;

/// Internal error type that converts to structured API responses
#[derive(Debug)]
pub enum AppError {
    /// Validation error (400)
    Validation {
        message: String,
        field: Option<String>,
        received: Option<serde_json::Value>,
        docs_hint: Option<String>,
    },
    /// Room or student session not found (404)
    NotFound { what: String },
    /// Acting on an already-completed student session (409)
    SessionCompleted { student_session_id: Uuid },
    /// A turn for this student session is already in flight (409)
    TurnInFlight { student_session_id: Uuid },
    /// Write-once value already set (409)
    Conflict { message: String },
    /// Oracle unavailable or returned garbage (502)
    Oracle(OracleError),
    /// Database error (500)
    Database(sqlx::Error),
    /// Internal error (500)
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let request_id = Uuid::now_v7().to_string();

        let (status, api_error) = match self {
            AppError::Validation {
                message,
                field,
                received,
                docs_hint,
            } => (
                StatusCode::BAD_REQUEST,
                ApiError {
                    error: error::codes::VALIDATION_FAILED.to_string(),
                    message,
                    field,
                    received,
                    request_id,
                    docs_hint,
                },
            ),
            AppError::NotFound { what } => (
                StatusCode::NOT_FOUND,
                ApiError {
                    error: error::codes::NOT_FOUND.to_string(),
                    message: format!("{} not found", what),
                    field: None,
                    received: None,
                    request_id,
                    docs_hint: None,
                },
            ),
            AppError::SessionCompleted { student_session_id } => (
                StatusCode::CONFLICT,
                ApiError {
                    error: error::codes::SESSION_COMPLETED.to_string(),
                    message: format!(
                        "Student session '{}' is already completed",
                        student_session_id
                    ),
                    field: None,
                    received: None,
                    request_id,
                    docs_hint: Some(
                        "Completed sessions are read-only. Fetch the final score from the monitor view."
                            .to_string(),
                    ),
                },
            ),
            AppError::TurnInFlight { student_session_id } => (
                StatusCode::CONFLICT,
                ApiError {
                    error: error::codes::TURN_IN_FLIGHT.to_string(),
                    message: format!(
                        "A turn for student session '{}' is still being processed",
                        student_session_id
                    ),
                    field: None,
                    received: None,
                    request_id,
                    docs_hint: Some(
                        "Turns within one student session are strictly sequential. \
                         Wait for the outstanding oracle call to finish, then retry."
                            .to_string(),
                    ),
                },
            ),
            AppError::Conflict { message } => (
                StatusCode::CONFLICT,
                ApiError {
                    error: error::codes::CONFLICT.to_string(),
                    message,
                    field: None,
                    received: None,
                    request_id,
                    docs_hint: None,
                },
            ),
            AppError::Oracle(err) => {
                tracing::error!(error = %err, "oracle call failed");
                (
                    StatusCode::BAD_GATEWAY,
                    ApiError {
                        error: error::codes::ORACLE_UNAVAILABLE.to_string(),
                        message: "The oracle is currently unavailable".to_string(),
                        field: None,
                        received: None,
                        request_id,
                        docs_hint: Some(
                            "Your message was recorded; nothing is lost. Retry shortly."
                                .to_string(),
                        ),
                    },
                )
            }
            AppError::Database(err) => {
                tracing::error!("Database error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError {
                        error: error::codes::INTERNAL_ERROR.to_string(),
                        message: "An internal error occurred".to_string(),
                        field: None,
                        received: None,
                        request_id,
                        docs_hint: None,
                    },
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError {
                        error: error::codes::INTERNAL_ERROR.to_string(),
                        message: "An internal error occurred".to_string(),
                        field: None,
                        received: None,
                        request_id,
                        docs_hint: None,
                    },
                )
            }
        };

        (status, Json(api_error)).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err)
    }
}

impl From<OracleError> for AppError {
    fn from(err: OracleError) -> Self {
        AppError::Oracle(err)
    }
}

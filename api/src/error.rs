use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use teaminsight_core::error::{self, ApiError};

/// Fixed Hebrew apology shown to students on any transient failure.
/// Raw error payloads never reach the client.
pub const STUDENT_APOLOGY: &str = "מצטערים, משהו השתבש. נסו שוב בעוד רגע.";

/// Internal error type that converts to structured API responses
#[derive(Debug)]
pub enum AppError {
    /// Missing or invalid team_session cookie (401)
    Unauthorized { message: String },
    /// Team or session absent (404)
    NotFound { resource: String },
    /// Validation error (400)
    Validation {
        message: String,
        field: Option<String>,
        docs_hint: Option<String>,
    },
    /// Wrong session status for the requested operation (409)
    Conflict {
        message: String,
        docs_hint: Option<String>,
    },
    /// Oracle transport failure — the turn aborts with no partial writes (500)
    Oracle(reqwest::Error),
    /// Database error (500)
    Database(sqlx::Error),
    /// Internal error (500)
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let request_id = uuid::Uuid::now_v7().to_string();

        let (status, api_error) = match self {
            AppError::Unauthorized { message } => (
                StatusCode::UNAUTHORIZED,
                ApiError {
                    error: error::codes::UNAUTHORIZED.to_string(),
                    message,
                    field: None,
                    request_id,
                    docs_hint: Some("Authenticate with a valid team_session cookie.".to_string()),
                },
            ),
            AppError::NotFound { resource } => (
                StatusCode::NOT_FOUND,
                ApiError {
                    error: error::codes::NOT_FOUND.to_string(),
                    message: format!("{resource} not found"),
                    field: None,
                    request_id,
                    docs_hint: None,
                },
            ),
            AppError::Validation {
                message,
                field,
                docs_hint,
            } => (
                StatusCode::BAD_REQUEST,
                ApiError {
                    error: error::codes::VALIDATION_FAILED.to_string(),
                    message,
                    field,
                    request_id,
                    docs_hint,
                },
            ),
            AppError::Conflict { message, docs_hint } => (
                StatusCode::CONFLICT,
                ApiError {
                    error: error::codes::CONFLICT.to_string(),
                    message,
                    field: None,
                    request_id,
                    docs_hint,
                },
            ),
            AppError::Oracle(err) => {
                tracing::error!("Oracle call failed: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError {
                        error: error::codes::ORACLE_UNAVAILABLE.to_string(),
                        message: STUDENT_APOLOGY.to_string(),
                        field: None,
                        request_id,
                        docs_hint: None,
                    },
                )
            }
            AppError::Database(err) => {
                tracing::error!("Database error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError {
                        error: error::codes::INTERNAL_ERROR.to_string(),
                        message: STUDENT_APOLOGY.to_string(),
                        field: None,
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
                        message: STUDENT_APOLOGY.to_string(),
                        field: None,
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

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Oracle(err)
    }
}

impl From<teaminsight_core::session::SessionStateError> for AppError {
    fn from(err: teaminsight_core::session::SessionStateError) -> Self {
        AppError::Conflict {
            message: err.to_string(),
            docs_hint: None,
        }
    }
}

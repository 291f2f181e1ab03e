//! Error types and HTTP response handling.
//!
//! Handlers return `AppError`, which maps to a status code and a JSON body.
//! Storage failures are logged with their full cause; clients only see a
//! generic message.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use crate::validation::ValidationIssue;

#[derive(Error, Debug)]
pub enum AppError {
    /// Body failed schema validation (400)
    #[error("invalid data: {} issue(s)", .0.len())]
    Validation(Vec<ValidationIssue>),

    /// Body could not be read as JSON (400)
    #[error("{0}")]
    BadRequest(String),

    /// Wrong username or password (401)
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Database failure (500). `action` is the message shown to the client.
    #[error("{action}: {cause:#}")]
    Storage { action: String, cause: anyhow::Error },
}

impl AppError {
    /// Wrap a storage error, for use with `map_err`
    pub fn storage(action: impl Into<String>) -> impl FnOnce(anyhow::Error) -> AppError {
        let action = action.into();
        move |cause| AppError::Storage { action, cause }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<ValidationIssue> for AppError {
    fn from(issue: ValidationIssue) -> Self {
        AppError::Validation(vec![issue])
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<Vec<ValidationIssue>>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::Validation(issues) => {
                warn!(issues = issues.len(), "Rejected invalid request body");
                (
                    StatusCode::BAD_REQUEST,
                    ErrorBody {
                        message: "Invalid data".to_string(),
                        errors: Some(issues),
                    },
                )
            }
            AppError::BadRequest(message) => {
                warn!(%message, "Rejected malformed request");
                (
                    StatusCode::BAD_REQUEST,
                    ErrorBody {
                        message,
                        errors: None,
                    },
                )
            }
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    message: "Invalid credentials".to_string(),
                    errors: None,
                },
            ),
            AppError::Storage { action, cause } => {
                error!(error = %format!("{cause:#}"), "{}", action);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        message: action,
                        errors: None,
                    },
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

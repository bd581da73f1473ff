use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;
use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

/// Why an attempt was refused by the scheduled window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowError {
    NotStarted,
    Ended,
}

impl WindowError {
    pub fn reason(&self) -> &'static str {
        match self {
            WindowError::NotStarted => "not_started",
            WindowError::Ended => "ended",
        }
    }
}

impl fmt::Display for WindowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowError::NotStarted => write!(f, "test has not started yet"),
            WindowError::Ended => write!(f, "test window has ended"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Not assigned: {0}")]
    NotAssigned(String),

    #[error("Already attempted: {0}")]
    AlreadyAttempted(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Window error: {0}")]
    Window(WindowError),

    #[error("No match: {0}")]
    NoMatch(String),

    #[error("Unknown question: {0}")]
    UnknownQuestion(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),

    #[error("HTTP error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Multipart error: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),

    #[error("Excel export error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
}

impl Error {
    /// Stable machine-readable kind reported in the `error` field.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::BadRequest(_) | Error::Json(_) | Error::Multipart(_) => "bad_request",
            Error::Validation(_) => "validation_error",
            Error::Unauthorized(_) => "unauthorized",
            Error::Forbidden(_) => "forbidden",
            Error::NotFound(_) => "not_found",
            Error::NotAssigned(_) => "not_assigned",
            Error::AlreadyAttempted(_) => "already_attempted",
            Error::InvalidTransition(_) => "invalid_transition",
            Error::Window(_) => "window_error",
            Error::NoMatch(_) => "no_match",
            Error::UnknownQuestion(_) => "unknown_question",
            Error::Extraction(_) => "extraction_error",
            Error::Database(_) | Error::Migrate(_) | Error::Reqwest(_) => "dependency_failure",
            Error::Config(_)
            | Error::Anyhow(_)
            | Error::Internal(_)
            | Error::Xlsx(_) => "internal_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Error::BadRequest(_)
            | Error::Json(_)
            | Error::Multipart(_)
            | Error::Validation(_)
            | Error::UnknownQuestion(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::Forbidden(_) | Error::NotAssigned(_) | Error::Window(_) => {
                StatusCode::FORBIDDEN
            }
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::AlreadyAttempted(_) | Error::InvalidTransition(_) => StatusCode::CONFLICT,
            Error::NoMatch(_) | Error::Extraction(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Database(_) | Error::Migrate(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Reqwest(_) => StatusCode::BAD_GATEWAY,
            Error::Config(_) | Error::Anyhow(_) | Error::Internal(_) | Error::Xlsx(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let kind = self.kind();
        let body = match &self {
            Error::Validation(errs) => {
                let fields: serde_json::Map<String, serde_json::Value> = errs
                    .field_errors()
                    .into_iter()
                    .map(|(field, list)| {
                        let messages: Vec<String> = list
                            .iter()
                            .map(|e| {
                                e.message
                                    .as_ref()
                                    .map(|m| m.to_string())
                                    .unwrap_or_else(|| e.code.to_string())
                            })
                            .collect();
                        (field.to_string(), json!(messages))
                    })
                    .collect();
                json!({ "error": kind, "message": "Request validation failed", "fields": fields })
            }
            Error::Window(w) => {
                json!({ "error": kind, "reason": w.reason(), "message": w.to_string() })
            }
            Error::Database(err) => {
                tracing::error!(error = ?err, "storage failure");
                json!({ "error": kind, "message": "Storage is unavailable" })
            }
            Error::Config(_) | Error::Anyhow(_) | Error::Internal(_) | Error::Xlsx(_) => {
                tracing::error!(error = %self, "internal failure");
                json!({ "error": kind, "message": "An unexpected error occurred" })
            }
            other => json!({ "error": kind, "message": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Error::NotFound("Resource not found".to_string()),
            other => Error::Database(other),
        }
    }
}

//! The C8 canonical error taxonomy (spec §7) and its one-time HTTP mapping.
//!
//! Every repository and adapter returns `TamsResult<T>`. The HTTP layer is
//! purely a serializer of this taxonomy — it never invents its own status
//! codes. `severity` rides alongside `code` for logging/audit purposes;
//! high/critical errors are logged at `error!`/`tracing::error!` so an
//! external audit-log collector (out of core scope, spec §1) can pick them
//! up from the log stream.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Error, Debug)]
pub enum TamsError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("storage error: {0}")]
    StorageError(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("invalid timerange: {0}")]
    InvalidTimerange(String),

    #[error("flow is read-only: {flow_id}")]
    ReadOnlyFlow { flow_id: String },

    #[error("object not found: {object_id}")]
    ObjectNotFound { object_id: String },

    #[error("flow not found: {flow_id}")]
    FlowNotFound { flow_id: String },

    #[error("source not found: {source_id}")]
    SourceNotFound { source_id: String },

    #[error("dependent entities exist: {0}")]
    DependentEntitiesExist(String),

    #[error("object still referenced by flows: {object_id}")]
    ObjectStillReferenced { object_id: String },

    #[error("object already allocated: {object_id}")]
    ObjectAlreadyExists { object_id: String },

    #[error("{0}")]
    Config(#[from] config::ConfigError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Uuid(#[from] uuid::Error),

    #[error("{0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("{0}")]
    Clickhouse(#[from] clickhouse::error::Error),
}

impl TamsError {
    /// The canonical C8 error code string, used in API responses and logs.
    pub fn code(&self) -> &'static str {
        match self {
            TamsError::NotFound(_)
            | TamsError::FlowNotFound { .. }
            | TamsError::SourceNotFound { .. }
            | TamsError::ObjectNotFound { .. } => "NotFound",
            TamsError::Conflict(_)
            | TamsError::DependentEntitiesExist(_)
            | TamsError::ObjectStillReferenced { .. } => "Conflict",
            TamsError::Forbidden(_) | TamsError::ReadOnlyFlow { .. } => "Forbidden",
            TamsError::Validation(_) | TamsError::InvalidTimerange(_) | TamsError::Uuid(_) => {
                "ValidationError"
            }
            TamsError::BadRequest(_) | TamsError::ObjectAlreadyExists { .. } => "BadRequest",
            TamsError::StorageUnavailable(_) => "StorageUnavailable",
            TamsError::StorageError(_) | TamsError::Clickhouse(_) => "StorageError",
            TamsError::Unauthorized(_) | TamsError::Jwt(_) => "Unauthorized",
            TamsError::Config(_) | TamsError::Io(_) | TamsError::Json(_) | TamsError::Http(_) => {
                "Internal"
            }
            TamsError::Internal(_) => "Internal",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            TamsError::Conflict(_)
            | TamsError::DependentEntitiesExist(_)
            | TamsError::ObjectStillReferenced { .. }
            | TamsError::StorageUnavailable(_)
            | TamsError::StorageError(_)
            | TamsError::Clickhouse(_) => Severity::High,
            TamsError::Internal(_) | TamsError::Config(_) | TamsError::Io(_) => {
                Severity::Critical
            }
            TamsError::Forbidden(_) | TamsError::ReadOnlyFlow { .. } | TamsError::Unauthorized(_) => {
                Severity::Medium
            }
            _ => Severity::Low,
        }
    }

    fn http_status(&self) -> StatusCode {
        match self {
            TamsError::NotFound(_)
            | TamsError::FlowNotFound { .. }
            | TamsError::SourceNotFound { .. }
            | TamsError::ObjectNotFound { .. } => StatusCode::NOT_FOUND,
            TamsError::Conflict(_)
            | TamsError::DependentEntitiesExist(_)
            | TamsError::ObjectStillReferenced { .. } => StatusCode::CONFLICT,
            TamsError::Forbidden(_) | TamsError::ReadOnlyFlow { .. } => StatusCode::FORBIDDEN,
            TamsError::Validation(_) | TamsError::InvalidTimerange(_) | TamsError::Uuid(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            TamsError::BadRequest(_) | TamsError::ObjectAlreadyExists { .. } => {
                StatusCode::BAD_REQUEST
            }
            TamsError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            TamsError::Unauthorized(_) | TamsError::Jwt(_) => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for TamsError {
    fn into_response(self) -> Response {
        let status = self.http_status();
        let severity = self.severity();

        match severity {
            Severity::Critical => tracing::error!(code = self.code(), "{}", self),
            Severity::High => tracing::error!(code = self.code(), "{}", self),
            Severity::Medium => tracing::warn!(code = self.code(), "{}", self),
            Severity::Low => tracing::debug!(code = self.code(), "{}", self),
        }

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            "internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = Json(json!({
            "error": {
                "code": self.code(),
                "message": message,
                "severity": severity,
            }
        }));

        (status, body).into_response()
    }
}

pub type TamsResult<T> = Result<T, TamsError>;

pub fn validation_error(msg: impl Into<String>) -> TamsError {
    TamsError::Validation(msg.into())
}

pub fn not_found(msg: impl Into<String>) -> TamsError {
    TamsError::NotFound(msg.into())
}

pub fn bad_request(msg: impl Into<String>) -> TamsError {
    TamsError::BadRequest(msg.into())
}

pub fn internal_error(msg: impl Into<String>) -> TamsError {
    TamsError::Internal(msg.into())
}

impl From<chrono::ParseError> for TamsError {
    fn from(err: chrono::ParseError) -> Self {
        TamsError::Validation(format!("invalid timestamp: {err}"))
    }
}

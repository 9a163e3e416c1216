//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Failures while building the catalog snapshot. Fatal at startup.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("reflection: {0}")]
    Reflection(#[from] sqlx::Error),
    #[error("missing control table: {0}")]
    MissingControlTable(&'static str),
    #[error("missing reference: {kind} '{name}'")]
    MissingReference { kind: &'static str, name: String },
    #[error("validation: {0}")]
    Validation(String),
}

/// Failures while reading process settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing setting: {0}")]
    Missing(&'static str),
    #[error("invalid setting {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("operation not permitted: {0}")]
    OperationNotPermitted(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    #[error("internal fault: {0}")]
    InternalFault(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
}

/// Transport-independent classification of an [`AppError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FaultKind {
    NotFound,
    InvalidArgument,
    OperationNotPermitted,
    Conflict,
    InvalidOperation,
    InternalFault,
}

impl FaultKind {
    pub fn code(self) -> &'static str {
        match self {
            FaultKind::NotFound => "not_found",
            FaultKind::InvalidArgument => "invalid_argument",
            FaultKind::OperationNotPermitted => "operation_not_permitted",
            FaultKind::Conflict => "conflict",
            FaultKind::InvalidOperation => "invalid_operation",
            FaultKind::InternalFault => "internal_fault",
        }
    }
}

impl AppError {
    pub fn kind(&self) -> FaultKind {
        match self {
            AppError::NotFound(_) => FaultKind::NotFound,
            AppError::InvalidArgument(_) => FaultKind::InvalidArgument,
            AppError::OperationNotPermitted(_) => FaultKind::OperationNotPermitted,
            AppError::Conflict(_) => FaultKind::Conflict,
            AppError::InvalidOperation(_) => FaultKind::InvalidOperation,
            AppError::InternalFault(_) | AppError::Catalog(_) | AppError::Db(_) => FaultKind::InternalFault,
        }
    }
}

/// HTTP status per fault kind. Owned by the transport layer and overridable from settings.
#[derive(Clone, Debug)]
pub struct StatusMap {
    pub not_found: StatusCode,
    pub invalid_argument: StatusCode,
    pub operation_not_permitted: StatusCode,
    pub conflict: StatusCode,
    pub invalid_operation: StatusCode,
    pub internal_fault: StatusCode,
}

impl Default for StatusMap {
    fn default() -> Self {
        StatusMap {
            not_found: StatusCode::NOT_FOUND,
            invalid_argument: StatusCode::BAD_REQUEST,
            operation_not_permitted: StatusCode::METHOD_NOT_ALLOWED,
            conflict: StatusCode::CONFLICT,
            invalid_operation: StatusCode::UNPROCESSABLE_ENTITY,
            internal_fault: StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl StatusMap {
    pub fn status(&self, kind: FaultKind) -> StatusCode {
        match kind {
            FaultKind::NotFound => self.not_found,
            FaultKind::InvalidArgument => self.invalid_argument,
            FaultKind::OperationNotPermitted => self.operation_not_permitted,
            FaultKind::Conflict => self.conflict,
            FaultKind::InvalidOperation => self.invalid_operation,
            FaultKind::InternalFault => self.internal_fault,
        }
    }

    pub fn render(&self, err: AppError) -> ApiError {
        ApiError {
            status: self.status(err.kind()),
            err,
        }
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// An [`AppError`] with its status already chosen by a [`StatusMap`].
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub err: AppError,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::warn!(error = %self.err, status = %self.status, "request failed");
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.err.kind().code().to_string(),
                message: self.err.to_string(),
                details: None,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        StatusMap::default().render(self).into_response()
    }
}

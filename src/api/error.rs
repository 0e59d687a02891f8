//! Structured API errors. Every kind renders the same `{"message": "error: .."}`
//! body; the kinds differ in HTTP status and log level.

use crate::api::models::ErrorBody;
use crate::database_ops::filters::FilterError;
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use sqlx::error::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("database unavailable: {0}")]
    DatabaseUnavailable(String),
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
    #[error("{0}")]
    Database(String),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::DatabaseUnavailable(_) => "DATABASE_UNAVAILABLE",
            Self::ConstraintViolation(_) => "CONSTRAINT_VIOLATION",
            Self::Database(_) => "DATABASE_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::DatabaseUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::ConstraintViolation(_) => StatusCode::CONFLICT,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// With `legacy_status` every error answers 200, as older clients expect.
    pub fn to_response(&self, legacy_status: bool) -> HttpResponse {
        let status = if legacy_status {
            StatusCode::OK
        } else {
            self.status()
        };
        HttpResponse::build(status).json(ErrorBody::from_error(self))
    }

    pub fn log(&self, endpoint: &str) {
        if self.status().is_client_error() {
            tracing::warn!(endpoint, code = self.code(), error = %self, "request rejected");
        } else {
            tracing::error!(endpoint, code = self.code(), error = %self, "request failed");
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_) => Self::DatabaseUnavailable(err.to_string()),
            sqlx::Error::RowNotFound => Self::NotFound(err.to_string()),
            sqlx::Error::Database(ref db) => match db.kind() {
                ErrorKind::UniqueViolation
                | ErrorKind::ForeignKeyViolation
                | ErrorKind::NotNullViolation
                | ErrorKind::CheckViolation => Self::ConstraintViolation(db.message().to_string()),
                _ => Self::Database(err.to_string()),
            },
            other => Self::Database(other.to_string()),
        }
    }
}

impl From<FilterError> for ApiError {
    fn from(err: FilterError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        self.status()
    }

    fn error_response(&self) -> HttpResponse {
        self.to_response(false)
    }
}

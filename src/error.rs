//! Structured error types for API responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors
    MissingRequiredField,
    InvalidFieldValue,
    AlreadyExists,
    ProtectedColumn,

    // Not found errors
    ColumnNotFound,
    TaskNotFound,

    // Internal errors
    DatabaseError,
    InternalError,
}

impl ErrorCode {
    /// HTTP status this code is reported with.
    pub fn status(self) -> StatusCode {
        match self {
            ErrorCode::MissingRequiredField
            | ErrorCode::InvalidFieldValue
            | ErrorCode::AlreadyExists
            | ErrorCode::ProtectedColumn => StatusCode::BAD_REQUEST,
            ErrorCode::ColumnNotFound | ErrorCode::TaskNotFound => StatusCode::NOT_FOUND,
            ErrorCode::DatabaseError | ErrorCode::InternalError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Structured error returned by the store and the REST handlers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            field: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    // Convenience constructors

    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingRequiredField,
            format!("{} is required", field),
        )
        .with_field(field)
    }

    pub fn invalid_value(field: &str, reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidFieldValue, reason).with_field(field)
    }

    pub fn title_taken(title: &str) -> Self {
        Self::new(
            ErrorCode::AlreadyExists,
            format!("Column title already exists: {}", title),
        )
        .with_field("title")
    }

    pub fn protected_column(slug: &str) -> Self {
        Self::new(
            ErrorCode::ProtectedColumn,
            format!("Column '{}' is a default column and cannot be deleted", slug),
        )
    }

    pub fn column_not_found(id: i64) -> Self {
        Self::new(ErrorCode::ColumnNotFound, format!("Column not found: {}", id))
    }

    pub fn task_not_found(id: i64) -> Self {
        Self::new(ErrorCode::TaskNotFound, format!("Task not found: {}", id))
    }

    pub fn database(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::DatabaseError, err.to_string())
    }

    pub fn internal(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::InternalError, err.to_string())
    }

    pub fn status(&self) -> StatusCode {
        self.code.status()
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

// Store functions return anyhow; recover the structured error when there is one.
impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<ApiError>() {
            Ok(api_err) => api_err,
            Err(err) => match err.downcast::<rusqlite::Error>() {
                Ok(sql_err) => ApiError::database(sql_err),
                Err(err) => ApiError::internal(err),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = ?self.code, "{}", self.message);
        } else {
            tracing::debug!(code = ?self.code, "{}", self.message);
        }
        (status, Json(self)).into_response()
    }
}

/// Result type for API operations.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::missing_field("title").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::title_taken("To Do").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::protected_column("todo").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::column_not_found(9).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::task_not_found(9).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::internal("boom").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_serializes_message_field() {
        let json = serde_json::to_value(ApiError::missing_field("title")).unwrap();
        assert_eq!(json["code"], "MISSING_REQUIRED_FIELD");
        assert_eq!(json["message"], "title is required");
        assert_eq!(json["field"], "title");
    }

    #[test]
    fn test_anyhow_roundtrip_keeps_code() {
        let err: anyhow::Error = ApiError::task_not_found(3).into();
        let back = ApiError::from(err);
        assert_eq!(back.code, ErrorCode::TaskNotFound);

        let other = ApiError::from(anyhow::anyhow!("disk on fire"));
        assert_eq!(other.code, ErrorCode::InternalError);
    }
}

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

use crate::repository::RepoError;

/// FieldError
///
/// One violated constraint on an incoming payload, addressed by its field path
/// (`email`, `casa_id`, `body`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// AppError
///
/// Every way a request can fail. Each variant maps to exactly one HTTP status, so
/// handlers return `Result<_, AppError>` and never build error responses by hand.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AppError {
    #[error("validation failed")]
    Validation(Vec<FieldError>),

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("{0}")]
    Unauthorized(String),

    #[error("token expired, please log in again")]
    TokenExpired,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("student is already enrolled in this subject")]
    AlreadyEnrolled,

    #[error("server is not configured to issue or verify tokens")]
    ServerMisconfigured,

    #[error("{0}")]
    Internal(String),
}

/// Which kind of write produced a storage failure. Foreign-key violations mean
/// different things for a delete (dependents exist) and a write (target missing).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Create,
    Update,
    Delete,
}

/// ErrorResponse
///
/// JSON body of every non-2xx response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<FieldError>,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidCredentials | AppError::Unauthorized(_) | AppError::TokenExpired => {
                StatusCode::UNAUTHORIZED
            }
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) | AppError::AlreadyEnrolled => StatusCode::CONFLICT,
            AppError::ServerMisconfigured | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable machine-readable code sent alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::InvalidCredentials => "INVALID_CREDENTIALS",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::TokenExpired => "TOKEN_EXPIRED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::AlreadyEnrolled => "ALREADY_ENROLLED",
            AppError::ServerMisconfigured => "SERVER_MISCONFIGURED",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn not_found(entity: &str, id: i32) -> Self {
        AppError::NotFound(format!("{entity} {id} not found"))
    }

    /// from_repo
    ///
    /// The single storage-error mapping shared by every create/update/delete handler:
    /// unique violation → 409 naming the field, missing row → 404, foreign-key violation
    /// → 409 describing the dependency, anything else → 500 with the message passed through.
    pub fn from_repo(err: RepoError, entity: &str, op: Op) -> Self {
        match err {
            RepoError::UniqueViolation { field } => {
                AppError::Conflict(format!("{entity} with this {field} already exists"))
            }
            RepoError::NotFound => AppError::NotFound(format!("{entity} not found")),
            RepoError::ForeignKeyViolation { constraint } => match op {
                Op::Delete => AppError::Conflict(format!(
                    "{entity} is still referenced by other records ({constraint})"
                )),
                Op::Create | Op::Update => AppError::Conflict(format!(
                    "{entity} references a record that does not exist ({constraint})"
                )),
            },
            RepoError::Other(message) => AppError::Internal(message),
        }
    }
}

/// Reads outside a write (lists, lookups) only ever fail unexpectedly.
impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound => AppError::NotFound("record not found".to_string()),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, code = self.code(), "request failed");
        }

        let body = ErrorResponse {
            error: self.code().to_string(),
            message: self.to_string(),
            details: match self {
                AppError::Validation(details) => details,
                _ => Vec::new(),
            },
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violation_names_the_field() {
        let err = AppError::from_repo(
            RepoError::UniqueViolation {
                field: "nome".to_string(),
            },
            "casa",
            Op::Create,
        );
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert!(err.to_string().contains("nome"));
    }

    #[test]
    fn foreign_key_on_delete_is_a_dependency_conflict() {
        let err = AppError::from_repo(
            RepoError::ForeignKeyViolation {
                constraint: "alunos_casa_id_fkey".to_string(),
            },
            "casa",
            Op::Delete,
        );
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert!(err.to_string().contains("still referenced"));
    }

    #[test]
    fn unclassified_failures_pass_the_message_through() {
        let err = AppError::from_repo(
            RepoError::Other("connection reset".to_string()),
            "turma",
            Op::Update,
        );
        assert_eq!(err, AppError::Internal("connection reset".to_string()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn missing_row_is_not_found() {
        let err = AppError::from_repo(RepoError::NotFound, "disciplina", Op::Delete);
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}

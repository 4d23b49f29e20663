//! Typed errors and HTTP mapping.

use axum::{
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Construction-time errors raised while composing an API tree.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("duplicate custom route: {method} {pattern}")]
    DuplicateRoute { method: Method, pattern: String },
    #[error("method cannot be routed: {0}")]
    UnsupportedMethod(Method),
    #[error("id parameter '{0}' is used more than once in the same path")]
    DuplicateIdParam(String),
    #[error("duplicate path segment: {0}")]
    DuplicatePathSegment(String),
    #[error("api '{0}' is already nested under another api")]
    AlreadyNested(String),
    #[error("nested api '{0}' needs a non-empty base path")]
    MissingBasePath(String),
    #[error("route {pattern} conflicts with {other}")]
    RouteConflict { pattern: String, other: String },
}

/// Errors returned by a storage backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("resource not found")]
    NotFound,
    #[error("storage: {0}")]
    Backend(String),
}

/// Uniform error response leaving the handler set.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("resource not found")]
    NotFound,
    #[error("method not allowed")]
    MethodNotAllowed,
    #[error("internal server error: {0}")]
    Internal(String),
    #[error("error rendering response: {0}")]
    Render(String),
    /// Caller-classified error with an explicit status, mostly returned from hooks.
    #[error("{message}")]
    Status { status: StatusCode, message: String },
}

impl ApiError {
    pub fn invalid_request(err: impl std::fmt::Display) -> Self {
        ApiError::InvalidRequest(err.to_string())
    }

    pub fn internal(err: impl std::fmt::Display) -> Self {
        ApiError::Internal(err.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Render(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Status { status, .. } => *status,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidRequest(_) => "invalid_request",
            ApiError::NotFound => "not_found",
            ApiError::MethodNotAllowed => "method_not_allowed",
            ApiError::Internal(_) => "internal_error",
            ApiError::Render(_) => "render_error",
            ApiError::Status { .. } => "error",
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound => ApiError::NotFound,
            StorageError::Backend(msg) => ApiError::Internal(msg),
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
}

impl ApiError {
    /// Wire form of this error: `{"error": {"code", "message"}}`.
    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            error: ErrorDetail {
                code: self.code().to_string(),
                message: self.to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(ApiError::invalid_request("bad").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::MethodNotAllowed.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(ApiError::internal("boom").status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ApiError::Render("x".into()).status(), StatusCode::UNPROCESSABLE_ENTITY);
        let custom = ApiError::Status {
            status: StatusCode::FORBIDDEN,
            message: "nope".into(),
        };
        assert_eq!(custom.status(), StatusCode::FORBIDDEN);
        assert_eq!(custom.to_string(), "nope");
    }

    #[test]
    fn storage_errors_translate_at_boundary() {
        assert_eq!(ApiError::from(StorageError::NotFound), ApiError::NotFound);
        assert_eq!(
            ApiError::from(StorageError::Backend("disk full".into())),
            ApiError::Internal("disk full".into())
        );
    }

    #[tokio::test]
    async fn error_body_carries_code_and_message() {
        let resp = ApiError::invalid_request("id must match URL path").into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["code"], "invalid_request");
        assert_eq!(body["error"]["message"], "invalid request: id must match URL path");
    }
}

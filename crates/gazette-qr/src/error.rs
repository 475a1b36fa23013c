//! Error types for the QR service.
//!
//! Validation failures map to 4xx responses with a descriptive message.
//! Internal failures are logged and answered with a generic message so no
//! rendering or transport detail leaks to the caller.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::render::RenderError;

/// Service error type.
#[derive(Debug, thiserror::Error)]
pub enum FollowError {
    /// More than one of `name`, `organisation`, `function_tag` was supplied.
    #[error("only one of name, organisation or function_tag may be given")]
    ConflictingParameters,

    /// None of `name`, `organisation`, `function_tag` was supplied.
    #[error("one of name, organisation or function_tag is required")]
    MissingParameter,

    /// The person name does not contain a first and a last name.
    #[error("name must contain a first name and a last name: {0}")]
    InvalidNameFormat(String),

    /// The gazette index has no entry for the requested target.
    #[error("not found: {0}")]
    NotFound(String),

    /// Several organisations match the identifier.
    #[error("ambiguous result: {0}")]
    AmbiguousResult(String),

    /// `size` and `frame` conflict, or `size` is out of range.
    #[error("invalid render options: {0}")]
    InvalidRenderOptions(String),

    /// The query string could not be parsed.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// QR encoding or image composition failed.
    #[error("render error: {0}")]
    Render(#[from] RenderError),

    /// Anything else (task join failure, etc.).
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl FollowError {
    /// Whether the error was caused by the caller's input.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Render(_) | Self::Internal(_))
    }
}

/// JSON error response body.
#[derive(Debug, Clone, Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for FollowError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::ConflictingParameters
            | Self::MissingParameter
            | Self::InvalidNameFormat(_)
            | Self::InvalidRenderOptions(_)
            | Self::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::AmbiguousResult(_) => StatusCode::CONFLICT,
            Self::Render(err) => {
                tracing::error!(error = %err, "render error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Internal(err) => {
                tracing::error!(error = %err, "internal server error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let error = if status.is_server_error() {
            "An internal error occurred. Please try again later.".to_string()
        } else {
            self.to_string()
        };

        (status, Json(ErrorResponse { error })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_not_found() {
        let err = FollowError::NotFound("Jean Dupont".to_string());
        assert_eq!(err.to_string(), "not found: Jean Dupont");
    }

    #[test]
    fn error_display_invalid_name() {
        let err = FollowError::InvalidNameFormat("Dupont".to_string());
        assert_eq!(
            err.to_string(),
            "name must contain a first name and a last name: Dupont"
        );
    }

    #[test]
    fn client_errors_are_classified() {
        assert!(FollowError::MissingParameter.is_client_error());
        assert!(FollowError::AmbiguousResult("Q1".to_string()).is_client_error());
        assert!(!FollowError::Internal(anyhow::anyhow!("boom")).is_client_error());
        assert!(!FollowError::Render(RenderError::FrameUnavailable).is_client_error());
    }

    #[test]
    fn error_into_response_conflicting() {
        let response = FollowError::ConflictingParameters.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn error_into_response_not_found() {
        let response = FollowError::NotFound("x".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn error_into_response_ambiguous() {
        let response = FollowError::AmbiguousResult("Q42".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn error_into_response_internal() {
        let response = FollowError::Internal(anyhow::anyhow!("boom")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn error_into_response_render() {
        let response = FollowError::Render(RenderError::FrameUnavailable).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

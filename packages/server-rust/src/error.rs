//! HTTP-facing error type.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::service::ValidateError;

/// Errors returned to HTTP clients as `{"error": <message>}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request body could not be read as a validation request.
    #[error("{}", .0.body_text())]
    Body(#[from] JsonRejection),
    #[error(transparent)]
    Validate(#[from] ValidateError),
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Body(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            Self::Body(_)
            | Self::Validate(ValidateError::MissingPath | ValidateError::NotFound { .. }) => {
                StatusCode::BAD_REQUEST
            }
            Self::Validate(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preconditions_are_bad_requests() {
        assert_eq!(
            ApiError::from(ValidateError::MissingPath).status(),
            StatusCode::BAD_REQUEST
        );
        let not_found = ApiError::from(ValidateError::NotFound {
            path: "/x.csv".into(),
        });
        assert_eq!(not_found.status(), StatusCode::BAD_REQUEST);
        assert_eq!(not_found.to_string(), "File not found");
    }

    #[test]
    fn processing_errors_are_server_errors() {
        let err = ApiError::from(ValidateError::Pool(crate::service::PoolError::Closed));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

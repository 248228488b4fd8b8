use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::app::error::ServiceError;

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::TOO_MANY_REQUESTS,
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Maps a service failure to a response. Store and internal failures are
    /// logged with `context` and reported without detail.
    pub fn from_service(err: ServiceError, context: &'static str) -> Self {
        match err {
            ServiceError::NotFound(message) => Self::not_found(message),
            ServiceError::Validation(message) => Self::bad_request(message),
            ServiceError::Forbidden(message) => Self::forbidden(message),
            ServiceError::Unauthenticated => {
                Self::unauthorized("authentication credentials were not provided")
            }
            ServiceError::Store(err) => {
                tracing::error!(error = ?err, "{}", context);
                Self::internal(context)
            }
            ServiceError::Internal(err) => {
                tracing::error!(error = ?err, "{}", context);
                Self::internal(context)
            }
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

// Non-integer ids never name a resource.
impl From<PathRejection> for AppError {
    fn from(_: PathRejection) -> Self {
        Self::not_found("not found")
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

//! JSON rendering of the error taxonomy.
//!
//! ```json
//! {"error": "not_found", "message": "spatial entity 42 not found", "code": 404}
//! ```

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use orrery_shared::{Error, ErrorKind};
use serde::Serialize;

/// Wire shape of a failed request.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Kind tag.
    pub error: ErrorKind,
    /// Outermost message.
    pub message: String,
    /// HTTP status.
    pub code: u16,
}

/// An [`Error`] on its way out of a handler.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(Error::validation(rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self(Error::validation(rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self(Error::validation(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let code = err.status_code();
        if code >= 500 {
            tracing::error!(kind = %err.kind(), error = ?err, "request failed");
        }
        let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorBody {
            error: err.kind(),
            message: err.message().to_string(),
            code,
        };
        (status, Json(body)).into_response()
    }
}

/// Handler result.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

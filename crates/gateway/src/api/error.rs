//! Mapping from the domain [`Error`] to HTTP responses.
//!
//! Every failing handler returns `{ "error": "<message>" }` with a status
//! chosen by [`status_for`].

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};

use tv_domain::error::Error;

/// Handler error wrapper so `?` works on domain results.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

pub fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::Conflict(_) => StatusCode::CONFLICT,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::NotOwner => StatusCode::FORBIDDEN,
        Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
        // Json only arises from unparseable connector responses.
        Error::ExternalResource(_) | Error::Json(_) => StatusCode::BAD_GATEWAY,
        Error::Store(_) | Error::Io(_) | Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Build a standardized JSON error response: `{ "error": "<message>" }`.
pub fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if self.0.is_benign() {
            tracing::debug!(status = status.as_u16(), error = %self.0, "request rejected");
        } else {
            tracing::warn!(status = status.as_u16(), error = %self.0, "request failed");
        }
        api_error(status, self.0.to_string())
    }
}

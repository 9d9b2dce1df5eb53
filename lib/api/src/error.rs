use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use labelscan_core::Error;
use std::fmt;
use tracing::error;

/// HTTP face of [`labelscan_core::Error`]
#[derive(Debug)]
pub struct ApiError(pub Error);

impl ApiError {
    /// Client-facing message; guard failures carry their bare reason
    pub fn message(&self) -> String {
        match &self.0 {
            Error::Unauthorized(reason) => reason.clone(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match &self.0 {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::InvalidKey(_) | Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Error::UpstreamUnavailable { .. } | Error::DecodeFailure { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }
        HttpResponse::build(status).json(serde_json::json!({
            "error": self.message()
        }))
    }
}

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{debug, error};

use crate::{
    errors::{ErrorKind, HttpErrorKind},
    logging::targets,
    Error,
};

/// Crate error rendered as `{ success: false, error, kind }`.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            Error::AuctionNotFound | Error::UserNotFound => StatusCode::NOT_FOUND,
            Error::Unauthenticated => StatusCode::UNAUTHORIZED,
            Error::NotHost => StatusCode::FORBIDDEN,
            Error::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Error::Http {
                kind: HttpErrorKind::RateLimited { .. },
                ..
            } => StatusCode::SERVICE_UNAVAILABLE,
            e => match e.kind() {
                ErrorKind::Validation => StatusCode::BAD_REQUEST,
                ErrorKind::Authorization => StatusCode::FORBIDDEN,
                ErrorKind::Consistency => StatusCode::CONFLICT,
                ErrorKind::ExternalDependency => StatusCode::BAD_GATEWAY,
                ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.0.kind();
        if status.is_server_error() {
            error!(target: targets::SERVER, status = status.as_u16(), error = %self.0, "Request failed");
        } else {
            debug!(target: targets::SERVER, status = status.as_u16(), error = %self.0, "Request refused");
        }

        let mut body = json!({
            "success": false,
            "error": self.0.to_string(),
            "kind": kind.as_str(),
            "retryable": self.0.is_retryable(),
        });
        if let Error::Rejected(rejection) = &self.0 {
            body["reason"] = json!(rejection.code());
        }
        (status, Json(body)).into_response()
    }
}

//! API error types and HTTP response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use common::AggregateId;
use domain::{ResponseStatus, ServiceResponse};
use serde::Serialize;

/// Failures raised by the adapter itself, before a service is called.
#[derive(Debug)]
pub enum ApiError {
    /// Malformed path or query input.
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match self {
            ApiError::BadRequest(msg) => msg,
        };
        Envelope(ServiceResponse::<()>::failure(
            ResponseStatus::BadRequest,
            message,
        ))
        .into_response()
    }
}

/// Parses an aggregate id from a path segment.
pub fn parse_id(raw: &str) -> Result<AggregateId, ApiError> {
    raw.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid id '{raw}': {e}")))
}

/// A service envelope sent as JSON under the HTTP status its
/// [`ResponseStatus`] names.
#[derive(Debug)]
pub struct Envelope<T>(pub ServiceResponse<T>);

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status.http_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        metrics::counter!("api_responses_total", "status" => status.as_u16().to_string())
            .increment(1);
        if status.is_server_error() {
            tracing::error!(errors = %self.0.errors_message(), "request failed");
        }
        if status == StatusCode::NO_CONTENT {
            return status.into_response();
        }
        (status, Json(self.0)).into_response()
    }
}

impl<T> From<ServiceResponse<T>> for Envelope<T> {
    fn from(response: ServiceResponse<T>) -> Self {
        Envelope(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_uses_the_status_code() {
        let response = Envelope(ServiceResponse::created(1)).into_response();
        assert_eq!(response.status(), StatusCode::CREATED);

        let conflict = ServiceResponse::<()>::failure(ResponseStatus::Conflict, "stale");
        let response = Envelope(conflict).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn malformed_id_is_a_bad_request() {
        let err = parse_id("not-a-uuid").unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
        assert!(parse_id(&AggregateId::new().to_string()).is_ok());
    }
}

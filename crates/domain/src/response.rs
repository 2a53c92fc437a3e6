//! Result envelope returned by the application services.

use common::smart_enum;
use serde::Serialize;

use crate::error::DomainError;

smart_enum! {
    /// Coarse outcome of a service call. Values are HTTP status codes.
    #[derive(Default)]
    pub enum ResponseStatus {
        #[default]
        Success = 200,
        Created = 201,
        NoContent = 204,
        BadRequest = 400,
        NotFound = 404,
        Conflict = 409,
        InternalServerError = 500,
    }
}

impl ResponseStatus {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            ResponseStatus::Success | ResponseStatus::Created | ResponseStatus::NoContent
        )
    }

    pub fn http_code(&self) -> u16 {
        match self {
            ResponseStatus::Success => 200,
            ResponseStatus::Created => 201,
            ResponseStatus::NoContent => 204,
            ResponseStatus::BadRequest => 400,
            ResponseStatus::NotFound => 404,
            ResponseStatus::Conflict => 409,
            ResponseStatus::InternalServerError => 500,
        }
    }
}

/// Outcome of a service call: the data on success, or the errors that
/// explain the failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceResponse<T> {
    pub data: Option<T>,
    pub errors: Vec<String>,
    pub status: ResponseStatus,
    pub message: Option<String>,
}

impl<T> ServiceResponse<T> {
    pub fn ok(data: T) -> Self {
        Self::with_status(Some(data), ResponseStatus::Success)
    }

    pub fn created(data: T) -> Self {
        Self::with_status(Some(data), ResponseStatus::Created)
    }

    pub fn no_content() -> Self {
        Self::with_status(None, ResponseStatus::NoContent)
    }

    /// A failed response carrying one error.
    pub fn failure(status: ResponseStatus, error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            data: None,
            errors: vec![error.clone()],
            status,
            message: Some(error),
        }
    }

    pub fn from_error(error: &DomainError) -> Self {
        Self::failure(error.status(), error.to_string())
    }

    /// Wraps a service result, using `status` on success.
    pub fn from_result(result: Result<T, DomainError>, status: ResponseStatus) -> Self {
        match result {
            Ok(data) => Self::with_status(Some(data), status),
            Err(e) => Self::from_error(&e),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// True exactly when no errors were recorded.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors_message(&self) -> String {
        self.errors.join("; ")
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ServiceResponse<U> {
        ServiceResponse {
            data: self.data.map(f),
            errors: self.errors,
            status: self.status,
            message: self.message,
        }
    }

    fn with_status(data: Option<T>, status: ResponseStatus) -> Self {
        Self {
            data,
            errors: Vec::new(),
            status,
            message: None,
        }
    }
}

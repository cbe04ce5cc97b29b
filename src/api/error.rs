//! Error taxonomy and the single JSON error responder.
//!
//! Every failure leaves the API as
//! `{"status_code", "error_code", "message", "details"?}`. Internal faults
//! are logged with full context here and replaced by a generic message.

use std::any::Any;

use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Serialize, de::DeserializeOwned};
use tracing::error;

use crate::credentials::CredentialError;
use crate::jwt::JwtError;
use crate::validation::FieldErrors;

/// Closed set of error kinds. Codes are part of the public API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BadRequest,
    Validation,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    TooManyRequests,
    Internal,
    ServiceUnavailable,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "BAD_REQUEST",
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::Unauthorized => "UNAUTHORIZED",
            ErrorKind::Forbidden => "FORBIDDEN",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::TooManyRequests => "TOO_MANY_REQUESTS",
            ErrorKind::Internal => "INTERNAL_SERVER_ERROR",
            ErrorKind::ServiceUnavailable => "SERVICE_UNAVAILABLE",
        }
    }

    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::BadRequest | ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn default_message(self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "The request was malformed or invalid.",
            ErrorKind::Validation => "Validation failed for the request data.",
            ErrorKind::Unauthorized => "Authentication required or invalid credentials.",
            ErrorKind::Forbidden => "You do not have permission to access this resource.",
            ErrorKind::NotFound => "Resource not found.",
            ErrorKind::Conflict => "Resource already exists or conflicts with an existing resource.",
            ErrorKind::TooManyRequests => "Too many requests. Please try again later.",
            ErrorKind::Internal => "An unexpected error occurred.",
            ErrorKind::ServiceUnavailable => "Service temporarily unavailable.",
        }
    }
}

/// Extension trait for concise error mapping on Results.
pub trait ResultExt<T> {
    fn db_err(self, msg: &str) -> Result<T, ApiError>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for Result<T, E> {
    fn db_err(self, msg: &str) -> Result<T, ApiError> {
        self.map_err(|e| ApiError::internal(msg, e))
    }
}

/// API error type with automatic response conversion.
#[derive(Debug)]
pub struct ApiError {
    kind: ErrorKind,
    message: String,
    details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, msg)
    }

    pub fn validation(errors: FieldErrors) -> Self {
        Self {
            kind: ErrorKind::Validation,
            message: ErrorKind::Validation.default_message().to_string(),
            details: serde_json::to_value(errors).ok(),
        }
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, msg)
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, msg)
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, msg)
    }

    pub fn too_many_requests(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::TooManyRequests, msg)
    }

    pub fn service_unavailable(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::ServiceUnavailable, msg)
    }

    /// Log an unexpected fault and return the generic internal error.
    pub fn internal(context: &str, e: impl std::fmt::Display) -> Self {
        error!(error = %e, "{}", context);
        Self::new(ErrorKind::Internal, ErrorKind::Internal.default_message())
    }
}

impl From<JwtError> for ApiError {
    fn from(e: JwtError) -> Self {
        ApiError::internal("Failed to issue token", e)
    }
}

impl From<CredentialError> for ApiError {
    fn from(e: CredentialError) -> Self {
        match e {
            CredentialError::InvalidCredentials => {
                ApiError::unauthorized("Invalid username or password.")
            }
            CredentialError::Duplicate => {
                ApiError::conflict("Username or email is already registered.")
            }
            CredentialError::UserNotFound => ApiError::unauthorized("User not found."),
            other => ApiError::internal("Credential store failure", other),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    status_code: u16,
    error_code: &'static str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.kind.status();
        let body = ErrorBody {
            status_code: status.as_u16(),
            error_code: self.kind.code(),
            message: &self.message,
            details: self.details.as_ref(),
        };
        (status, Json(body)).into_response()
    }
}

/// JSON body extractor whose rejections use the API error shape.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> ApiError {
    let message = match rejection {
        JsonRejection::MissingJsonContentType(_) => {
            "Expected request with `Content-Type: application/json`.".to_string()
        }
        JsonRejection::JsonSyntaxError(_) => "Request body is not valid JSON.".to_string(),
        JsonRejection::JsonDataError(e) => e.body_text(),
        other => other.body_text(),
    };
    ApiError::bad_request(message)
}

/// Fallback for unknown routes.
pub async fn not_found() -> ApiError {
    ApiError::not_found(ErrorKind::NotFound.default_message())
}

/// Response for a handler panic: logged in full, reported generically.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic payload"
    };
    ApiError::internal("Handler panicked", detail).into_response()
}

/// Validate a UUID path parameter.
pub fn validate_uuid(uuid: &str) -> Result<(), ApiError> {
    if uuid.is_empty() {
        return Err(ApiError::bad_request("UUID cannot be empty"));
    }
    if uuid.len() > 36 {
        return Err(ApiError::bad_request("UUID is too long"));
    }
    if uuid::Uuid::parse_str(uuid).is_err() {
        return Err(ApiError::bad_request("Invalid UUID format"));
    }
    Ok(())
}

//! Request failures and their classification
//!
//! [`normalize`] is the single place that decides the HTTP status and the
//! machine-readable `error` code of a failed request. Handlers and extractors
//! return [`ApiError`]; its `IntoResponse` implementation renders the JSON
//! error envelope and stashes the error in the response extensions, where
//! [`crate::api::envelope`] adds the request path and method and logs it.
//!
//! # Example
//!
//! ```rust
//! use pharma_service::api::{ApiError, ErrorCode};
//! use pharma_service::storage::{StorageError, StorageOperation};
//!
//! let err: ApiError = StorageError::upstream(StorageOperation::Create, "GestLine rejected the order").into();
//! assert_eq!(err.code, ErrorCode::GestlineError);
//! assert_eq!(err.status.as_u16(), 502);
//! ```

use std::any::Any;
use std::fmt;

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::{StorageError, StorageErrorKind};
use crate::validation::{FieldViolation, InputSource, ValidationErrors};

/// Message used when a server error carries no message of its own
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// Machine-readable error code sent as `error` in the envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Request body failed validation
    ValidationError,
    /// Query string failed validation
    QueryValidationError,
    /// Route parameters failed validation
    ParamsValidationError,
    /// Record or route does not exist
    NotFound,
    /// Unique constraint violated
    DuplicateError,
    /// The GestLine ERP integration failed
    GestlineError,
    /// Anything else
    ServerError,
}

impl ErrorCode {
    /// Wire representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ValidationError => "validation_error",
            Self::QueryValidationError => "query_validation_error",
            Self::ParamsValidationError => "params_validation_error",
            Self::NotFound => "not_found",
            Self::DuplicateError => "duplicate_error",
            Self::GestlineError => "gestline_error",
            Self::ServerError => "server_error",
        }
    }

    /// Default HTTP status for this code
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::ValidationError | Self::QueryValidationError | Self::ParamsValidationError => {
                StatusCode::BAD_REQUEST
            }
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::DuplicateError => StatusCode::CONFLICT,
            Self::GestlineError => StatusCode::BAD_GATEWAY,
            Self::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Validation code for the part of the request that was rejected
    #[must_use]
    pub const fn for_source(source: InputSource) -> Self {
        match source {
            InputSource::Body => Self::ValidationError,
            InputSource::Query => Self::QueryValidationError,
            InputSource::Params => Self::ParamsValidationError,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `details` of the envelope: field violations or a raw upstream message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorDetails {
    /// One entry per violated rule
    Fields(Vec<FieldViolation>),
    /// Upstream error text, passed through verbatim
    Raw(String),
}

/// A failure waiting to be classified
#[derive(Debug)]
pub enum Failure {
    /// A schema rejected part of the request
    Validation(InputSource, ValidationErrors),
    /// A storage adapter failed
    Storage(StorageError),
    /// Any other error
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl Failure {
    fn message(&self) -> String {
        match self {
            Self::Validation(source, _) => validation_message(*source).to_string(),
            Self::Storage(err) => err.message.clone(),
            Self::Other(err) => err.to_string(),
        }
    }

    fn chain(&self) -> Vec<String> {
        match self {
            Self::Validation(_, errors) => vec![errors.to_string()],
            Self::Storage(err) => vec![err.to_string()],
            Self::Other(err) => {
                let mut chain = vec![err.to_string()];
                let mut source = err.source();
                while let Some(cause) = source {
                    chain.push(cause.to_string());
                    source = cause.source();
                }
                chain
            }
        }
    }
}

fn validation_message(source: InputSource) -> &'static str {
    match source {
        InputSource::Body => "Validation failed",
        InputSource::Query => "Invalid query parameters",
        InputSource::Params => "Invalid route parameters",
    }
}

/// Phrases that report a failure to read an XML document
const XML_FAILURE_PHRASES: &[&str] = &[
    "xml pars",
    "parse xml",
    "parsing xml",
    "malformed xml",
    "invalid xml",
    "xml syntax",
];

/// True when the text names the ERP or reports an XML parsing failure
pub fn has_integration_marker(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("gestline") || XML_FAILURE_PHRASES.iter().any(|p| lower.contains(p))
}

/// Classify a failure; the first matching rule wins
///
/// 1. integration marker in the message, or an upstream storage error → 502 `gestline_error`
/// 2. validation failure → 400 with the source-specific code
/// 3. unique-constraint violation → 409 `duplicate_error`
/// 4. storage reports the record missing → 404 `not_found`
/// 5. anything else → 500 `server_error`
pub fn normalize(failure: Failure) -> ApiError {
    let message = failure.message();
    let chain = failure.chain();

    let upstream = matches!(&failure, Failure::Storage(err) if err.kind == StorageErrorKind::Upstream);
    if upstream || has_integration_marker(&message) {
        return ApiError::new(ErrorCode::GestlineError, message.clone())
            .with_details(ErrorDetails::Raw(message))
            .with_chain(chain);
    }

    match failure {
        Failure::Validation(source, errors) => {
            ApiError::new(ErrorCode::for_source(source), message)
                .with_details(ErrorDetails::Fields(errors.into_violations()))
                .with_chain(chain)
        }
        Failure::Storage(err) if err.is_unique_violation() => {
            ApiError::new(ErrorCode::DuplicateError, message).with_chain(chain)
        }
        Failure::Storage(err) if err.kind == StorageErrorKind::NotFound => {
            let error = match &err.entity_type {
                Some(entity) => ApiError::not_found(entity),
                None => ApiError::new(ErrorCode::NotFound, message),
            };
            error.with_chain(chain)
        }
        _ => {
            let message = if message.trim().is_empty() {
                INTERNAL_ERROR_MESSAGE.to_string()
            } else {
                message
            };
            ApiError::new(ErrorCode::ServerError, message).with_chain(chain)
        }
    }
}

/// A classified request failure
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{} ({}): {}", .code, .status.as_u16(), .message)]
pub struct ApiError {
    /// Machine-readable code
    pub code: ErrorCode,
    /// HTTP status sent to the client
    pub status: StatusCode,
    /// Human-readable message
    pub message: String,
    /// Field violations or raw upstream text
    pub details: Option<ErrorDetails>,
    /// Known routes, only set for unmatched routes
    pub endpoints: Option<Vec<String>>,
    chain: Vec<String>,
}

impl ApiError {
    /// Create an error with the code's default status
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            status: code.status_code(),
            message: message.into(),
            details: None,
            endpoints: None,
            chain: Vec::new(),
        }
    }

    /// Validation failure on part of the request
    pub fn validation(source: InputSource, errors: ValidationErrors) -> Self {
        normalize(Failure::Validation(source, errors))
    }

    /// A body that could not be read as JSON at all
    pub fn from_json_rejection(rejection: JsonRejection) -> Self {
        let status = rejection.status();
        let error = Self::validation(
            InputSource::Body,
            ValidationErrors::single("", "invalid_json", rejection.body_text()),
        );
        if status == StatusCode::PAYLOAD_TOO_LARGE {
            error.with_status(status)
        } else {
            error
        }
    }

    /// `"<Entity> not found"`
    pub fn not_found(entity_name: &str) -> Self {
        Self::new(ErrorCode::NotFound, format!("{entity_name} not found"))
    }

    /// No route matched; lists a sample of known endpoints
    pub fn route_not_found(endpoints: Vec<String>) -> Self {
        let mut error = Self::new(ErrorCode::NotFound, "Route not found");
        error.endpoints = Some(endpoints);
        error
    }

    /// Server error with the given message
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServerError, message)
    }

    /// Classify an arbitrary error
    pub fn from_error(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        normalize(Failure::Other(Box::new(err)))
    }

    /// Wrap an error response produced outside the handlers (timeouts, 405, 413, ...)
    pub fn from_status(status: StatusCode) -> Self {
        let code = match status {
            StatusCode::NOT_FOUND => ErrorCode::NotFound,
            StatusCode::REQUEST_TIMEOUT => ErrorCode::ServerError,
            s if s.is_server_error() => ErrorCode::ServerError,
            _ => ErrorCode::ValidationError,
        };
        let message = status.canonical_reason().unwrap_or("Request failed");
        Self::new(code, message).with_status(status)
    }

    /// Override the HTTP status
    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Attach envelope details
    #[must_use]
    pub fn with_details(mut self, details: ErrorDetails) -> Self {
        self.details = Some(details);
        self
    }

    /// Record the underlying cause for logs; it is never sent to the client
    #[must_use]
    pub fn with_source(mut self, cause: impl fmt::Display) -> Self {
        self.chain.push(cause.to_string());
        self
    }

    fn with_chain(mut self, chain: Vec<String>) -> Self {
        self.chain = chain;
        self
    }

    /// Field violations, empty unless this is a validation error
    pub fn violations(&self) -> &[FieldViolation] {
        match &self.details {
            Some(ErrorDetails::Fields(violations)) => violations,
            _ => &[],
        }
    }

    /// Underlying causes, outermost first
    pub fn source_chain(&self) -> &[String] {
        &self.chain
    }

    /// Render the envelope for a request
    pub fn envelope(&self, method: Option<&str>, path: Option<&str>) -> ErrorEnvelope {
        ErrorEnvelope {
            message: self.message.clone(),
            error: self.code,
            details: self.details.clone(),
            timestamp: Utc::now(),
            path: path.map(str::to_string),
            method: method.map(str::to_string),
            endpoints: self.endpoints.clone(),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        normalize(Failure::Storage(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.envelope(None, None))).into_response();
        response.extensions_mut().insert(self);
        response
    }
}

/// JSON body of every error response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// Human-readable message
    pub message: String,
    /// Machine-readable code
    pub error: ErrorCode,
    /// Field violations or raw upstream text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ErrorDetails>,
    /// When the error was produced (RFC 3339, UTC)
    pub timestamp: DateTime<Utc>,
    /// Request path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Request method
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Sample of known routes (unmatched-route 404 only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoints: Option<Vec<String>>,
}

/// Response for a panic caught by `CatchPanicLayer`
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic payload".to_string()
    };

    ApiError::internal(INTERNAL_ERROR_MESSAGE)
        .with_source(format!("handler panicked: {detail}"))
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageOperation;

    #[derive(Debug, thiserror::Error)]
    #[error("{0}")]
    struct Plain(String);

    #[derive(Debug, thiserror::Error)]
    #[error("order sync failed")]
    struct Wrapped(#[source] Plain);

    #[test]
    fn test_status_codes() {
        assert_eq!(ErrorCode::ValidationError.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::QueryValidationError.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::DuplicateError.status_code(), StatusCode::CONFLICT);
        assert_eq!(ErrorCode::GestlineError.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(ErrorCode::ServerError.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_code_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(ErrorCode::ParamsValidationError).unwrap(),
            "params_validation_error"
        );
        assert_eq!(ErrorCode::GestlineError.to_string(), "gestline_error");
    }

    #[test]
    fn test_integration_markers() {
        assert!(has_integration_marker("GestLine responded with 503"));
        assert!(has_integration_marker("Failed to parse XML response"));
        assert!(has_integration_marker("Malformed XML document"));
        assert!(!has_integration_marker("connection refused"));
        assert!(!has_integration_marker("xml"));
        assert!(has_integration_marker("Invalid XML in response body"));
        assert!(!has_integration_marker("invalid export format: xml not enabled"));
        assert!(!has_integration_marker("Invalid email; see invoice.xml for details"));
    }

    #[test]
    fn test_storage_not_found_is_not_found() {
        let err: ApiError = StorageError::not_found(StorageOperation::Update, "Product", 5).into();
        assert_eq!(err.code, ErrorCode::NotFound);
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.message, "Product not found");
        assert_eq!(err.source_chain().len(), 1);
    }

    #[test]
    fn test_upstream_kind_is_gestline() {
        let err: ApiError =
            StorageError::upstream(StorageOperation::Create, "connection reset").into();
        assert_eq!(err.code, ErrorCode::GestlineError);
        assert_eq!(err.details, Some(ErrorDetails::Raw("connection reset".into())));
    }

    #[test]
    fn test_marker_wins_over_unique_violation() {
        let err: ApiError = StorageError::database_error(
            StorageOperation::Create,
            "GestLine duplicate document",
        )
        .with_code("23505")
        .into();
        assert_eq!(err.code, ErrorCode::GestlineError);
    }

    #[test]
    fn test_unique_violation_passes_message() {
        let err: ApiError = StorageError::database_error(
            StorageOperation::Create,
            "Unique constraint failed on the fields: (`code`)",
        )
        .with_code("P2002")
        .into();
        assert_eq!(err.code, ErrorCode::DuplicateError);
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(err.message, "Unique constraint failed on the fields: (`code`)");
    }

    #[test]
    fn test_fallback_keeps_message_or_uses_generic() {
        let err: ApiError =
            StorageError::database_error(StorageOperation::GetAll, "relation does not exist").into();
        assert_eq!(err.code, ErrorCode::ServerError);
        assert_eq!(err.message, "relation does not exist");

        let err: ApiError = StorageError::database_error(StorageOperation::GetAll, "").into();
        assert_eq!(err.message, INTERNAL_ERROR_MESSAGE);
    }

    #[test]
    fn test_validation_keeps_every_violation() {
        let mut errors = ValidationErrors::new();
        errors.push("code", "required", "code is required");
        errors.push("name", "required", "name is required");

        let err = ApiError::validation(InputSource::Query, errors);
        assert_eq!(err.code, ErrorCode::QueryValidationError);
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.violations().len(), 2);
    }

    #[test]
    fn test_other_errors_record_source_chain() {
        let err = ApiError::from_error(Wrapped(Plain("socket closed".into())));
        assert_eq!(err.code, ErrorCode::ServerError);
        assert_eq!(err.message, "order sync failed");
        assert_eq!(err.source_chain(), ["order sync failed", "socket closed"]);

        let err = ApiError::from_error(Plain("XML parse error at line 3".into()));
        assert_eq!(err.code, ErrorCode::GestlineError);
    }

    #[test]
    fn test_envelope_omits_chain() {
        let err = ApiError::internal("boom").with_source("inner secret");
        let json = serde_json::to_value(err.envelope(Some("GET"), Some("/api/orders"))).unwrap();
        assert_eq!(json["message"], "boom");
        assert_eq!(json["error"], "server_error");
        assert_eq!(json["path"], "/api/orders");
        assert_eq!(json["method"], "GET");
        assert!(json.get("details").is_none());
        assert!(!json.to_string().contains("inner secret"));
    }

    #[test]
    fn test_from_status() {
        let err = ApiError::from_status(StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(err.code, ErrorCode::ValidationError);
        assert_eq!(err.status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(err.message, "Method Not Allowed");

        let err = ApiError::from_status(StatusCode::REQUEST_TIMEOUT);
        assert_eq!(err.code, ErrorCode::ServerError);
    }

    #[test]
    fn test_into_response_keeps_error_in_extensions() {
        let response = ApiError::not_found("Customer").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let stored = response.extensions().get::<ApiError>().unwrap();
        assert_eq!(stored.message, "Customer not found");
    }

    #[test]
    fn test_panic_response() {
        let response = panic_response(Box::new("index out of bounds"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let stored = response.extensions().get::<ApiError>().unwrap();
        assert_eq!(stored.message, INTERNAL_ERROR_MESSAGE);
        assert_eq!(stored.source_chain(), ["handler panicked: index out of bounds"]);
    }
}

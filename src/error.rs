// HTTP API error types
use std::collections::BTreeMap;

use axum::{http::StatusCode, response::IntoResponse};
use serde_json::{json, Value};

use crate::api::{Envelope, ResultCode};
use crate::auth::AuthError;
use crate::database::StoreError;
use crate::filter::FilterError;

/// Field name to the messages of every rule it failed.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// HTTP API error rendered through the response envelope
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),

    // 400 Bad Request: business-rule guard or duplicate unique field
    Conflict { message: String, details: Value },

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 422 Unprocessable Entity
    ValidationError { message: String, field_errors: FieldErrors },

    // 429 Too Many Requests
    TooManyRequests(String),

    // 500 Internal Server Error
    InternalServerError(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),

    /// Any of the above with its symbolic code overridden.
    Coded { code: ResultCode, inner: Box<ApiError> },
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Conflict { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::ValidationError { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Coded { inner, .. } => inner.status_code(),
        }
    }

    pub fn result_code(&self) -> ResultCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Conflict { .. } => ResultCode::BadRequest,
            ApiError::Unauthorized(_) => ResultCode::Unauthorized,
            ApiError::Forbidden(_) => ResultCode::Forbidden,
            ApiError::NotFound(_) => ResultCode::NotFound,
            ApiError::ValidationError { .. } => ResultCode::ValidationError,
            ApiError::TooManyRequests(_) => ResultCode::TooManyRequests,
            ApiError::InternalServerError(_) | ApiError::ServiceUnavailable(_) => ResultCode::ServerError,
            ApiError::Coded { code, .. } => *code,
        }
    }

    /// Client-safe message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::TooManyRequests(msg)
            | ApiError::InternalServerError(msg)
            | ApiError::ServiceUnavailable(msg) => msg,
            ApiError::Conflict { message, .. } | ApiError::ValidationError { message, .. } => message,
            ApiError::Coded { inner, .. } => inner.message(),
        }
    }

    pub fn to_envelope(&self) -> Envelope {
        let envelope = match self {
            ApiError::Coded { inner, .. } => inner.to_envelope(),
            ApiError::BadRequest(msg) => Envelope::bad_request(msg.as_str()),
            ApiError::Conflict { message, details } => Envelope::bad_request(message.as_str()).with_errors(details),
            ApiError::Unauthorized(msg) => Envelope::unauthorized(msg.as_str()),
            ApiError::Forbidden(msg) => Envelope::forbidden(msg.as_str()),
            ApiError::NotFound(msg) => Envelope::not_found(msg.as_str()),
            ApiError::ValidationError { message, field_errors } => {
                Envelope::validation_error(message.as_str(), field_errors)
            }
            ApiError::TooManyRequests(msg) => {
                Envelope::error(msg.as_str(), StatusCode::TOO_MANY_REQUESTS, ResultCode::TooManyRequests)
            }
            ApiError::InternalServerError(msg) => Envelope::server_error(msg.as_str()),
            ApiError::ServiceUnavailable(msg) => {
                Envelope::error(msg.as_str(), StatusCode::SERVICE_UNAVAILABLE, ResultCode::ServerError)
            }
        };
        envelope.with_status_code(self.result_code())
    }
}

// Static constructor methods
impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn conflict(message: impl Into<String>, details: Value) -> Self {
        ApiError::Conflict { message: message.into(), details }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn validation_error(message: impl Into<String>, field_errors: FieldErrors) -> Self {
        ApiError::ValidationError { message: message.into(), field_errors }
    }

    /// Single-field validation failure.
    pub fn invalid_field(field: &str, message: impl Into<String>) -> Self {
        let mut field_errors = FieldErrors::new();
        field_errors.insert(field.to_string(), vec![message.into()]);
        ApiError::validation_error("Validation failed", field_errors)
    }

    pub fn too_many_requests(message: impl Into<String>) -> Self {
        ApiError::TooManyRequests(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }

    /// Overrides the symbolic status code, keeping the HTTP status.
    pub fn with_code(self, code: ResultCode) -> Self {
        match self {
            ApiError::Coded { inner, .. } => ApiError::Coded { code, inner },
            other => ApiError::Coded { code, inner: Box::new(other) },
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { table, id } => {
                tracing::debug!("Row {} missing from {}", id, table);
                ApiError::not_found("Not found")
            }
            StoreError::UniqueViolation { table, column } => {
                tracing::debug!("Unique violation on {}.{}", table, column);
                let message = format!("The {} has already been taken.", column.replace('_', " "));
                ApiError::conflict(message.clone(), json!({ column: [message] }))
            }
            StoreError::Query(e) => e.into(),
            StoreError::Sqlx(sqlx::Error::PoolTimedOut) | StoreError::Sqlx(sqlx::Error::Io(_)) => {
                tracing::error!("Database connection error: {}", err);
                ApiError::service_unavailable("Database temporarily unavailable")
            }
            StoreError::Migrate(e) => {
                tracing::error!("Migration error: {}", e);
                ApiError::service_unavailable("Service is being updated, please try again later")
            }
            other => {
                // Don't expose internal SQL errors to clients
                tracing::error!("Storage error: {}", other);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
        }
    }
}

impl From<FilterError> for ApiError {
    fn from(err: FilterError) -> Self {
        ApiError::bad_request(err.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => {
                ApiError::invalid_field("email", "The provided credentials are incorrect.")
                    .with_message("The provided credentials are incorrect.")
                    .with_code(ResultCode::LoginInvalidCredentials)
            }
            AuthError::Token(e) => {
                tracing::debug!("Rejected bearer token: {}", e);
                ApiError::unauthorized("Unauthenticated.")
            }
            AuthError::Revoked => ApiError::unauthorized("Unauthenticated."),
            AuthError::Store(e) => e.into(),
            other => {
                tracing::error!("Authentication backend error: {}", other);
                ApiError::internal_server_error("Authentication is unavailable")
            }
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::validation_error("Validation failed", field_errors(&errors))
    }
}

/// Flattens validator output into `{field: [messages]}`.
pub fn field_errors(errors: &validator::ValidationErrors) -> FieldErrors {
    let mut out = FieldErrors::new();
    for (field, failures) in errors.field_errors() {
        let messages = failures.iter().map(|failure| describe_failure(&field, failure)).collect();
        out.insert(field.to_string(), messages);
    }
    out
}

impl ApiError {
    /// Replaces the top-level message of a validation or conflict error.
    pub fn with_message(self, message: impl Into<String>) -> Self {
        match self {
            ApiError::ValidationError { field_errors, .. } => {
                ApiError::ValidationError { message: message.into(), field_errors }
            }
            ApiError::Conflict { details, .. } => ApiError::Conflict { message: message.into(), details },
            ApiError::Coded { code, inner } => ApiError::Coded { code, inner: Box::new(inner.with_message(message)) },
            other => other,
        }
    }
}

/// Human message for one failed rule, unless the rule carries its own.
fn describe_failure(field: &str, failure: &validator::ValidationError) -> String {
    if let Some(message) = &failure.message {
        return message.to_string();
    }
    let label = field.replace('_', " ");
    let param = |name: &str| failure.params.get(name).map(|v| v.to_string());
    match &*failure.code {
        "required" => format!("The {} field is required.", label),
        "email" => format!("The {} must be a valid email address.", label),
        "url" => format!("The {} must be a valid URL.", label),
        "regex" => format!("The {} format is invalid.", label),
        "length" => match (param("min"), param("max")) {
            (Some(min), None) => format!("The {} must be at least {} characters.", label, min),
            (None, Some(max)) => format!("The {} may not be greater than {} characters.", label, max),
            (Some(min), Some(max)) => format!("The {} must be between {} and {} characters.", label, min, max),
            (None, None) => format!("The {} has an invalid length.", label),
        },
        "range" => match param("min") {
            Some(min) => format!("The {} must be at least {}.", label, min),
            None => format!("The {} is out of range.", label),
        },
        _ => format!("The {} field is invalid.", label),
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        if self.status_code().is_server_error() {
            tracing::error!("Request failed: {}", self.message());
        }
        self.to_envelope().into_response()
    }
}

//!
//! # HTTP error handling
//!
//! `AppError` is the error type returned by every handler. It implements
//! `actix_web::error::ResponseError`, so a failing handler renders the JSON
//! envelope
//!
//! ```json
//! { "success": false, "error": { "code": "...", "message": "...", "details": {} } }
//! ```
//!
//! with the status derived from the failure kind. Domain failures travel
//! inside [`AppError::Domain`] and keep their machine tag. Internal failures
//! are logged and replaced by a generic message.

use actix_web::error::{JsonPayloadError, PathError, QueryPayloadError};
use actix_web::http::StatusCode;
use actix_web::{error::ResponseError, HttpRequest, HttpResponse};
use log::error;
use serde_json::{json, Value};
use std::fmt;
use validator::ValidationErrors;

use crate::domain::{DomainError, ErrorKind};

const INTERNAL_MESSAGE: &str = "an internal error occurred";

#[derive(Debug)]
pub enum AppError {
    /// Missing or unusable credentials (401).
    Unauthorized(String),
    /// Malformed request (400).
    BadRequest(String),
    /// Unknown route or resource (404).
    NotFound(String),
    /// Authenticated but not allowed (403).
    Forbidden(String),
    /// Uniqueness clash (409).
    Conflict(String),
    /// Unexpected server-side failure (500).
    InternalServerError(String),
    /// Failure reported by the database driver (500).
    DatabaseError(String),
    /// Request body failed `validator` rules (400). Carries the per-field
    /// messages as details.
    ValidationError(String, Option<Value>),
    /// A failure raised below the transport layer.
    Domain(DomainError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            AppError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::InternalServerError(msg) => write!(f, "Internal Server Error: {}", msg),
            AppError::DatabaseError(msg) => write!(f, "Database Error: {}", msg),
            AppError::ValidationError(msg, _) => write!(f, "Validation Error: {}", msg),
            AppError::Domain(err) => write!(f, "{}", err),
        }
    }
}

fn kind_status(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation | ErrorKind::InvalidTransition | ErrorKind::PolicyViolation => {
            StatusCode::BAD_REQUEST
        }
        ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl AppError {
    /// Machine tag rendered in the envelope.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::Conflict(_) => "CONFLICT",
            AppError::InternalServerError(_) | AppError::DatabaseError(_) => "INTERNAL_ERROR",
            AppError::ValidationError(..) => "VALIDATION_ERROR",
            AppError::Domain(err) => err.code(),
        }
    }

    fn message(&self) -> String {
        match self {
            AppError::Unauthorized(msg)
            | AppError::BadRequest(msg)
            | AppError::NotFound(msg)
            | AppError::Forbidden(msg)
            | AppError::Conflict(msg)
            | AppError::ValidationError(msg, _) => msg.clone(),
            AppError::InternalServerError(_) | AppError::DatabaseError(_) => {
                INTERNAL_MESSAGE.to_string()
            }
            AppError::Domain(err) if err.kind() == ErrorKind::Internal => {
                INTERNAL_MESSAGE.to_string()
            }
            AppError::Domain(err) => err.to_string(),
        }
    }

    fn details(&self) -> Option<Value> {
        match self {
            AppError::ValidationError(_, details) => details.clone(),
            AppError::Domain(err) => err.details(),
            _ => None,
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) | AppError::ValidationError(..) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::InternalServerError(_) | AppError::DatabaseError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Domain(err) => kind_status(err.kind()),
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!("request failed: {}", self);
        }
        let mut body = json!({
            "code": self.code(),
            "message": self.message(),
        });
        if let Some(details) = self.details() {
            body["details"] = details;
        }
        HttpResponse::build(status).json(json!({ "success": false, "error": body }))
    }
}

impl From<DomainError> for AppError {
    fn from(error: DomainError) -> AppError {
        AppError::Domain(error)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> AppError {
        match error {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".into()),
            _ => AppError::DatabaseError(error.to_string()),
        }
    }
}

/// Keeps the offending field names and their messages.
impl From<ValidationErrors> for AppError {
    fn from(error: ValidationErrors) -> AppError {
        let fields: serde_json::Map<String, Value> = error
            .field_errors()
            .into_iter()
            .map(|(field, errors)| {
                let messages: Vec<String> = errors
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| e.code.to_string())
                    })
                    .collect();
                (field.to_string(), json!(messages))
            })
            .collect();
        AppError::ValidationError(error.to_string(), Some(json!({ "fields": fields })))
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(error: jsonwebtoken::errors::Error) -> AppError {
        AppError::Unauthorized(error.to_string())
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(error: bcrypt::BcryptError) -> AppError {
        AppError::InternalServerError(error.to_string())
    }
}

pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AppError::BadRequest(err.to_string()).into()
}

pub fn query_error_handler(err: QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AppError::BadRequest(err.to_string()).into()
}

pub fn path_error_handler(err: PathError, _req: &HttpRequest) -> actix_web::Error {
    AppError::BadRequest(err.to_string()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RepositoryError, TokenError};
    use crate::domain::value_objects::TodoStatus;
    use actix_web::body::to_bytes;

    async fn body_of(error: AppError) -> Value {
        let response = error.error_response();
        let bytes = to_bytes(response.into_body()).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_error_responses() {
        let cases = vec![
            (AppError::Unauthorized("Invalid token".into()), 401),
            (AppError::BadRequest("Invalid input".into()), 400),
            (AppError::NotFound("Resource not found".into()), 404),
            (AppError::Forbidden("nope".into()), 403),
            (AppError::Conflict("taken".into()), 409),
            (AppError::InternalServerError("Server error".into()), 500),
        ];
        for (error, status) in cases {
            assert_eq!(error.error_response().status(), status);
        }
    }

    #[test]
    fn test_domain_status_mapping() {
        let cases = vec![
            (DomainError::validation("title", "too short"), 400),
            (
                DomainError::InvalidTransition {
                    from: TodoStatus::Completed,
                    to: TodoStatus::Cancelled,
                },
                400,
            ),
            (DomainError::IncorrectPassword, 400),
            (DomainError::InvalidCredentials, 401),
            (DomainError::Token(TokenError::Revoked), 401),
            (DomainError::Forbidden("not yours".into()), 403),
            (DomainError::not_found("todo", 7), 404),
            (DomainError::conflict("username", "taken"), 409),
            (DomainError::Cancelled, 503),
            (DomainError::Repository(RepositoryError::Other("boom".into())), 500),
        ];
        for (error, status) in cases {
            assert_eq!(AppError::from(error).error_response().status(), status);
        }
    }

    #[actix_rt::test]
    async fn test_envelope_shape() {
        let body = body_of(AppError::from(DomainError::InvalidTransition {
            from: TodoStatus::Completed,
            to: TodoStatus::Cancelled,
        }))
        .await;
        pretty_assertions::assert_eq!(
            body,
            json!({
                "success": false,
                "error": {
                    "code": "INVALID_TRANSITION",
                    "message": "invalid status transition from completed to cancelled",
                    "details": { "from": "completed", "to": "cancelled" }
                }
            })
        );
    }

    #[actix_rt::test]
    async fn test_internal_message_is_hidden() {
        let body = body_of(AppError::DatabaseError("password authentication failed".into())).await;
        assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
        assert_eq!(body["error"]["message"], INTERNAL_MESSAGE);
        assert!(body["error"].get("details").is_none());
    }
}

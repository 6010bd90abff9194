//! # API Error Type
//!
//! Unified error type for axum handlers.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in MedStore                               │
//! │                                                                         │
//! │  Browser                     Rust Backend                               │
//! │  ───────                     ────────────                               │
//! │                                                                         │
//! │  fetch('/api/items/{id}/enhanced-transaction')                          │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  Handler                                                         │  │
//! │  │  Result<Json<T>, ApiError>                                       │  │
//! │  │         │                                                        │  │
//! │  │         ▼                                                        │  │
//! │  │  Rejected? ──── CoreError::Rejected(..) ─────────┐              │  │
//! │  │         │                                        │              │  │
//! │  │         ▼                                        ▼              │  │
//! │  │  Stale version? ── DbError::Conflict ───────── ApiError ───────►│  │
//! │  │         │                                      (status + JSON)  │  │
//! │  │         ▼                                                        │  │
//! │  │  Success ──────────────────────────────────────────────────────►│  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! │  { "message": "Cannot return more than are in maintenance           │  │
//! │               (0 currently)", "code": "REJECTED" }                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Internal failures carry a generic message. The underlying cause is
//! logged, and returned as `details` only when the router runs in
//! development (see [`expose_details`]).

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use medstore_core::{CoreError, ValidationError};
use medstore_db::DbError;
use serde::Serialize;

/// API error returned from handlers.
///
/// ## Serialization
/// ```json
/// {
///   "message": "Item not found: 5b0c...",
///   "code": "NOT_FOUND"
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,

    /// Underlying cause of an internal error.
    pub details: Option<String>,
}

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Resource not found (404)
    NotFound,

    /// Input validation failed (400)
    ValidationError,

    /// Transaction refused by the stock rules (400)
    Rejected,

    /// Value already taken (400)
    Duplicate,

    /// Delete blocked by dependants (400)
    InUse,

    /// Missing or invalid token, bad credentials (401)
    Unauthorized,

    /// Role not permitted (403)
    Forbidden,

    /// Optimistic version check failed (409)
    Conflict,

    /// Database operation failed (500)
    DatabaseError,

    /// Internal server error (500)
    Internal,
}

impl ErrorCode {
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::ValidationError
            | ErrorCode::Rejected
            | ErrorCode::Duplicate
            | ErrorCode::InUse => StatusCode::BAD_REQUEST,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::DatabaseError | ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Creates a not found error.
    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Forbidden, message)
    }

    /// Creates an internal error. `details` is logged and only shown in
    /// development.
    pub fn internal(details: impl Into<String>) -> Self {
        let details = details.into();
        tracing::error!(%details, "Internal error");
        ApiError {
            code: ErrorCode::Internal,
            message: "Internal server error".to_string(),
            details: Some(details),
        }
    }

    fn database(message: &str, details: String) -> Self {
        tracing::error!(%details, "{}", message);
        ApiError {
            code: ErrorCode::DatabaseError,
            message: message.to_string(),
            details: Some(details),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.code.status()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

/// JSON body of every error response.
#[derive(Serialize)]
struct ErrorBody<'a> {
    message: &'a str,
    code: ErrorCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a str>,
}

impl ApiError {
    fn render(&self, details: Option<&str>) -> Response {
        let body = ErrorBody {
            message: &self.message,
            code: self.code,
            details,
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Renders without `details`. Errors that have them ride along in the
/// response extensions for [`expose_details`].
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = self.render(None);
        if self.details.is_some() {
            response.extensions_mut().insert(self);
        }
        response
    }
}

/// Response mapper that re-renders internal errors with their `details`.
///
/// Installed by [`crate::build_router`] in development only.
pub async fn expose_details(mut response: Response) -> Response {
    match response.extensions_mut().remove::<ApiError>() {
        Some(err) => err.render(err.details.as_deref()),
        None => response,
    }
}

/// Malformed or mistyped request bodies are validation errors.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(status = %rejection.status(), "Rejected request body");
        ApiError::validation(rejection.body_text())
    }
}

/// Converts database errors to API errors.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            DbError::UniqueViolation { field, value } => ApiError::new(
                ErrorCode::Duplicate,
                format!("{} '{}' already exists", field, value),
            ),
            err @ DbError::InvalidReference { .. } => {
                ApiError::new(ErrorCode::ValidationError, err.to_string())
            }
            err @ DbError::InUse { .. } => ApiError::new(ErrorCode::InUse, err.to_string()),
            err @ DbError::Conflict { .. } => ApiError::new(ErrorCode::Conflict, err.to_string()),
            DbError::Core(core) => core.into(),
            DbError::ForeignKeyViolation { message } => {
                tracing::warn!("Foreign key violation: {}", message);
                ApiError::new(ErrorCode::ValidationError, "Invalid reference")
            }
            DbError::ConnectionFailed(e) => ApiError::database("Database connection failed", e),
            DbError::MigrationFailed(e) => ApiError::database("Database migration failed", e),
            DbError::QueryFailed(e) => ApiError::database("Database operation failed", e),
            DbError::PoolExhausted => ApiError::database(
                "Database pool exhausted",
                "all connections in use".to_string(),
            ),
            DbError::Internal(e) => ApiError::database("Database operation failed", e),
        }
    }
}

/// Converts core errors to API errors.
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Rejected(rejection) => {
                ApiError::new(ErrorCode::Rejected, rejection.to_string())
            }
            CoreError::Hierarchy(e) => ApiError::validation(e.to_string()),
            CoreError::Validation(e) => e.into(),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::Duplicate { .. } => {
                ApiError::new(ErrorCode::Duplicate, err.to_string())
            }
            _ => ApiError::validation(err.to_string()),
        }
    }
}

/// Result type for handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use medstore_core::Rejection;

    #[test]
    fn test_error_serialization() {
        let body = ErrorBody {
            message: "Item not found: i1",
            code: ErrorCode::NotFound,
            details: None,
        };
        let json = serde_json::to_string(&body).unwrap();
        assert_eq!(json, r#"{"message":"Item not found: i1","code":"NOT_FOUND"}"#);
    }

    #[test]
    fn test_db_error_status_mapping() {
        let cases = [
            (DbError::not_found("Item", "i1"), StatusCode::NOT_FOUND),
            (DbError::duplicate("Barcode", "X1"), StatusCode::BAD_REQUEST),
            (DbError::in_use("location", "it has children"), StatusCode::BAD_REQUEST),
            (DbError::invalid_reference("room", "r1"), StatusCode::BAD_REQUEST),
            (
                DbError::Conflict {
                    entity: "Item".to_string(),
                    id: "i1".to_string(),
                },
                StatusCode::CONFLICT,
            ),
            (DbError::QueryFailed("boom".to_string()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn test_rejection_keeps_message() {
        let err: ApiError = DbError::from(Rejection::ExceedsInMaintenance {
            in_maintenance: 0,
            requested: 1,
        })
        .into();
        assert_eq!(err.code, ErrorCode::Rejected);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            err.message,
            "Cannot return more than are in maintenance (0 currently)"
        );
    }

    #[test]
    fn test_validation_message_is_unwrapped() {
        let err: ApiError = CoreError::from(ValidationError::required("name")).into();
        assert_eq!(err.message, "name is required");
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[test]
    fn test_internal_hides_cause_in_message() {
        let err = ApiError::from(DbError::Internal("disk I/O error".to_string()));
        assert_eq!(err.message, "Database operation failed");
        assert_eq!(err.details.as_deref(), Some("disk I/O error"));
    }

    #[tokio::test]
    async fn test_details_hidden_unless_exposed() {
        use http_body_util::BodyExt;

        let hidden = ApiError::internal("disk I/O error").into_response();
        assert_eq!(hidden.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = hidden.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["message"], "Internal server error");
        assert!(json.get("details").is_none());

        let shown = expose_details(ApiError::internal("disk I/O error").into_response()).await;
        let body = shown.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["details"], "disk I/O error");
        assert_eq!(json["code"], "INTERNAL");
    }

    #[tokio::test]
    async fn test_expose_details_leaves_plain_errors_alone() {
        let response = expose_details(ApiError::not_found("Item", "i1").into_response()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

}

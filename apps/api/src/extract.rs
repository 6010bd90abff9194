//! Request extractors with MedStore error bodies.

use axum::extract::FromRequest;

use crate::error::ApiError;

/// `axum::Json` whose rejection is a 400 `VALIDATION_ERROR` instead of
/// axum's plain-text 415/422.
///
/// ## Usage
/// ```rust,ignore
/// async fn create_item(ApiJson(draft): ApiJson<ItemDraft>) -> ApiResult<..> { .. }
/// ```
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::response::IntoResponse;
    use medstore_core::TransactionRequest;

    async fn extract(content_type: Option<&str>, body: &str) -> Result<TransactionRequest, ApiError> {
        let mut builder = Request::builder().method("POST").uri("/");
        if let Some(content_type) = content_type {
            builder = builder.header(header::CONTENT_TYPE, content_type);
        }
        let request = builder.body(Body::from(body.to_string())).unwrap();
        ApiJson::<TransactionRequest>::from_request(request, &())
            .await
            .map(|ApiJson(value)| value)
    }

    #[tokio::test]
    async fn test_valid_body_extracts() {
        let request = extract(Some("application/json"), r#"{"type": "Stock Addition", "quantity": 2}"#)
            .await
            .unwrap();
        assert_eq!(request.quantity, 2);
    }

    #[tokio::test]
    async fn test_missing_field_is_validation_error() {
        let err = extract(Some("application/json"), r#"{"type": "Stock Removal"}"#)
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.message.contains("quantity"), "{}", err.message);
    }

    #[tokio::test]
    async fn test_syntax_and_content_type_errors_are_400() {
        let syntax = extract(Some("application/json"), "{\"type\": ").await.unwrap_err();
        assert_eq!(syntax.into_response().status(), StatusCode::BAD_REQUEST);

        let no_type = extract(None, r#"{"type": "Stock Addition", "quantity": 1}"#)
            .await
            .unwrap_err();
        assert_eq!(no_type.into_response().status(), StatusCode::BAD_REQUEST);
    }
}

//! API error type and the JSON body extractor that produces it.

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use optician_core::ShopError;
use serde::de::DeserializeOwned;

/// API errors mapped to HTTP status codes.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    PayloadTooLarge,
    Internal(String),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadRequest(e) => write!(f, "Bad request: {}", e),
            Self::Unauthorized(e) => write!(f, "Unauthorized: {}", e),
            Self::Forbidden(e) => write!(f, "Forbidden: {}", e),
            Self::NotFound(e) => write!(f, "Not found: {}", e),
            Self::Conflict(e) => write!(f, "Conflict: {}", e),
            Self::PayloadTooLarge => write!(f, "Payload too large"),
            Self::Internal(e) => write!(f, "Internal error: {}", e),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(e) => (StatusCode::BAD_REQUEST, e),
            Self::Unauthorized(e) => (StatusCode::UNAUTHORIZED, e),
            Self::Forbidden(e) => (StatusCode::FORBIDDEN, e),
            Self::NotFound(e) => (StatusCode::NOT_FOUND, e),
            Self::Conflict(e) => (StatusCode::CONFLICT, e),
            Self::PayloadTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "Payload too large".to_string(),
            ),
            Self::Internal(e) => {
                tracing::error!(error = %e, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = serde_json::json!({ "message": message });
        (status, Json(body)).into_response()
    }
}

impl From<ShopError> for ApiError {
    fn from(e: ShopError) -> Self {
        match e {
            ShopError::InvalidInput(msg) => Self::BadRequest(msg),
            ShopError::SetupRequired => Self::BadRequest("Setup required".to_string()),
            ShopError::Unauthorized(msg) => Self::Unauthorized(msg),
            ShopError::Forbidden(msg) => Self::Forbidden(msg),
            ShopError::NotFound(msg) => Self::NotFound(format!("{} not found", msg)),
            ShopError::Conflict(msg) => Self::Conflict(msg),
            other @ (ShopError::Database(_) | ShopError::Crypto(_) | ShopError::Io(_)) => {
                Self::Internal(other.to_string())
            }
        }
    }
}

impl From<std::io::Error> for ApiError {
    fn from(e: std::io::Error) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge
        } else {
            Self::BadRequest(rejection.body_text())
        }
    }
}

impl From<axum::extract::multipart::MultipartError> for ApiError {
    fn from(e: axum::extract::multipart::MultipartError) -> Self {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge
        } else {
            Self::BadRequest(e.body_text())
        }
    }
}

/// `Json` whose rejections use the API error body
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use optician_core::DatabaseError;

    #[test]
    fn test_shop_error_mapping() {
        let cases = [
            (ShopError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (ShopError::SetupRequired, StatusCode::BAD_REQUEST),
            (ShopError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (ShopError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (ShopError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (ShopError::Conflict("x".into()), StatusCode::CONFLICT),
            (
                ShopError::Database(DatabaseError::LockPoisoned("x".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, status) in cases {
            let response = ApiError::from(error).into_response();
            assert_eq!(response.status(), status);
        }
    }

    #[tokio::test]
    async fn test_internal_error_body_is_generic() {
        let response = ApiError::Internal("disk on fire".to_string()).into_response();
        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["message"], "Internal server error");
    }
}

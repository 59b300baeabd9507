//! Path extractor for entity ids.
//!
//! Rejects malformed ids with the crate's JSON [`ApiError`] body instead of
//! axum's plain-text rejection.

use axum::{
    async_trait,
    extract::{FromRequestParts, Path},
    http::request::Parts,
};
use motorway_core::EntityId;
use uuid::Uuid;

use crate::error::ApiError;

/// Entity id taken from the single path parameter of the route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathId(pub EntityId);

#[async_trait]
impl<S> FromRequestParts<S> for PathId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| ApiError::invalid_input(rejection.body_text()))?;

        Uuid::parse_str(&raw)
            .map(PathId)
            .map_err(|_| ApiError::invalid_format("id", "a UUID"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use axum::http::Request;
    use axum::{routing::get, Router};
    use tower::ServiceExt;

    async fn echo(PathId(id): PathId) -> String {
        id.to_string()
    }

    fn app() -> Router {
        Router::new().route("/items/:id", get(echo))
    }

    #[tokio::test]
    async fn test_valid_uuid_extracted() -> Result<(), Box<dyn std::error::Error>> {
        let id = Uuid::now_v7();
        let response = app()
            .oneshot(Request::get(format!("/items/{}", id)).body(axum::body::Body::empty())?)
            .await?;
        assert!(response.status().is_success());
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        assert_eq!(body, id.to_string().as_bytes());
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_uuid_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let response = app()
            .oneshot(Request::get("/items/not-a-uuid").body(axum::body::Body::empty())?)
            .await?;
        assert_eq!(response.status(), ErrorCode::InvalidFormat.status_code());
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let error: ApiError = serde_json::from_slice(&body)?;
        assert_eq!(error.code, ErrorCode::InvalidFormat);
        Ok(())
    }
}

//! Request extractors whose rejections are [`MarketError`]s.
//!
//! axum's own `Json`, `Path` and `Query` reject with plain-text bodies and
//! a mix of 400 and 422. These wrappers turn every malformed body, path or
//! query string into a 400 with the usual JSON error body.

use axum::Json;
use axum::extract::{FromRequest, FromRequestParts, OptionalFromRequest, Path, Query, Request};
use axum::http::request::Parts;
use serde::de::DeserializeOwned;

use crate::error::MarketError;

/// JSON request body.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = MarketError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = <Json<T> as FromRequest<S>>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

/// A missing body (no `Content-Type`) is `None`; a malformed one is still
/// rejected.
impl<S, T> OptionalFromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = MarketError;

    async fn from_request(req: Request, state: &S) -> Result<Option<Self>, Self::Rejection> {
        let value = <Json<T> as OptionalFromRequest<S>>::from_request(req, state).await?;
        Ok(value.map(|Json(v)| Self(v)))
    }
}

/// Typed path parameters.
#[derive(Debug, Clone, Copy)]
pub struct ApiPath<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = MarketError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

/// Typed query string.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = MarketError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use axum::body::Body;
    use axum::http::{StatusCode, header};

    use super::*;
    use crate::domain::SessionId;

    #[derive(Debug, serde::Deserialize)]
    struct TopUpBody {
        amount: u32,
    }

    fn json_request(body: &'static str) -> Request {
        let Ok(req) = Request::builder()
            .method("POST")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
        else {
            panic!("bad request");
        };
        req
    }

    #[tokio::test]
    async fn malformed_json_is_invalid_request() {
        let result = <ApiJson<TopUpBody> as FromRequest<()>>::from_request(
            json_request(r#"{"amount":"abc"}"#),
            &(),
        )
        .await;
        let Err(err) = result else {
            panic!("expected rejection");
        };
        assert!(matches!(err, MarketError::InvalidRequest(_)));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn well_formed_json_passes_through() {
        let result = <ApiJson<TopUpBody> as FromRequest<()>>::from_request(
            json_request(r#"{"amount":7}"#),
            &(),
        )
        .await;
        let Ok(ApiJson(body)) = result else {
            panic!("expected body");
        };
        assert_eq!(body.amount, 7);
    }

    #[tokio::test]
    async fn absent_optional_body_is_none() {
        let Ok(req) = Request::builder().method("POST").body(Body::empty()) else {
            panic!("bad request");
        };
        let result = <ApiJson<TopUpBody> as OptionalFromRequest<()>>::from_request(req, &()).await;
        let Ok(None) = result else {
            panic!("expected no body");
        };
    }

    #[tokio::test]
    async fn malformed_query_is_invalid_request() {
        #[derive(Debug, serde::Deserialize)]
        struct Paging {
            #[allow(dead_code)]
            page: u32,
        }
        let Ok(req) = Request::builder().uri("/x?page=abc").body(Body::empty()) else {
            panic!("bad request");
        };
        let (mut parts, _) = req.into_parts();
        let result = ApiQuery::<Paging>::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(MarketError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn path_outside_router_is_invalid_request() {
        let Ok(req) = Request::builder().uri("/sessions/x").body(Body::empty()) else {
            panic!("bad request");
        };
        let (mut parts, _) = req.into_parts();
        let result = ApiPath::<SessionId>::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(MarketError::InvalidRequest(_))));
    }
}

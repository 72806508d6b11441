//! Request extractors and the API token guard.

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Query, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
    Json,
};
use serde::de::DeserializeOwned;

use super::{AppState, StorageBackend};
use crate::error::ResearchError;

pub const RESEARCHER_HEADER: &str = "x-researcher-id";
pub const API_KEY_HEADER: &str = "x-api-key";

/// The researcher acting on the request, from `X-Researcher-Id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor(pub i64);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Actor {
    type Rejection = ResearchError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(RESEARCHER_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|id| *id > 0)
            .map(Actor)
            .ok_or(ResearchError::Unauthorized)
    }
}

/// `Json` whose rejections use the error envelope.
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ResearchError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ResearchError::invalid(rejection.body_text()))?;
        Ok(ApiJson(value))
    }
}

/// `Query` whose rejections use the error envelope.
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ResearchError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| ResearchError::invalid(rejection.body_text()))?;
        Ok(ApiQuery(value))
    }
}

pub fn is_authorized(headers: &HeaderMap, token: &str) -> bool {
    if let Some(key) = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()) {
        if key == token {
            return true;
        }
    }
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|bearer| bearer.trim() == token)
}

/// Rejects requests without the configured token. `/health` stays open.
pub async fn require_api_token<S: StorageBackend>(
    State(state): State<AppState<S>>,
    req: Request,
    next: Next,
) -> Result<Response, ResearchError> {
    if let Some(token) = state.config.api_token.as_deref() {
        if req.uri().path() != "/health" && !is_authorized(req.headers(), token) {
            return Err(ResearchError::Unauthorized);
        }
    }
    Ok(next.run(req).await)
}

//! Request context extraction and authentication middleware.
//!
//! In debug mode the admin principal is supplied via the `Api-User` header
//! for local development. In production mode the principal comes from a
//! verified HS256 bearer JWT (claim `sub` by default, configurable via
//! `CONIFER_JWT_USER_CLAIM`).

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::FromRequestParts;
use axum::extract::State;
use axum::http::header::HeaderName;
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde_json::Value;
use ulid::Ulid;

use crate::error::ApiError;
use crate::server::AppState;

/// Header name for request IDs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Header carrying the admin principal in debug mode.
pub const API_USER_HEADER: &str = "Api-User";

/// Per-request context derived from authentication and headers.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Admin principal, recorded on every audit record this request writes.
    pub user: String,
    /// Request ID for tracing/correlation.
    pub request_id: String,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for RequestContext {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        if let Some(existing) = parts.extensions.get::<Self>() {
            return Ok(existing.clone());
        }

        let headers = &parts.headers;

        let request_id =
            request_id_from_headers(headers).unwrap_or_else(|| Ulid::new().to_string());

        let user = if state.config().debug {
            header_string(headers, API_USER_HEADER).ok_or_else(|| {
                ApiError::unauthorized("missing Api-User header (debug mode)")
                    .with_request_id(request_id.clone())
            })?
        } else {
            user_from_jwt(headers, state, &request_id)?
        };

        let ctx = Self { user, request_id };

        parts.extensions.insert(ctx.clone());
        Ok(ctx)
    }
}

fn user_from_jwt(
    headers: &HeaderMap,
    state: &AppState,
    request_id: &str,
) -> Result<String, ApiError> {
    let token = bearer_token(headers)
        .ok_or_else(|| ApiError::missing_auth().with_request_id(request_id.to_string()))?;

    let jwt = &state.config().jwt;
    let Some(secret) = jwt.hs256_secret.as_deref() else {
        return Err(
            ApiError::internal("jwt.hs256_secret is required when debug=false")
                .with_request_id(request_id.to_string()),
        );
    };

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_nbf = true;

    if let Some(iss) = jwt.issuer.as_deref() {
        validation.set_issuer(&[iss]);
    }
    if let Some(aud) = jwt.audience.as_deref() {
        validation.set_audience(&[aud]);
    }

    let data = jsonwebtoken::decode::<Value>(&token, &decoding_key, &validation)
        .map_err(|_| ApiError::invalid_token().with_request_id(request_id.to_string()))?;

    let Some(obj) = data.claims.as_object() else {
        return Err(ApiError::invalid_token().with_request_id(request_id.to_string()));
    };

    obj.get(jwt.user_claim.as_str())
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::invalid_token().with_request_id(request_id.to_string()))
}

fn request_id_from_headers(headers: &HeaderMap) -> Option<String> {
    header_string(headers, "X-Request-Id").or_else(|| header_string(headers, "X-Request-ID"))
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let raw = header_string(headers, "Authorization")?;
    let token = raw.strip_prefix("Bearer ")?;
    Some(token.to_string())
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    let value = headers.get(name)?;
    value.to_str().ok().map(str::to_string)
}

/// Authentication middleware for the admin routes.
///
/// Runs before any handler logic and injects a verified [`RequestContext`]
/// into request extensions; unauthenticated requests are rejected with 401
/// here.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let (mut parts, body) = req.into_parts();

    let ctx = match RequestContext::from_request_parts(&mut parts, &state).await {
        Ok(ctx) => ctx,
        Err(err) => return err.into_response(),
    };

    let mut req = Request::from_parts(parts, body);
    let request_id = ctx.request_id.clone();
    req.extensions_mut().insert(ctx);

    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    response
}

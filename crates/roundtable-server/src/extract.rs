//! Request extractors and middleware shared across routes.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts, Request, State};
use axum::http::header::{AUTHORIZATION, RETRY_AFTER};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use roundtable_token::UserClaims;

use crate::error::ApiError;
use crate::AppState;

/// Extractor that requires a valid user-session bearer token.
pub struct AuthUser(pub UserClaims);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or(ApiError::Unauthorized("unauthorized"))?;
        let claims = state
            .tokens
            .verify_user_token(&token)
            .map_err(|_| ApiError::Unauthorized("unauthorized"))?;
        Ok(AuthUser(claims))
    }
}

/// The token from an `Authorization: Bearer` header, if present.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        return None;
    }
    Some(token.to_string())
}

/// Best-effort client identity for rate limiting: proxy headers first,
/// then the socket address captured at accept time.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        return ip.to_string();
    }
    if let Some(ip) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok())
    {
        return ip.to_string();
    }
    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Per-IP admission for bursty endpoints. Denials answer 429 with a
/// Retry-After hint.
pub async fn rate_limit_by_ip(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    let key = client_ip(request.headers(), peer);

    let decision = state.limiter.allow(&key);
    if !decision.allowed {
        let mut response =
            (StatusCode::TOO_MANY_REQUESTS, "rate limit exceeded").into_response();
        if decision.retry_after_secs > 0 {
            if let Ok(value) =
                HeaderValue::from_str(&decision.retry_after_secs.to_string())
            {
                response.headers_mut().insert(RETRY_AFTER, value);
            }
        }
        return response;
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token_parses_header() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers).as_deref(), Some("abc.def"));
    }

    #[test]
    fn test_bearer_token_rejects_other_schemes_and_empty() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(bearer_token(&headers).is_none());

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert!(bearer_token(&headers).is_none());

        assert!(bearer_token(&HeaderMap::new()).is_none());
    }

    #[test]
    fn test_client_ip_prefers_proxy_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.1"));
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.2"));
        let peer = "127.0.0.1:9999".parse().ok();

        assert_eq!(client_ip(&headers, peer), "10.0.0.1");

        headers.remove("x-real-ip");
        assert_eq!(client_ip(&headers, peer), "10.0.0.2");

        headers.remove("x-forwarded-for");
        assert_eq!(client_ip(&headers, peer), "127.0.0.1");

        assert_eq!(client_ip(&HeaderMap::new(), None), "unknown");
    }
}

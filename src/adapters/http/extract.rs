//! Request extractors.
//!
//! Authentication happens upstream: the gateway forwards the verified
//! subscriber id in `X-User-Id`. Requests without it are rejected with 401.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum::http::HeaderMap;

use crate::domain::audit::ClientContext;
use crate::domain::foundation::SubscriberId;

use super::error::ApiError;

/// Header carrying the authenticated subscriber id.
pub const USER_ID_HEADER: &str = "X-User-Id";

/// Authenticated subscriber extracted from the request.
#[derive(Debug, Clone)]
pub struct AuthenticatedSubscriber {
    pub subscriber_id: SubscriberId,
}

impl<S> FromRequestParts<S> for AuthenticatedSubscriber
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut Parts,
        _state: &'life1 S,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            let subscriber_id = parts
                .headers
                .get(USER_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| SubscriberId::new(s.trim()).ok())
                .ok_or_else(ApiError::unauthorized)?;

            Ok(AuthenticatedSubscriber { subscriber_id })
        })
    }
}

/// Caller ip and user agent for rate limiting and audit entries.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo(pub ClientContext);

impl<S> FromRequestParts<S> for ClientInfo
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut Parts,
        _state: &'life1 S,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            let socket = parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ci| ci.0);

            Ok(ClientInfo(ClientContext {
                ip: client_ip(&parts.headers, socket),
                user_agent: header_str(&parts.headers, "User-Agent").map(str::to_string),
            }))
        })
    }
}

/// Client ip, checking forwarded headers first.
///
/// Order of precedence:
/// 1. X-Forwarded-For header (first ip in list)
/// 2. X-Real-IP header
/// 3. ConnectInfo socket address
pub fn client_ip(headers: &HeaderMap, socket: Option<SocketAddr>) -> Option<String> {
    if let Some(forwarded) = header_str(headers, "X-Forwarded-For") {
        // The first entry is the client, the rest are proxies
        if let Some(first) = forwarded.split(',').map(str::trim).find(|s| !s.is_empty()) {
            return Some(first.to_string());
        }
    }

    if let Some(real_ip) = header_str(headers, "X-Real-IP") {
        return Some(real_ip.to_string());
    }

    socket.map(|addr| addr.ip().to_string())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    fn socket() -> Option<SocketAddr> {
        Some("10.0.0.9:51000".parse().unwrap())
    }

    #[test]
    fn forwarded_for_takes_first_entry() {
        let h = headers(&[
            ("X-Forwarded-For", "203.0.113.7, 10.0.0.1"),
            ("X-Real-IP", "198.51.100.2"),
        ]);
        assert_eq!(client_ip(&h, socket()), Some("203.0.113.7".to_string()));
    }

    #[test]
    fn real_ip_used_without_forwarded_for() {
        let h = headers(&[("X-Real-IP", "198.51.100.2")]);
        assert_eq!(client_ip(&h, socket()), Some("198.51.100.2".to_string()));
    }

    #[test]
    fn socket_address_is_last_resort() {
        assert_eq!(
            client_ip(&HeaderMap::new(), socket()),
            Some("10.0.0.9".to_string())
        );
        assert_eq!(client_ip(&HeaderMap::new(), None), None);
    }

    #[tokio::test]
    async fn missing_user_header_is_rejected() {
        let (mut parts, _) = axum::http::Request::new(()).into_parts();
        let result = AuthenticatedSubscriber::from_request_parts(&mut parts, &()).await;
        let err = result.unwrap_err();
        assert_eq!(err.code(), "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn user_header_becomes_subscriber_id() {
        let (mut parts, _) = axum::http::Request::builder()
            .header(USER_ID_HEADER, "user_42")
            .body(())
            .unwrap()
            .into_parts();
        let user = AuthenticatedSubscriber::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(user.subscriber_id.as_str(), "user_42");
    }
}

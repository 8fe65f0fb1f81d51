use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, Method, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::Instrument;
use uuid::Uuid;
use vidtube_session::Identity;

use crate::auth::ACCESS_COOKIE_NAME;
use crate::error::ApiError;
use crate::state::AppState;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Identity resolved by [`require_user`], available to handlers as
/// `Extension<AuthUser>`.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Identity);

impl AuthUser {
    pub fn id(&self) -> Uuid {
        self.0.id
    }
}

fn is_unsafe_method(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

fn origin_is_allowed(headers: &HeaderMap, allowed: &[String]) -> bool {
    // Missing Origin means a non-browser client (curl, service-to-service).
    let origin = match headers.get(header::ORIGIN) {
        Some(v) => match v.to_str() {
            Ok(s) => s,
            Err(_) => return false,
        },
        None => return true,
    };

    allowed.iter().any(|a| a == origin)
}

/// Access token from the `accessToken` cookie, else from
/// `Authorization: Bearer`.
pub fn access_token_from(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(c) = jar.get(ACCESS_COOKIE_NAME).filter(|c| !c.value().is_empty()) {
        return Some(c.value().to_string());
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// Middleware: tag every request with an id and run it inside a span.
pub async fn request_id(req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim())
        .filter(|v| !v.is_empty() && v.len() <= 128)
        .map(|v| v.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let span = tracing::info_span!(
        "request",
        request_id = %id,
        method = %req.method(),
        path = %req.uri().path(),
    );

    let mut res = next.run(req).instrument(span).await;
    if let Ok(v) = HeaderValue::from_str(&id) {
        res.headers_mut().insert(REQUEST_ID_HEADER, v);
    }
    res
}

// Middleware: Origin allowlist for state-changing requests.
pub async fn origin_guard(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if is_unsafe_method(req.method()) && !origin_is_allowed(req.headers(), &state.allowed_origins) {
        tracing::warn!(origin = ?req.headers().get(header::ORIGIN), "origin not allowed");
        return ApiError::forbidden("Origin not allowed").into_response();
    }
    next.run(req).await
}

// Middleware: reject requests without a valid access token.
pub async fn require_user(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let token = access_token_from(req.headers());
    match state.sessions.verify(token.as_deref()).await {
        Ok(identity) => {
            req.extensions_mut().insert(AuthUser(identity));
            next.run(req).await
        }
        Err(err) => ApiError::from(err).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(header::HeaderName, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(name.clone(), HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn cookie_wins_over_bearer() {
        let map = headers(&[
            (header::COOKIE, "accessToken=from-cookie"),
            (header::AUTHORIZATION, "Bearer from-header"),
        ]);
        assert_eq!(access_token_from(&map).as_deref(), Some("from-cookie"));
    }

    #[test]
    fn bearer_is_used_without_cookie() {
        let map = headers(&[(header::AUTHORIZATION, "Bearer abc.def.ghi")]);
        assert_eq!(access_token_from(&map).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn other_schemes_and_blank_values_yield_nothing() {
        assert_eq!(access_token_from(&headers(&[(header::AUTHORIZATION, "Basic Zm9vOmJhcg==")])), None);
        assert_eq!(access_token_from(&headers(&[(header::AUTHORIZATION, "Bearer   ")])), None);
        assert_eq!(access_token_from(&headers(&[(header::COOKIE, "accessToken=")])), None);
        assert_eq!(access_token_from(&HeaderMap::new()), None);
    }

    #[test]
    fn origin_check_allows_missing_and_listed_origins() {
        let allowed = vec!["https://vidtube.example.com".to_string()];
        assert!(origin_is_allowed(&HeaderMap::new(), &allowed));
        assert!(origin_is_allowed(
            &headers(&[(header::ORIGIN, "https://vidtube.example.com")]),
            &allowed
        ));
        assert!(!origin_is_allowed(
            &headers(&[(header::ORIGIN, "https://evil.example.com")]),
            &allowed
        ));
    }

    #[test]
    fn only_mutating_methods_are_guarded() {
        assert!(is_unsafe_method(&Method::POST));
        assert!(is_unsafe_method(&Method::PATCH));
        assert!(is_unsafe_method(&Method::DELETE));
        assert!(!is_unsafe_method(&Method::GET));
        assert!(!is_unsafe_method(&Method::OPTIONS));
    }
}
